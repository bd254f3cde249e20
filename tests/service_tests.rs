//! End-to-end facade behavior: batch ingestion with per-file isolation,
//! status reporting, and question answering over real files.

use std::path::PathBuf;
use std::sync::Arc;

use docqa::config::{Settings, SettingsUpdate};
use docqa::loader::PlainTextLoader;
use docqa::mock::{HashEmbedder, MockChat, MockFactory};
use docqa::service::DocQaService;

fn service_with(mock: Arc<MockChat>) -> DocQaService {
    DocQaService::new(
        Arc::new(PlainTextLoader),
        Arc::new(HashEmbedder::new(256)),
        Arc::new(MockFactory::new(mock)),
        Settings::default(),
    )
    .unwrap()
}

fn write_file(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn ingest_isolates_per_file_failures() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_file(
        dir.path(),
        "good.txt",
        "Aspirin relieves mild pain and reduces fever in adults. \
         Typical doses range from 325 to 650 milligrams every four hours.",
    );
    // Short content chunks below the minimum length and gets filtered out.
    let small = write_file(dir.path(), "small.txt", "too short");
    let unsupported = write_file(dir.path(), "notes.docx", "a word document");
    let missing = dir.path().join("missing.txt");

    let mock = Arc::new(MockChat::new("unused"));
    let mut service = service_with(mock);

    let report =
        service.process_documents(&[good, small, unsupported.clone(), missing.clone()]).await;

    assert_eq!(report.files.len(), 4);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 2);
    assert!(report.total_chunks >= 1);

    assert!(report.files[0].error.is_none());
    assert!(report.files[0].chunks >= 1);

    // Filtered-to-nothing is a success with zero chunks, not a failure.
    assert!(report.files[1].error.is_none());
    assert_eq!(report.files[1].chunks, 0);

    let unsupported_error = report.files[2].error.as_deref().unwrap();
    assert!(unsupported_error.contains(".docx"));

    assert!(report.files[3].error.is_some());

    let status = service.status();
    assert!(status.initialized);
    assert_eq!(status.document_count, report.total_chunks);
}

#[tokio::test]
async fn ask_answers_from_ingested_documents() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_file(
        dir.path(),
        "hydration.txt",
        "Endurance athletes should drink water regularly in hot weather. \
         Electrolyte replacement matters for sessions over an hour.",
    );

    let mock = Arc::new(MockChat::new("Drink water regularly; consult a doctor if unsure."));
    let mut service = service_with(mock.clone());
    service.process_documents(&[doc]).await;

    let answer = service.ask("How should athletes stay hydrated?").await;
    assert_eq!(answer.answer, "Drink water regularly; consult a doctor if unsure.");
    assert!(!answer.sources.is_empty());
    assert!(answer.metadata.error.is_none());
    assert_eq!(mock.call_count(), 1);
    assert!(mock.last_prompt().unwrap().contains("hydration.txt"));
}

#[tokio::test]
async fn ask_before_ingestion_reports_the_error() {
    let mock = Arc::new(MockChat::new("unused"));
    let service = service_with(mock.clone());

    assert!(!service.status().initialized);
    let answer = service.ask("anything").await;
    assert!(answer.answer.starts_with("I encountered an error:"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn settings_updates_flow_through_to_the_pipeline() {
    let mock = Arc::new(MockChat::new("unused"));
    let mut service = service_with(mock);

    let update = SettingsUpdate { temperature: None, retrieval_k: Some(5) };
    assert_eq!(service.update_settings(&update), vec!["retrieval_k: 5".to_string()]);
    assert_eq!(service.pipeline().settings().retrieval_k, 5);
}
