//! Vector index lifecycle: creation, incremental add, search ordering,
//! persistence round-trips, and the metadata filter scan.

use std::sync::Arc;

use docqa::document::{Chunk, ChunkMetadata};
use docqa::error::RagError;
use docqa::index::{MetadataFilter, VectorIndex};
use docqa::mock::HashEmbedder;
use proptest::prelude::*;

fn chunk(text: &str, source: &str, chunk_id: usize) -> Chunk {
    Chunk {
        text: text.to_string(),
        metadata: ChunkMetadata {
            source: source.to_string(),
            file_path: None,
            chunk_id,
            chunk_size: text.len(),
        },
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk(
            "Artificial intelligence lets machines reason, plan, and act on their own.",
            "ai.txt",
            0,
        ),
        chunk("Machine learning trains statistical models from labeled examples.", "ml.txt", 0),
        chunk(
            "Data science combines statistics with domain expertise to extract insight.",
            "ds.txt",
            0,
        ),
    ]
}

fn new_index() -> VectorIndex {
    VectorIndex::new(Arc::new(HashEmbedder::new(256)))
}

#[tokio::test]
async fn create_with_no_chunks_fails() {
    let mut index = new_index();
    let err = index.create(Vec::new()).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyInput));
}

#[tokio::test]
async fn search_before_create_fails() {
    let index = new_index();
    let err = index.search("anything", 3).await.unwrap_err();
    assert!(matches!(err, RagError::NotInitialized));
}

#[tokio::test]
async fn add_on_empty_index_behaves_as_create() {
    let mut index = new_index();
    index.add(corpus()).await.unwrap();
    assert!(index.is_initialized());
    assert_eq!(index.document_count(), 3);

    index.add(vec![chunk("Neural networks stack layers of weights.", "nn.txt", 0)]).await.unwrap();
    assert_eq!(index.document_count(), 4);
}

#[tokio::test]
async fn create_replaces_prior_state() {
    let mut index = new_index();
    index.create(corpus()).await.unwrap();
    index.create(vec![chunk("A single replacement chunk about gardens.", "g.txt", 0)])
        .await
        .unwrap();
    assert_eq!(index.document_count(), 1);
    assert_eq!(index.documents()[0].metadata.source, "g.txt");
}

#[tokio::test]
async fn query_ranks_most_related_chunk_first() {
    let mut index = new_index();
    index.create(corpus()).await.unwrap();

    let results = index.search("Tell me about artificial intelligence", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk.metadata.source, "ai.txt");
    assert!(results[0].score <= results[1].score);
}

#[tokio::test]
async fn embedding_dimension_is_answerable_before_and_after_create() {
    let mut index = new_index();
    assert_eq!(index.embedding_dimension().await.unwrap(), 256);
    index.create(corpus()).await.unwrap();
    assert_eq!(index.embedding_dimension().await.unwrap(), 256);
}

#[tokio::test]
async fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = new_index();
    index.create(corpus()).await.unwrap();
    index.save(Some(dir.path())).await.unwrap();

    let mut restored = new_index();
    assert!(restored.load(Some(dir.path())).await.unwrap());
    assert_eq!(restored.document_count(), index.document_count());
    assert_eq!(restored.documents(), index.documents());

    let results = restored.search("artificial intelligence", 1).await.unwrap();
    assert_eq!(results[0].chunk.metadata.source, "ai.txt");
}

#[tokio::test]
async fn load_of_missing_path_is_a_soft_miss() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = new_index();
    assert!(!index.load(Some(&dir.path().join("nowhere"))).await.unwrap());
    assert!(!index.is_initialized());
}

#[tokio::test]
async fn load_rejects_mismatched_counts() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = new_index();
    index.create(corpus()).await.unwrap();
    index.save(Some(dir.path())).await.unwrap();

    // Drop one chunk from the persisted chunk list.
    let chunks_path = dir.path().join("chunks.json");
    let mut chunks: Vec<Chunk> =
        serde_json::from_str(&std::fs::read_to_string(&chunks_path).unwrap()).unwrap();
    chunks.pop();
    std::fs::write(&chunks_path, serde_json::to_vec(&chunks).unwrap()).unwrap();

    let mut restored = new_index();
    let err = restored.load(Some(dir.path())).await.unwrap_err();
    assert!(matches!(err, RagError::InconsistentState { index_len: 3, chunk_len: 2 }));
    assert!(!restored.is_initialized());
}

#[tokio::test]
async fn load_rejects_foreign_embedding_dimension() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = new_index();
    index.create(corpus()).await.unwrap();
    index.save(Some(dir.path())).await.unwrap();

    let mut other = VectorIndex::new(Arc::new(HashEmbedder::new(32)));
    let err = other.load(Some(dir.path())).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 32, actual: 256 }));
}

#[tokio::test]
async fn delete_clears_state_and_artifacts_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    let mut index = new_index().with_store_path(&store);

    index.create(corpus()).await.unwrap();
    index.save(None).await.unwrap();
    assert!(store.exists());

    index.delete().await.unwrap();
    assert!(!index.is_initialized());
    assert_eq!(index.document_count(), 0);
    assert!(!store.exists());

    // Second delete is a no-op.
    index.delete().await.unwrap();
}

#[tokio::test]
async fn metadata_filter_matches_exactly_and_caps_results() {
    let mut index = new_index();
    let mut chunks = corpus();
    chunks.push(chunk("More material about artificial intelligence agents.", "ai.txt", 1));
    index.create(chunks).await.unwrap();

    let filter = MetadataFilter { source: Some("ai.txt".to_string()), ..Default::default() };
    let matched = index.search_by_metadata(&filter, 10);
    assert_eq!(matched.len(), 2);
    assert!(matched.iter().all(|c| c.metadata.source == "ai.txt"));

    assert_eq!(index.search_by_metadata(&filter, 1).len(), 1);

    let narrow = MetadataFilter {
        source: Some("ai.txt".to_string()),
        chunk_id: Some(1),
        ..Default::default()
    };
    assert_eq!(index.search_by_metadata(&narrow, 10).len(), 1);
}

#[tokio::test]
async fn info_reports_sources_and_sizes() {
    let mut index = new_index();
    index.create(corpus()).await.unwrap();

    let info = index.info();
    assert!(info.initialized);
    assert_eq!(info.document_count, 3);
    assert_eq!(info.sources.len(), 3);
    assert!(info.average_chunk_length > 0.0);
}

fn arb_text() -> impl Strategy<Value = String> {
    "[a-z]{2,8}( [a-z]{2,8}){0,5}".prop_map(|s| s)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Search results come back in ascending distance order, bounded by both
    /// `k` and the number of stored chunks.
    #[test]
    fn search_results_ordered_ascending_and_bounded(
        texts in proptest::collection::vec(arb_text(), 1..15),
        query in arb_text(),
        k in 1usize..20,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let results = rt.block_on(async {
            let mut index = new_index();
            let chunks: Vec<Chunk> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| chunk(t, "prop.txt", i))
                .collect();
            index.create(chunks).await.unwrap();
            index.search(&query, k).await.unwrap()
        });

        prop_assert!(results.len() <= k);
        prop_assert!(results.len() <= texts.len());
        for window in results.windows(2) {
            prop_assert!(
                window[0].score <= window[1].score,
                "results not in ascending distance order: {} > {}",
                window[0].score,
                window[1].score,
            );
        }
    }
}
