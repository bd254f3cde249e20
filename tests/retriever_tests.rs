//! Retriever policy: threshold filtering, context assembly within a
//! character budget, and threshold estimation.

use std::sync::Arc;

use docqa::document::{Chunk, ChunkMetadata, SearchResult};
use docqa::index::VectorIndex;
use docqa::mock::HashEmbedder;
use docqa::retriever::{assemble_blocks, Retriever, DEFAULT_THRESHOLD};

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

fn result(source: &str, text_len: usize, score: f32) -> SearchResult {
    SearchResult { chunk: chunk(&"x".repeat(text_len), source, 0), score }
}

async fn seeded_index() -> VectorIndex {
    let mut index = VectorIndex::new(Arc::new(HashEmbedder::new(256)));
    index
        .create(vec![
            chunk("Aspirin relieves mild pain and reduces fever in adults.", "aspirin.txt", 0),
            chunk("Ibuprofen reduces inflammation and relieves joint pain.", "ibuprofen.txt", 0),
            chunk("Hydration guidelines for endurance athletes in hot weather.", "hydration.txt", 0),
            chunk("Sleep hygiene practices improve rest quality over time.", "sleep.txt", 0),
        ])
        .await
        .unwrap();
    index
}

#[tokio::test]
async fn threshold_search_bounds_scores_and_count() {
    let index = seeded_index().await;
    let retriever = Retriever::new(&index);

    let ranked = retriever.search("what relieves pain", 4).await.unwrap();
    let cutoff = ranked[1].score;

    let filtered = retriever.search_with_threshold("what relieves pain", 2, cutoff).await.unwrap();
    assert!(filtered.len() <= 2);
    assert!(!filtered.is_empty());
    for result in &filtered {
        assert!(result.score <= cutoff);
    }
}

#[tokio::test]
async fn threshold_search_can_filter_everything() {
    let index = seeded_index().await;
    let retriever = Retriever::new(&index);

    let filtered = retriever.search_with_threshold("what relieves pain", 3, -1.0).await.unwrap();
    assert!(filtered.is_empty());
}

#[test]
fn context_never_exceeds_budget() {
    let results = vec![
        result("a.txt", 120, 0.1),
        result("b.txt", 250, 0.2),
        result("c.txt", 40, 0.3),
        result("d.txt", 500, 0.4),
    ];
    for budget in (0..600).step_by(7) {
        let context = assemble_blocks(&results, budget);
        assert!(
            context.len() <= budget,
            "context of {} chars exceeds budget {}",
            context.len(),
            budget
        );
    }
}

#[test]
fn small_budget_keeps_one_full_block() {
    // Each block is exactly 100 chars: "[Source: a.txt]\n" (16) + 83 + "\n".
    let results =
        vec![result("a.txt", 83, 0.1), result("b.txt", 83, 0.2), result("c.txt", 83, 0.3)];

    let context = assemble_blocks(&results, 150);
    assert!(context.len() <= 150);
    assert_eq!(context.matches("[Source:").count(), 1);
    assert!(!context.ends_with("..."));
}

#[test]
fn generous_leftover_budget_yields_truncated_block() {
    // Each block is exactly 200 chars.
    let results = vec![result("a.txt", 183, 0.1), result("b.txt", 183, 0.2)];

    let context = assemble_blocks(&results, 350);
    assert_eq!(context.len(), 350);
    assert!(context.ends_with("..."));
    assert_eq!(context.matches("[Source:").count(), 2);
}

#[test]
fn empty_results_assemble_to_empty_context() {
    assert_eq!(assemble_blocks(&[], 4000), "");
}

#[tokio::test]
async fn assemble_context_uses_ranked_order() {
    let index = seeded_index().await;
    let retriever = Retriever::new(&index);

    let context = retriever.assemble_context("pain relief", 2, 4000).await.unwrap();
    assert!(context.contains("[Source:"));
    assert!(context.len() <= 4000);
}

#[tokio::test]
async fn estimate_threshold_falls_back_on_empty_samples() {
    let index = VectorIndex::new(Arc::new(HashEmbedder::new(64)));
    let retriever = Retriever::new(&index);
    let estimate = retriever.estimate_threshold("query", &[], 75.0).await;
    assert_eq!(estimate, DEFAULT_THRESHOLD);
    // The fallback lives in the distance domain: 0.3 distance, 0.7 similarity.
    assert_eq!(estimate, 0.3);
}

#[tokio::test]
async fn estimate_threshold_tracks_the_distance_distribution() {
    let index = VectorIndex::new(Arc::new(HashEmbedder::new(256)));
    let retriever = Retriever::new(&index);

    let samples = vec![
        "alpha beta gamma delta".to_string(),
        "alpha beta unrelated words".to_string(),
        "completely different tokens here".to_string(),
    ];

    let low = retriever.estimate_threshold("alpha beta gamma", &samples, 0.0).await;
    let high = retriever.estimate_threshold("alpha beta gamma", &samples, 100.0).await;
    assert!((0.0..=2.0).contains(&low));
    assert!((0.0..=2.0).contains(&high));
    assert!(low <= high);
}
