//! Chunker behavior: size bounds, overlap carry-over, id assignment, and the
//! diagnostic helpers.

use docqa::chunking::{filter_by_length, preprocess_text, ChunkStats, RecursiveChunker};
use docqa::document::Document;

fn words(total_len: usize) -> String {
    let mut text = String::new();
    while text.len() < total_len {
        text.push_str("lorem ipsum dolor sit amet ");
    }
    text.truncate(total_len);
    text
}

#[test]
fn chunks_never_exceed_size_budget() {
    let chunker = RecursiveChunker::new(300, 50);
    let docs = vec![Document::new(words(5000), "big.txt")];

    let chunks = chunker.chunk(&docs);
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(chunk.text.len() <= 300, "chunk of {} chars exceeds budget", chunk.text.len());
        assert_eq!(chunk.metadata.chunk_size, chunk.text.len());
    }
}

#[test]
fn consecutive_chunks_share_overlap() {
    let chunker = RecursiveChunker::new(100, 20);
    let docs = vec![Document::new(words(500), "doc.txt")];

    let chunks = chunker.chunk(&docs);
    assert!(chunks.len() > 1);
    for pair in chunks.windows(2) {
        let prev = &pair[0].text;
        let tail = &prev[prev.len() - 20..];
        assert!(
            pair[1].text.starts_with(tail),
            "next chunk does not start with the previous chunk's tail"
        );
    }
}

#[test]
fn chunk_ids_are_dense_per_source() {
    let chunker = RecursiveChunker::new(100, 20);
    let docs = vec![
        Document::new(words(250), "report.txt"),
        Document::new(words(250), "report.txt"),
        Document::new(words(250), "other.txt"),
    ];

    let chunks = chunker.chunk(&docs);
    let report_ids: Vec<usize> = chunks
        .iter()
        .filter(|c| c.metadata.source == "report.txt")
        .map(|c| c.metadata.chunk_id)
        .collect();
    let other_ids: Vec<usize> = chunks
        .iter()
        .filter(|c| c.metadata.source == "other.txt")
        .map(|c| c.metadata.chunk_id)
        .collect();

    assert_eq!(report_ids, (0..report_ids.len()).collect::<Vec<_>>());
    assert_eq!(other_ids, (0..other_ids.len()).collect::<Vec<_>>());
}

#[test]
fn splits_2500_chars_into_three_chunks() {
    let chunker = RecursiveChunker::new(1000, 200);
    let docs = vec![Document::new(words(2500), "long.txt")];

    let chunks = chunker.chunk(&docs);
    assert_eq!(chunks.len(), 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert!(chunk.text.len() <= 1000);
        assert_eq!(chunk.metadata.chunk_id, i);
    }
}

#[test]
fn prefers_paragraph_boundaries() {
    let text = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
    let chunker = RecursiveChunker::new(80, 0);

    let chunks = chunker.chunk(&[Document::new(text, "para.txt")]);
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].text.starts_with('a'));
    assert!(chunks[1].text.starts_with('b'));
}

#[test]
fn empty_and_whitespace_documents_produce_no_chunks() {
    let chunker = RecursiveChunker::new(100, 20);
    let docs = vec![Document::new("", "empty.txt"), Document::new("   \n\n  ", "blank.txt")];
    assert!(chunker.chunk(&docs).is_empty());
}

#[test]
fn short_document_yields_single_chunk() {
    let chunker = RecursiveChunker::new(1000, 200);
    let chunks = chunker.chunk(&[Document::new("a short note", "note.txt")]);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "a short note");
    assert_eq!(chunks[0].metadata.chunk_id, 0);
}

#[test]
fn filter_drops_short_chunks() {
    let chunker = RecursiveChunker::new(1000, 0);
    let docs = vec![
        Document::new("tiny", "a.txt"),
        Document::new(words(120), "b.txt"),
    ];

    let filtered = filter_by_length(chunker.chunk(&docs), 50);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].metadata.source, "b.txt");
}

#[test]
fn stats_summarize_chunk_set() {
    let chunker = RecursiveChunker::new(1000, 0);
    let docs = vec![
        Document::new("x".repeat(10), "a.txt"),
        Document::new("y".repeat(20), "a.txt"),
        Document::new("z".repeat(30), "b.txt"),
    ];

    let stats = ChunkStats::compute(&chunker.chunk(&docs));
    assert_eq!(stats.total_chunks, 3);
    assert_eq!(stats.total_characters, 60);
    assert!((stats.average_size - 20.0).abs() < 1e-9);
    assert_eq!(stats.min_size, 10);
    assert_eq!(stats.max_size, 30);
    assert_eq!(stats.median_size, 20);
    assert_eq!(stats.sources, vec!["a.txt".to_string(), "b.txt".to_string()]);
}

#[test]
fn stats_on_empty_set_are_zeroed() {
    let stats = ChunkStats::compute(&[]);
    assert_eq!(stats.total_chunks, 0);
    assert_eq!(stats.total_characters, 0);
    assert!(stats.sources.is_empty());
}

#[test]
fn preprocess_collapses_whitespace_and_strips_control_chars() {
    assert_eq!(preprocess_text("  a\u{0}b\u{feff}   c \n d  "), "ab c d");
}
