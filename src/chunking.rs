//! Document chunking.
//!
//! [`RecursiveChunker`] splits extracted text into overlapping segments using
//! a hierarchical separator preference: paragraph breaks first, then line
//! breaks, then word boundaries, and only as a last resort raw character
//! positions. This keeps chunk boundaries on natural seams whenever a coarser
//! separator suffices.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::document::{Chunk, ChunkMetadata, Document};

/// Separator hierarchy, coarsest first. Character-level splitting is the
/// implicit final fallback.
const SEPARATORS: &[&str] = &["\n\n", "\n", " "];

/// Chunks shorter than this (after trimming) are dropped by
/// [`filter_by_length`] with its default threshold.
pub const MIN_CHUNK_LENGTH: usize = 50;

/// Splits document text into overlapping chunks bounded by a character budget.
///
/// Every emitted chunk is at most `chunk_size` characters; consecutive chunks
/// from the same document share up to `chunk_overlap` characters where the
/// separator structure allows it. Chunk ids are dense and start at 0 per
/// source document.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new chunker.
    ///
    /// `chunk_overlap` should be strictly less than `chunk_size`; the
    /// [`Settings`](crate::config::Settings) builder enforces this for
    /// settings-driven construction.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Split a batch of documents into tagged chunks.
    ///
    /// Documents sharing a source name continue one id sequence, so the pages
    /// of a multi-page file number their chunks 0, 1, 2, … across pages.
    /// Empty and whitespace-only texts produce no chunks.
    pub fn chunk(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut next_id: HashMap<String, usize> = HashMap::new();
        let mut chunks = Vec::new();

        for document in documents {
            if document.text.trim().is_empty() {
                continue;
            }
            for text in self.split_text(&document.text) {
                if text.trim().is_empty() {
                    continue;
                }
                let id = next_id.entry(document.source.clone()).or_insert(0);
                chunks.push(Chunk {
                    metadata: ChunkMetadata {
                        source: document.source.clone(),
                        file_path: document.file_path.clone(),
                        chunk_id: *id,
                        chunk_size: text.len(),
                    },
                    text,
                });
                *id += 1;
            }
        }

        info!(documents = documents.len(), chunks = chunks.len(), "chunked documents");
        chunks
    }

    /// Split raw text into segments of at most `chunk_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        split_recursive(text, self.chunk_size, self.chunk_overlap, SEPARATORS)
    }
}

fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }
    let Some((separator, rest)) = separators.split_first() else {
        return split_by_size(text, chunk_size, chunk_overlap);
    };

    let segments = split_keeping_separator(text, separator);
    if segments.len() <= 1 {
        // Separator absent at this level, try the next finer one.
        return split_recursive(text, chunk_size, chunk_overlap, rest);
    }

    merge_segments(&segments, chunk_size, chunk_overlap, rest)
}

/// Greedily merge segments into chunks of at most `chunk_size` characters,
/// seeding each new chunk with the tail of the previous one for overlap.
fn merge_segments(
    segments: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
    rest: &[&str],
) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for segment in segments {
        if !current.is_empty() && current.len() + segment.len() > chunk_size {
            flush(&mut chunks, &mut current, chunk_size, chunk_overlap, rest);
            if chunk_overlap > 0 {
                if let Some(last) = chunks.last() {
                    current = overlap_tail(last, chunk_overlap).to_string();
                }
            }
        }
        current.push_str(segment);
    }
    if !current.is_empty() {
        flush(&mut chunks, &mut current, chunk_size, chunk_overlap, rest);
    }

    chunks
}

/// Move `current` into `chunks`, splitting it further if it exceeds the
/// budget (a single segment can be longer than `chunk_size`).
fn flush(
    chunks: &mut Vec<String>,
    current: &mut String,
    chunk_size: usize,
    chunk_overlap: usize,
    rest: &[&str],
) {
    let text = std::mem::take(current);
    if text.len() > chunk_size {
        chunks.extend(split_recursive(&text, chunk_size, chunk_overlap, rest));
    } else {
        chunks.push(text);
    }
}

/// Split text at a separator, keeping the separator attached to the
/// preceding segment so no characters are lost on re-assembly.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut segments = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        segments.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        segments.push(&text[start..]);
    }

    segments
}

/// Character-position splitting with overlap, the final fallback when no
/// separator structure is available.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = floor_char_boundary(text, (start + chunk_size).min(text.len()));
        if end <= start {
            end = ceil_char_boundary(text, start + 1);
        }
        chunks.push(text[start..end].to_string());
        if end == text.len() {
            break;
        }
        let mut next = floor_char_boundary(text, start + step);
        if next <= start {
            next = ceil_char_boundary(text, start + 1);
        }
        start = next;
    }

    chunks
}

/// The last `overlap` bytes of `text`, adjusted forward to a char boundary.
fn overlap_tail(text: &str, overlap: usize) -> &str {
    if text.len() <= overlap {
        return text;
    }
    &text[ceil_char_boundary(text, text.len() - overlap)..]
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Drop chunks whose trimmed text is shorter than `min_length` characters.
///
/// Near-empty fragments (page headers, stray line breaks) add noise to the
/// index without carrying answerable content.
pub fn filter_by_length(chunks: Vec<Chunk>, min_length: usize) -> Vec<Chunk> {
    let original = chunks.len();
    let filtered: Vec<Chunk> =
        chunks.into_iter().filter(|c| c.text.trim().len() >= min_length).collect();
    debug!(original, kept = filtered.len(), min_length, "filtered short chunks");
    filtered
}

/// Collapse whitespace runs and strip NUL and BOM characters.
pub fn preprocess_text(text: &str) -> String {
    let cleaned: String = text.chars().filter(|c| *c != '\0' && *c != '\u{feff}').collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Aggregate statistics over a chunk set, for diagnostics and UI display.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkStats {
    /// Number of chunks.
    pub total_chunks: usize,
    /// Sum of chunk text lengths.
    pub total_characters: usize,
    /// Mean chunk length; 0 for an empty set.
    pub average_size: f64,
    /// Shortest chunk length.
    pub min_size: usize,
    /// Longest chunk length.
    pub max_size: usize,
    /// Median chunk length.
    pub median_size: usize,
    /// Distinct source names, sorted.
    pub sources: Vec<String>,
}

impl ChunkStats {
    /// Compute statistics over a chunk set.
    pub fn compute(chunks: &[Chunk]) -> Self {
        if chunks.is_empty() {
            return Self {
                total_chunks: 0,
                total_characters: 0,
                average_size: 0.0,
                min_size: 0,
                max_size: 0,
                median_size: 0,
                sources: Vec::new(),
            };
        }

        let mut lengths: Vec<usize> = chunks.iter().map(|c| c.text.len()).collect();
        lengths.sort_unstable();
        let total: usize = lengths.iter().sum();

        let mut sources: Vec<String> =
            chunks.iter().map(|c| c.metadata.source.clone()).collect();
        sources.sort();
        sources.dedup();

        Self {
            total_chunks: chunks.len(),
            total_characters: total,
            average_size: total as f64 / chunks.len() as f64,
            min_size: lengths[0],
            max_size: lengths[lengths.len() - 1],
            median_size: lengths[lengths.len() / 2],
            sources,
        }
    }
}
