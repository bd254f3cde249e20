//! Data types for documents, chunks, and retrieval results.

use serde::{Deserialize, Serialize};

/// One page or section of extracted source text, as produced by a
/// [`DocumentLoader`](crate::loader::DocumentLoader).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The extracted text content.
    pub text: String,
    /// Human-readable source name, usually the file name.
    pub source: String,
    /// Path to the file the text came from, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Document {
    /// Create a document with the given text and source name.
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self { text: text.into(), source: source.into(), file_path: None }
    }

    /// Attach the originating file path.
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }
}

/// Provenance and position metadata attached to every [`Chunk`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Source name inherited from the parent document.
    pub source: String,
    /// Path of the originating file, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Sequence position within the source document, starting at 0.
    pub chunk_id: usize,
    /// Character length of the chunk text.
    pub chunk_size: usize,
}

/// A bounded segment of source text, the unit of indexing and retrieval.
///
/// Chunks are produced by the [`RecursiveChunker`](crate::chunking::RecursiveChunker)
/// and are immutable thereafter; the vector index copies them in when indexing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The text content of the chunk.
    pub text: String,
    /// Source and position metadata.
    pub metadata: ChunkMetadata,
}

/// A retrieved [`Chunk`] paired with its distance score.
///
/// Scores are cosine distances (`1 - cosine similarity`): lower means more
/// similar. This is the single score convention used across the crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine distance between the query and the chunk (lower is better).
    pub score: f32,
}
