//! Error types for the `docqa` crate.

use thiserror::Error;

/// Errors that can occur in the document question-answering pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// A file extension outside the supported set was submitted.
    #[error("unsupported file format '{extension}' (supported: .pdf, .txt)")]
    UnsupportedFormat {
        /// The offending file extension, lowercased, including the dot.
        extension: String,
    },

    /// An index build was attempted with zero chunks.
    #[error("no chunks provided for index creation")]
    EmptyInput,

    /// The vector index was queried before any documents were indexed or loaded.
    #[error("vector index is not initialized; ingest documents or load a saved index first")]
    NotInitialized,

    /// Persisted vector and chunk files disagree on how many entries they hold.
    #[error("inconsistent persisted state: {index_len} vectors but {chunk_len} chunks")]
    InconsistentState {
        /// Number of vectors in the persisted nearest-neighbour table.
        index_len: usize,
        /// Number of chunks in the persisted chunk list.
        chunk_len: usize,
    },

    /// An embedding vector did not match the dimensionality of the index.
    ///
    /// Mixing embedding models without rebuilding the index is rejected.
    #[error("embedding dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        /// Dimensionality the index was built with.
        expected: usize,
        /// Dimensionality that was offered.
        actual: usize,
    },

    /// The embedding capability failed.
    #[error("embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The language-model capability failed.
    #[error("generation error ({provider}): {message}")]
    Generation {
        /// The chat model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An error in pipeline orchestration.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// An I/O error while reading documents or persisting the index.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A serialization error while persisting or restoring the index.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
