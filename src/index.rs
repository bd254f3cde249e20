//! The vector index: embedding storage, nearest-neighbour search, and
//! persistence.
//!
//! [`VectorIndex`] keeps a flat table of embedding vectors alongside the
//! chunks they were computed from, searched by exhaustive cosine-distance
//! scan. Persistence writes the vector table and the chunk list side by side
//! in one directory; the two files are loaded as a unit and a count mismatch
//! is rejected.
//!
//! Writers (`create`, `add`, `delete`, `save`) must not interleave with each
//! other or with `load`; callers serialize them against concurrent `search`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::{Chunk, ChunkMetadata, SearchResult};
use crate::embedding::{cosine_distance, EmbeddingProvider};
use crate::error::{RagError, Result};

/// Default directory for persisted index artifacts.
pub const DEFAULT_STORE_DIR: &str = "data/vector_index";

const VECTORS_FILE: &str = "vectors.json";
const CHUNKS_FILE: &str = "chunks.json";

/// Serialized form of the nearest-neighbour table.
#[derive(Serialize, Deserialize)]
struct PersistedVectors {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

/// An exact-match predicate over chunk metadata fields.
///
/// Absent fields match everything; present fields must match exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    /// Match the source name.
    pub source: Option<String>,
    /// Match the file path.
    pub file_path: Option<String>,
    /// Match the chunk sequence id.
    pub chunk_id: Option<usize>,
}

impl MetadataFilter {
    fn matches(&self, metadata: &ChunkMetadata) -> bool {
        if let Some(source) = &self.source {
            if metadata.source != *source {
                return false;
            }
        }
        if let Some(file_path) = &self.file_path {
            if metadata.file_path.as_deref() != Some(file_path.as_str()) {
                return false;
            }
        }
        if let Some(chunk_id) = self.chunk_id {
            if metadata.chunk_id != chunk_id {
                return false;
            }
        }
        true
    }
}

/// Summary of the index contents, for diagnostics and UI display.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    /// Whether the index holds any documents.
    pub initialized: bool,
    /// Number of indexed chunks.
    pub document_count: usize,
    /// Distinct source names, sorted.
    pub sources: Vec<String>,
    /// Mean chunk text length; 0 when empty.
    pub average_chunk_length: f64,
    /// Total characters across all indexed chunks.
    pub total_characters: usize,
}

/// A searchable collection of chunks and their embedding vectors.
///
/// Created empty via [`VectorIndex::new`] and populated by [`create`](VectorIndex::create),
/// [`add`](VectorIndex::add), or [`load`](VectorIndex::load). Searching before
/// any of those fails with [`RagError::NotInitialized`].
pub struct VectorIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<Chunk>,
    store_path: PathBuf,
}

impl VectorIndex {
    /// Create an empty index using the given embedding provider and the
    /// default store path.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            vectors: Vec::new(),
            chunks: Vec::new(),
            store_path: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }

    /// Override the directory used by [`save`](VectorIndex::save),
    /// [`load`](VectorIndex::load), and [`delete`](VectorIndex::delete)
    /// when no explicit path is given.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Whether the index holds any documents.
    pub fn is_initialized(&self) -> bool {
        !self.vectors.is_empty()
    }

    /// Number of indexed chunks. Every `add` grows this; there is no
    /// deduplication.
    pub fn document_count(&self) -> usize {
        self.chunks.len()
    }

    /// The indexed chunks, in insertion order.
    pub fn documents(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The embedding provider backing this index.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Dimensionality of the index's vectors.
    ///
    /// Answers from stored vectors when the index is populated, otherwise
    /// from a probe embedding call, so the dimension is always available.
    pub async fn embedding_dimension(&self) -> Result<usize> {
        if let Some(first) = self.vectors.first() {
            return Ok(first.len());
        }
        Ok(self.embedder.embed("dimension probe").await?.len())
    }

    /// Build a fresh index from the given chunks, replacing any prior state.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyInput`] if `chunks` is empty, or an embedding
    /// error if the provider fails.
    pub async fn create(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            return Err(RagError::EmptyInput);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        check_uniform(&vectors)?;

        self.vectors = vectors;
        self.chunks = chunks;
        info!(documents = self.chunks.len(), "vector index created");
        Ok(())
    }

    /// Embed and append chunks, preserving everything already indexed.
    ///
    /// Behaves as [`create`](VectorIndex::create) when the index is empty.
    pub async fn add(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        if !self.is_initialized() {
            warn!("no existing index, creating a new one");
            return self.create(chunks).await;
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        check_uniform(&vectors)?;

        let expected = self.vectors[0].len();
        if let Some(first) = vectors.first() {
            if first.len() != expected {
                return Err(RagError::DimensionMismatch { expected, actual: first.len() });
            }
        }

        let added = chunks.len();
        self.vectors.extend(vectors);
        self.chunks.extend(chunks);
        info!(added, total = self.chunks.len(), "added documents to vector index");
        Ok(())
    }

    /// Return the `k` nearest chunks to the query, by ascending cosine
    /// distance.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotInitialized`] if no documents have been indexed
    /// or loaded yet.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if !self.is_initialized() {
            return Err(RagError::NotInitialized);
        }

        let query_vector = self.embedder.embed(query).await?;
        let expected = self.vectors[0].len();
        if query_vector.len() != expected {
            return Err(RagError::DimensionMismatch { expected, actual: query_vector.len() });
        }

        let mut results: Vec<SearchResult> = self
            .vectors
            .iter()
            .zip(self.chunks.iter())
            .map(|(vector, chunk)| SearchResult {
                chunk: chunk.clone(),
                score: cosine_distance(&query_vector, vector),
            })
            .collect();

        results.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        Ok(results)
    }

    /// Linear scan for chunks whose metadata matches the filter exactly,
    /// capped at `k` results. A structured complement to vector search; it
    /// does not touch the nearest-neighbour table.
    pub fn search_by_metadata(&self, filter: &MetadataFilter, k: usize) -> Vec<Chunk> {
        let results: Vec<Chunk> = self
            .chunks
            .iter()
            .filter(|c| filter.matches(&c.metadata))
            .take(k)
            .cloned()
            .collect();
        info!(matched = results.len(), "metadata filter search");
        results
    }

    /// Persist the vector table and chunk list side by side under `path`
    /// (default store path if `None`).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotInitialized`] if there is nothing to save, or
    /// an I/O or serialization error.
    pub async fn save(&self, path: Option<&Path>) -> Result<()> {
        if !self.is_initialized() {
            return Err(RagError::NotInitialized);
        }
        let dir = path.unwrap_or(&self.store_path);
        tokio::fs::create_dir_all(dir).await?;

        let persisted = PersistedVectors {
            dimension: self.vectors[0].len(),
            vectors: self.vectors.clone(),
        };
        tokio::fs::write(dir.join(VECTORS_FILE), serde_json::to_vec(&persisted)?).await?;
        tokio::fs::write(dir.join(CHUNKS_FILE), serde_json::to_vec(&self.chunks)?).await?;

        info!(path = %dir.display(), documents = self.chunks.len(), "vector index saved");
        Ok(())
    }

    /// Restore a persisted index from `path` (default store path if `None`).
    ///
    /// A missing directory or file is a normal outcome: a warning is logged
    /// and `Ok(false)` is returned with the index left untouched, so callers
    /// must check [`is_initialized`](VectorIndex::is_initialized) before
    /// querying. Returns `Ok(true)` on success.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InconsistentState`] if the vector and chunk files
    /// disagree on their counts, or [`RagError::DimensionMismatch`] if the
    /// persisted dimensionality does not match the configured provider. In
    /// both cases prior in-memory state is untouched.
    pub async fn load(&mut self, path: Option<&Path>) -> Result<bool> {
        let dir = path.unwrap_or(&self.store_path);
        let vectors_path = dir.join(VECTORS_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);

        if !vectors_path.exists() || !chunks_path.exists() {
            warn!(path = %dir.display(), "no persisted vector index found");
            return Ok(false);
        }

        let persisted: PersistedVectors =
            serde_json::from_slice(&tokio::fs::read(&vectors_path).await?)?;
        let chunks: Vec<Chunk> = serde_json::from_slice(&tokio::fs::read(&chunks_path).await?)?;

        if persisted.vectors.len() != chunks.len() {
            return Err(RagError::InconsistentState {
                index_len: persisted.vectors.len(),
                chunk_len: chunks.len(),
            });
        }
        let expected = self.embedder.dimensions();
        if persisted.dimension != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: persisted.dimension,
            });
        }

        self.vectors = persisted.vectors;
        self.chunks = chunks;
        info!(path = %dir.display(), documents = self.chunks.len(), "vector index loaded");
        Ok(true)
    }

    /// Clear in-memory state and remove persisted artifacts at the default
    /// store path. Idempotent.
    pub async fn delete(&mut self) -> Result<()> {
        self.vectors.clear();
        self.chunks.clear();
        if self.store_path.exists() {
            tokio::fs::remove_dir_all(&self.store_path).await?;
        }
        info!("vector index deleted");
        Ok(())
    }

    /// Summarize the index contents.
    pub fn info(&self) -> IndexInfo {
        let mut sources: Vec<String> =
            self.chunks.iter().map(|c| c.metadata.source.clone()).collect();
        sources.sort();
        sources.dedup();

        let total_characters: usize = self.chunks.iter().map(|c| c.text.len()).sum();
        let average_chunk_length = if self.chunks.is_empty() {
            0.0
        } else {
            total_characters as f64 / self.chunks.len() as f64
        };

        IndexInfo {
            initialized: self.is_initialized(),
            document_count: self.chunks.len(),
            sources,
            average_chunk_length,
            total_characters,
        }
    }
}

/// All vectors in one batch must share a dimensionality.
fn check_uniform(vectors: &[Vec<f32>]) -> Result<()> {
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    for vector in vectors {
        if vector.len() != first.len() {
            return Err(RagError::DimensionMismatch {
                expected: first.len(),
                actual: vector.len(),
            });
        }
    }
    Ok(())
}
