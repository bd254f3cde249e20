//! The UI-facing facade: document ingestion, question answering, status, and
//! settings updates in one place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{filter_by_length, RecursiveChunker, MIN_CHUNK_LENGTH};
use crate::config::{Settings, SettingsUpdate};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::{Generator, GeneratorConfig};
use crate::index::VectorIndex;
use crate::llm::ChatModelFactory;
use crate::loader::{extension_of, is_supported, DocumentLoader};
use crate::pipeline::{Answer, Pipeline};

/// Outcome of ingesting one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    /// The file path as given.
    pub file: String,
    /// Number of chunks indexed from this file.
    pub chunks: usize,
    /// Error message if this file failed.
    pub error: Option<String>,
}

/// Outcome of a batch ingestion. One bad file never aborts the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Per-file outcomes, in input order.
    pub files: Vec<FileReport>,
    /// Number of files ingested successfully.
    pub succeeded: usize,
    /// Number of files that failed.
    pub failed: usize,
    /// Total chunks indexed across the batch.
    pub total_chunks: usize,
}

/// Readiness snapshot for a UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Whether any documents have been indexed.
    pub initialized: bool,
    /// Number of indexed chunks.
    pub document_count: usize,
}

/// Owns the whole stack: loader, chunker, vector index, and pipeline.
///
/// This is the surface a UI layer talks to; everything else in the crate is
/// reachable through it or usable standalone.
pub struct DocQaService {
    loader: Arc<dyn DocumentLoader>,
    chunker: RecursiveChunker,
    index: VectorIndex,
    pipeline: Pipeline,
}

impl DocQaService {
    /// Assemble a service from its collaborators and settings.
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn EmbeddingProvider>,
        factory: Arc<dyn ChatModelFactory>,
        settings: Settings,
    ) -> Result<Self> {
        let chunker = RecursiveChunker::new(settings.chunk_size, settings.chunk_overlap);
        let index = VectorIndex::new(embedder);
        let generator = Generator::new(
            factory,
            GeneratorConfig {
                model_name: settings.model_name.clone(),
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            },
        )?;
        let pipeline = Pipeline::new(generator, settings);
        Ok(Self { loader, chunker, index, pipeline })
    }

    /// Load, chunk, and index a batch of files.
    ///
    /// Failures are isolated per file: an unsupported extension, a read
    /// error, or an embedding error is recorded in that file's report and
    /// the batch continues.
    pub async fn process_documents(&mut self, paths: &[PathBuf]) -> IngestReport {
        let mut report = IngestReport::default();

        for path in paths {
            match self.process_one(path).await {
                Ok(chunks) => {
                    report.succeeded += 1;
                    report.total_chunks += chunks;
                    report.files.push(FileReport {
                        file: path.display().to_string(),
                        chunks,
                        error: None,
                    });
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to process document");
                    report.failed += 1;
                    report.files.push(FileReport {
                        file: path.display().to_string(),
                        chunks: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            total_chunks = report.total_chunks,
            "processed document batch"
        );
        report
    }

    async fn process_one(&mut self, path: &Path) -> Result<usize> {
        if !is_supported(path) {
            return Err(RagError::UnsupportedFormat { extension: extension_of(path) });
        }

        let documents = self.loader.load(path)?;
        let chunks = filter_by_length(self.chunker.chunk(&documents), MIN_CHUNK_LENGTH);
        if chunks.is_empty() {
            return Ok(0);
        }

        let count = chunks.len();
        self.index.add(chunks).await?;
        Ok(count)
    }

    /// Answer a question against the indexed documents.
    pub async fn ask(&self, query: &str) -> Answer {
        self.pipeline.answer(query, &self.index, None).await
    }

    /// Report whether the service is ready to answer and how much it holds.
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            initialized: self.index.is_initialized(),
            document_count: self.index.document_count(),
        }
    }

    /// Apply a settings update to the pipeline, returning the change log.
    pub fn update_settings(&mut self, update: &SettingsUpdate) -> Vec<String> {
        self.pipeline.update_settings(update)
    }

    /// The underlying vector index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Mutable access to the index, for save/load/delete.
    pub fn index_mut(&mut self) -> &mut VectorIndex {
        &mut self.index
    }

    /// The underlying pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
