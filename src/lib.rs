//! # docqa
//!
//! Retrieval-augmented question answering over local document collections.
//!
//! Documents are split into overlapping chunks, embedded, and stored in a
//! vector index; questions are answered by retrieving the nearest chunks and
//! asking a chat model to synthesize an answer grounded in that context.
//!
//! ## Overview
//!
//! - [`RecursiveChunker`] — separator-aware chunking with overlap
//! - [`VectorIndex`] — embedding storage, cosine-distance search, persistence
//! - [`Retriever`] — threshold filtering and bounded context assembly
//! - [`Generator`] — grounded prompt construction and (streaming) generation
//! - [`Pipeline`] — the `answer` orchestration with timing and quality metrics
//! - [`DocQaService`] — the facade a UI layer talks to
//!
//! Scores are cosine distances throughout: lower means more similar.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa::{CohereEmbedder, CohereFactory, DocQaService, PlainTextLoader, Settings};
//!
//! let mut service = DocQaService::new(
//!     Arc::new(PlainTextLoader),
//!     Arc::new(CohereEmbedder::from_env()?),
//!     Arc::new(CohereFactory::from_env()?),
//!     Settings::from_env()?,
//! )?;
//!
//! service.process_documents(&files).await;
//! let answer = service.ask("What does the discharge summary recommend?").await;
//! println!("{}", answer.answer);
//! ```

pub mod chunking;
pub mod cohere;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod index;
pub mod llm;
pub mod loader;
pub mod mock;
pub mod pipeline;
pub mod retriever;
pub mod service;

pub use chunking::{ChunkStats, RecursiveChunker};
pub use cohere::{CohereChat, CohereEmbedder, CohereFactory};
pub use config::{Settings, SettingsUpdate};
pub use document::{Chunk, ChunkMetadata, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generator::{Generator, GeneratorConfig};
pub use index::{IndexInfo, MetadataFilter, VectorIndex};
pub use llm::{ChatModel, ChatModelFactory, TextStream};
pub use loader::{DocumentLoader, PlainTextLoader};
pub use pipeline::{Answer, AnswerMetadata, Pipeline, QualityMetrics};
pub use retriever::Retriever;
pub use service::{DocQaService, IngestReport, ServiceStatus};
