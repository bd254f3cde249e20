//! The pipeline orchestrator: retrieval → context assembly → generation,
//! with timing metrics, settings updates, and response-quality scoring.
//!
//! [`Pipeline::answer`] is the failure-containment boundary for the whole
//! core: every exception from retrieval or generation is converted into a
//! well-formed [`Answer`] carrying the error message, never propagated to
//! the caller.

use std::time::Instant;

use futures::{Stream, StreamExt};
use tracing::{debug, error, info};

use crate::config::{Settings, SettingsUpdate};
use crate::document::SearchResult;
use crate::error::Result;
use crate::generator::{Generator, GeneratorInfo};
use crate::index::VectorIndex;
use crate::retriever::{assemble_blocks, Retriever};

/// Canned reply when retrieval produces nothing.
pub const NO_RESULTS_ANSWER: &str = "I couldn't find any relevant information in the \
indexed documents. Try rephrasing the question or adding more documents.";

/// Disclaimer phrases recognized by the quality heuristic.
const DISCLAIMER_PHRASES: &[&str] =
    &["consult", "doctor", "healthcare professional", "medical advice"];

/// Processing stage, recorded in traces as the pipeline advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Retrieving,
    NoResults,
    Generating,
    Done,
    Failed,
}

/// Timing and provenance metadata attached to every [`Answer`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerMetadata {
    /// Number of chunks retrieved for this answer.
    pub retrieved_docs: usize,
    /// Seconds spent in retrieval.
    pub retrieval_secs: f64,
    /// Seconds spent in generation.
    pub generation_secs: f64,
    /// Seconds from request to response.
    pub total_secs: f64,
    /// Model that generated the answer, when generation ran.
    pub model: Option<String>,
    /// Temperature the answer was generated with, when generation ran.
    pub temperature: Option<f32>,
    /// Error message, set only when the pipeline failed.
    pub error: Option<String>,
}

/// The result of one [`Pipeline::answer`] call. Always well-formed, even on
/// failure.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The answer text, a canned no-results message, or an error message.
    pub answer: String,
    /// The raw retrieval results the answer was grounded in.
    pub sources: Vec<SearchResult>,
    /// The assembled context string, when generation ran.
    pub context: Option<String>,
    /// Timing and provenance metadata.
    pub metadata: AnswerMetadata,
}

/// Independent signals about a generated answer, combined into a heuristic
/// quality score. Diagnostic only, not a correctness oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityMetrics {
    /// Character length of the response.
    pub response_length: usize,
    /// Number of retrieval results behind the response.
    pub num_sources_used: usize,
    /// Mean source relevance (`1 - distance`), 0 with no sources.
    pub avg_source_relevance: f32,
    /// Whether a disclaimer phrase appears in the response.
    pub contains_disclaimer: bool,
    /// Whether any source name is textually echoed in the response.
    pub cites_sources: bool,
    /// Sum of the true signals, 0.2 each, in `{0, 0.2, 0.4, 0.6, 0.8, 1.0}`.
    pub quality_score: f32,
}

/// Status and configuration snapshot, for diagnostics and UI display.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInfo {
    /// Always `"ready"` for a constructed pipeline.
    pub status: String,
    /// Generator configuration including the prompt template.
    pub generator: GeneratorInfo,
    /// Retrieval depth per query.
    pub retrieval_k: usize,
}

/// Composes retrieval and generation into a single `answer` operation.
pub struct Pipeline {
    generator: Generator,
    settings: Settings,
}

impl Pipeline {
    /// Build a pipeline from a configured generator and settings.
    pub fn new(generator: Generator, settings: Settings) -> Self {
        Self { generator, settings }
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Answer a query against the given index.
    ///
    /// `temperature` overrides the configured sampling temperature for this
    /// call only; persisted settings are untouched. Never returns an error:
    /// failures produce an [`Answer`] whose text carries the message and
    /// whose metadata records it.
    pub async fn answer(
        &self,
        query: &str,
        index: &VectorIndex,
        temperature: Option<f32>,
    ) -> Answer {
        let start = Instant::now();
        match self.try_answer(query, index, temperature, start).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(stage = ?Stage::Failed, error = %e, "pipeline failed");
                Answer {
                    answer: format!("I encountered an error: {e}"),
                    sources: Vec::new(),
                    context: None,
                    metadata: AnswerMetadata {
                        error: Some(e.to_string()),
                        total_secs: start.elapsed().as_secs_f64(),
                        ..AnswerMetadata::default()
                    },
                }
            }
        }
    }

    async fn try_answer(
        &self,
        query: &str,
        index: &VectorIndex,
        temperature: Option<f32>,
        start: Instant,
    ) -> Result<Answer> {
        debug!(stage = ?Stage::Retrieving, k = self.settings.retrieval_k, "answering query");

        let retrieval_start = Instant::now();
        let sources = self.retrieve(query, index).await?;
        let retrieval_secs = retrieval_start.elapsed().as_secs_f64();

        if sources.is_empty() {
            debug!(stage = ?Stage::NoResults, "no relevant documents retrieved");
            return Ok(Answer {
                answer: NO_RESULTS_ANSWER.to_string(),
                sources,
                context: None,
                metadata: AnswerMetadata {
                    retrieved_docs: 0,
                    retrieval_secs,
                    total_secs: start.elapsed().as_secs_f64(),
                    ..AnswerMetadata::default()
                },
            });
        }

        let context = assemble_blocks(&sources, self.settings.max_context_length);
        debug!(stage = ?Stage::Generating, context_length = context.len(), "generating answer");

        let temperature = temperature.unwrap_or(self.settings.temperature);
        let generation_start = Instant::now();
        let answer =
            self.generator.generate_with_temperature(query, &context, temperature).await?;
        let generation_secs = generation_start.elapsed().as_secs_f64();

        let total_secs = start.elapsed().as_secs_f64();
        info!(stage = ?Stage::Done, total_secs, retrieved = sources.len(), "answered query");

        Ok(Answer {
            answer,
            metadata: AnswerMetadata {
                retrieved_docs: sources.len(),
                retrieval_secs,
                generation_secs,
                total_secs,
                model: Some(self.generator.config().model_name.clone()),
                temperature: Some(temperature),
                error: None,
            },
            sources,
            context: Some(context),
        })
    }

    async fn retrieve(&self, query: &str, index: &VectorIndex) -> Result<Vec<SearchResult>> {
        let retriever = Retriever::new(index);
        match self.settings.score_threshold {
            Some(threshold) => {
                retriever.search_with_threshold(query, self.settings.retrieval_k, threshold).await
            }
            None => retriever.search(query, self.settings.retrieval_k).await,
        }
    }

    /// Answer a query as a lazy stream of text fragments.
    ///
    /// The no-results message and error messages are yielded as single
    /// fragments; the stream never panics or errors.
    pub fn stream_answer<'a>(
        &'a self,
        query: &'a str,
        index: &'a VectorIndex,
    ) -> impl Stream<Item = String> + Send + 'a {
        async_stream::stream! {
            let sources = match self.retrieve(query, index).await {
                Ok(sources) => sources,
                Err(e) => {
                    error!(error = %e, "streaming retrieval failed");
                    yield format!("Error generating response: {e}");
                    return;
                }
            };
            if sources.is_empty() {
                yield NO_RESULTS_ANSWER.to_string();
                return;
            }

            let context = assemble_blocks(&sources, self.settings.max_context_length);
            let temperature = self.settings.temperature;
            match self.generator.stream_with_temperature(query, &context, temperature).await {
                Ok(mut fragments) => {
                    while let Some(fragment) = fragments.next().await {
                        match fragment {
                            Ok(text) => yield text,
                            Err(e) => {
                                error!(error = %e, "streaming generation failed");
                                yield format!("Error generating response: {e}");
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "streaming generation failed");
                    yield format!("Error generating response: {e}");
                }
            }
        }
    }

    /// Answer a batch of queries sequentially. Each query is isolated: one
    /// failure becomes that query's error answer and the batch continues.
    pub async fn answer_batch(&self, queries: &[String], index: &VectorIndex) -> Vec<Answer> {
        info!(queries = queries.len(), "processing query batch");
        let mut answers = Vec::with_capacity(queries.len());
        for (i, query) in queries.iter().enumerate() {
            debug!(query = i + 1, total = queries.len(), "processing batch query");
            answers.push(self.answer(query, index, None).await);
        }
        answers
    }

    /// Apply a settings update, logging each changed field. In-flight calls
    /// are unaffected. Returns the change log.
    pub fn update_settings(&mut self, update: &SettingsUpdate) -> Vec<String> {
        let (next, changes) = self.settings.apply(update);
        for change in &changes {
            info!(%change, "updated pipeline setting");
        }
        self.settings = next;
        changes
    }

    /// Score a generated response with five independent heuristics, 0.2 each.
    pub fn evaluate_quality(
        &self,
        _query: &str,
        response: &str,
        sources: &[SearchResult],
    ) -> QualityMetrics {
        let response_lower = response.to_lowercase();

        let avg_source_relevance = if sources.is_empty() {
            0.0
        } else {
            sources.iter().map(|s| 1.0 - s.score).sum::<f32>() / sources.len() as f32
        };
        let contains_disclaimer =
            DISCLAIMER_PHRASES.iter().any(|phrase| response_lower.contains(phrase));
        let cites_sources = sources.iter().any(|s| {
            let source = &s.chunk.metadata.source;
            !source.is_empty() && response.contains(source.as_str())
        });

        let signals = [
            response.len() > 50,
            sources.len() >= 2,
            avg_source_relevance > 0.7,
            contains_disclaimer,
            cites_sources,
        ];
        let quality_score = signals.iter().filter(|s| **s).count() as f32 / 5.0;

        QualityMetrics {
            response_length: response.len(),
            num_sources_used: sources.len(),
            avg_source_relevance,
            contains_disclaimer,
            cites_sources,
            quality_score,
        }
    }

    /// Snapshot the pipeline's status and configuration.
    pub fn info(&self) -> PipelineInfo {
        PipelineInfo {
            status: "ready".to_string(),
            generator: self.generator.describe(),
            retrieval_k: self.settings.retrieval_k,
        }
    }

    /// Mutable access to the generator, for model/parameter updates.
    pub fn generator_mut(&mut self) -> &mut Generator {
        &mut self.generator
    }
}
