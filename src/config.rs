//! Pipeline settings: defaults, validation, environment loading, and the
//! pure settings-diff used by [`Pipeline::update_settings`](crate::pipeline::Pipeline::update_settings).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Process-wide pipeline settings.
///
/// Constructed through [`Settings::builder`] (validated) or
/// [`Settings::from_env`]. Mutated only through [`Settings::apply`], which
/// diffs against a [`SettingsUpdate`] and reports what changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Chat model identifier.
    pub model_name: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks to retrieve per query.
    pub retrieval_k: usize,
    /// Token budget for generated answers.
    pub max_tokens: u32,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Character budget for assembled context.
    pub max_context_length: usize,
    /// Optional distance threshold for retrieval; results with a score above
    /// it are discarded. `None` disables threshold filtering.
    pub score_threshold: Option<f32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_name: "command-r-plus".to_string(),
            embedding_model: "embed-english-v3.0".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            retrieval_k: 3,
            max_tokens: 1000,
            temperature: 0.1,
            max_context_length: 4000,
            score_threshold: None,
        }
    }
}

impl Settings {
    /// Create a new builder for constructing validated [`Settings`].
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Load settings from the environment, reading a `.env` file first if
    /// one is present.
    ///
    /// Recognized variables: `DOCQA_MODEL`, `DOCQA_EMBEDDING_MODEL`,
    /// `DOCQA_CHUNK_SIZE`, `DOCQA_CHUNK_OVERLAP`, `DOCQA_RETRIEVAL_K`,
    /// `DOCQA_MAX_TOKENS`, `DOCQA_TEMPERATURE`, `DOCQA_MAX_CONTEXT_LENGTH`.
    /// Unset variables fall back to the defaults. Provider credentials
    /// (`COHERE_API_KEY`) are read by the provider constructors, not here.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a variable is set but unparseable, or
    /// if the resulting settings fail validation.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = Self::builder();
        if let Some(v) = env_var("DOCQA_MODEL")? {
            builder = builder.model_name(v);
        }
        if let Some(v) = env_var("DOCQA_EMBEDDING_MODEL")? {
            builder = builder.embedding_model(v);
        }
        if let Some(v) = parse_env_var("DOCQA_CHUNK_SIZE")? {
            builder = builder.chunk_size(v);
        }
        if let Some(v) = parse_env_var("DOCQA_CHUNK_OVERLAP")? {
            builder = builder.chunk_overlap(v);
        }
        if let Some(v) = parse_env_var("DOCQA_RETRIEVAL_K")? {
            builder = builder.retrieval_k(v);
        }
        if let Some(v) = parse_env_var("DOCQA_MAX_TOKENS")? {
            builder = builder.max_tokens(v);
        }
        if let Some(v) = parse_env_var("DOCQA_TEMPERATURE")? {
            builder = builder.temperature(v);
        }
        if let Some(v) = parse_env_var("DOCQA_MAX_CONTEXT_LENGTH")? {
            builder = builder.max_context_length(v);
        }
        builder.build()
    }

    /// Apply an update, returning the new settings together with a change log.
    ///
    /// Pure: `self` is untouched. Fields that are absent from the update, or
    /// equal to their current value, produce no change-log entry.
    pub fn apply(&self, update: &SettingsUpdate) -> (Settings, Vec<String>) {
        let mut next = self.clone();
        let mut changes = Vec::new();

        if let Some(temperature) = update.temperature {
            if temperature != next.temperature {
                next.temperature = temperature;
                changes.push(format!("temperature: {temperature}"));
            }
        }
        if let Some(k) = update.retrieval_k {
            if k != next.retrieval_k {
                next.retrieval_k = k;
                changes.push(format!("retrieval_k: {k}"));
            }
        }

        (next, changes)
    }
}

fn env_var(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(v) if v.is_empty() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(_) => Ok(None),
    }
}

fn parse_env_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env_var(name)? {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| RagError::Config(format!("invalid value for {name}: '{v}'"))),
        None => Ok(None),
    }
}

/// A partial settings update; only the present fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SettingsUpdate {
    /// New sampling temperature.
    pub temperature: Option<f32>,
    /// New retrieval depth.
    pub retrieval_k: Option<usize>,
}

/// Builder for constructing validated [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Set the chat model identifier.
    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.settings.model_name = name.into();
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, name: impl Into<String>) -> Self {
        self.settings.embedding_model = name.into();
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.settings.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.settings.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per query.
    pub fn retrieval_k(mut self, k: usize) -> Self {
        self.settings.retrieval_k = k;
        self
    }

    /// Set the token budget for generated answers.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.settings.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.settings.temperature = temperature;
        self
    }

    /// Set the character budget for assembled context.
    pub fn max_context_length(mut self, length: usize) -> Self {
        self.settings.max_context_length = length;
        self
    }

    /// Set the optional retrieval distance threshold.
    pub fn score_threshold(mut self, threshold: f32) -> Self {
        self.settings.score_threshold = Some(threshold);
        self
    }

    /// Build the [`Settings`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `retrieval_k == 0`
    /// - `max_tokens == 0`
    /// - `temperature` is outside `[0, 1]`
    /// - `max_context_length == 0`
    pub fn build(self) -> Result<Settings> {
        let s = self.settings;
        if s.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if s.chunk_overlap >= s.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                s.chunk_overlap, s.chunk_size
            )));
        }
        if s.retrieval_k == 0 {
            return Err(RagError::Config("retrieval_k must be greater than zero".to_string()));
        }
        if s.max_tokens == 0 {
            return Err(RagError::Config("max_tokens must be greater than zero".to_string()));
        }
        if !(0.0..=1.0).contains(&s.temperature) {
            return Err(RagError::Config(format!(
                "temperature ({}) must be within [0, 1]",
                s.temperature
            )));
        }
        if s.max_context_length == 0 {
            return Err(RagError::Config(
                "max_context_length must be greater than zero".to_string(),
            ));
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_overlap_not_below_size() {
        let err = Settings::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn builder_rejects_zero_k() {
        let err = Settings::builder().retrieval_k(0).build().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn builder_rejects_out_of_range_temperature() {
        let err = Settings::builder().temperature(1.5).build().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn apply_reports_only_changed_fields() {
        let settings = Settings::default();
        let update =
            SettingsUpdate { temperature: Some(settings.temperature), retrieval_k: Some(5) };
        let (next, changes) = settings.apply(&update);
        assert_eq!(changes, vec!["retrieval_k: 5".to_string()]);
        assert_eq!(next.retrieval_k, 5);
        assert_eq!(next.temperature, settings.temperature);
        // original untouched
        assert_eq!(settings.retrieval_k, 3);
    }
}
