//! Grounded answer generation: prompt construction, parameter management,
//! and the blocking and streaming completion paths.

use std::sync::Arc;

use futures::{future, TryStreamExt};
use tracing::info;

use crate::error::Result;
use crate::llm::{ChatModel, ChatModelFactory, TextStream};

/// Fixed system instruction: persona plus grounding rules.
pub const SYSTEM_PROMPT: &str = "\
You are a helpful medical assistant. Provide accurate, informative responses \
based on the given context. Always:

1. Base your answers on the provided context
2. Be clear and professional
3. Include disclaimers when appropriate
4. Suggest consulting healthcare professionals for serious concerns
5. Cite sources when possible";

/// Human-turn template. `{context}` and `{question}` are substituted per call.
pub const PROMPT_TEMPLATE: &str = "Context: {context}\n\nQuestion: {question}\n\nAnswer:";

fn build_prompt(context: &str, question: &str) -> String {
    let human = PROMPT_TEMPLATE.replace("{context}", context).replace("{question}", question);
    format!("{SYSTEM_PROMPT}\n\n{human}")
}

/// Generation parameters, readable through [`Generator::config`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Chat model identifier.
    pub model_name: String,
    /// Sampling temperature used when no per-call override is given.
    pub temperature: f32,
    /// Token budget for generated answers.
    pub max_tokens: u32,
}

/// Snapshot of the generator's configuration, for diagnostics and UI display.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorInfo {
    /// Chat model identifier.
    pub model_name: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Token budget.
    pub max_tokens: u32,
    /// The human-turn prompt template with its placeholders.
    pub prompt_template: String,
}

/// Wraps a [`ChatModel`] with the fixed grounding prompt and mutable
/// generation parameters.
///
/// The model client is built through a [`ChatModelFactory`] so that
/// [`update`](Generator::update) can rebuild it when the model name changes
/// without re-resolving credentials.
pub struct Generator {
    factory: Arc<dyn ChatModelFactory>,
    model: Arc<dyn ChatModel>,
    config: GeneratorConfig,
}

impl Generator {
    /// Build a generator, creating the initial model client from the factory.
    pub fn new(factory: Arc<dyn ChatModelFactory>, config: GeneratorConfig) -> Result<Self> {
        let model = factory.create(&config.model_name)?;
        info!(
            model = %config.model_name,
            temperature = config.temperature,
            max_tokens = config.max_tokens,
            "generator initialized"
        );
        Ok(Self { factory, model, config })
    }

    /// Current generation parameters.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a grounded answer using the configured temperature.
    pub async fn generate(&self, query: &str, context: &str) -> Result<String> {
        self.generate_with_temperature(query, context, self.config.temperature).await
    }

    /// Generate a grounded answer with a temperature override for this call
    /// only; the configured value is untouched.
    pub async fn generate_with_temperature(
        &self,
        query: &str,
        context: &str,
        temperature: f32,
    ) -> Result<String> {
        let prompt = build_prompt(context, query);
        let response = self.model.complete(&prompt, temperature, self.config.max_tokens).await?;
        Ok(response.trim().to_string())
    }

    /// Generate a grounded answer as a stream of text fragments.
    ///
    /// Fragments with empty content are suppressed. The stream is finite and
    /// ends when the model signals completion.
    pub async fn stream(&self, query: &str, context: &str) -> Result<TextStream> {
        self.stream_with_temperature(query, context, self.config.temperature).await
    }

    /// Streaming variant with a temperature override for this call only.
    pub async fn stream_with_temperature(
        &self,
        query: &str,
        context: &str,
        temperature: f32,
    ) -> Result<TextStream> {
        let prompt = build_prompt(context, query);
        let inner =
            self.model.stream_complete(&prompt, temperature, self.config.max_tokens).await?;
        Ok(Box::pin(inner.try_filter(|fragment| future::ready(!fragment.is_empty()))))
    }

    /// Apply the provided fields, rebuilding the model client if the model
    /// name changed. Returns a log of what changed.
    pub fn update(
        &mut self,
        model_name: Option<&str>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<Vec<String>> {
        let mut changes = Vec::new();

        if let Some(model_name) = model_name {
            if model_name != self.config.model_name {
                self.model = self.factory.create(model_name)?;
                self.config.model_name = model_name.to_string();
                changes.push(format!("model: {model_name}"));
            }
        }
        if let Some(temperature) = temperature {
            if temperature != self.config.temperature {
                self.config.temperature = temperature;
                changes.push(format!("temperature: {temperature}"));
            }
        }
        if let Some(max_tokens) = max_tokens {
            if max_tokens != self.config.max_tokens {
                self.config.max_tokens = max_tokens;
                changes.push(format!("max_tokens: {max_tokens}"));
            }
        }

        if !changes.is_empty() {
            info!(changes = %changes.join(", "), "updated generator settings");
        }
        Ok(changes)
    }

    /// Describe the generator's configuration, including the prompt template.
    pub fn describe(&self) -> GeneratorInfo {
        GeneratorInfo {
            model_name: self.config.model_name.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            prompt_template: PROMPT_TEMPLATE.to_string(),
        }
    }
}
