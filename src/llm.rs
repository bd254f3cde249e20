//! Language-model capability traits.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;

/// A finite stream of generated text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A chat-completion capability.
///
/// Implementations wrap a specific model backend behind a synchronous
/// completion call and a streaming variant. Sampling parameters are passed
/// per call; the model identity is fixed at construction.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// The model identifier this client talks to.
    fn name(&self) -> &str;

    /// Run one completion and return the full response text.
    async fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String>;

    /// Run one completion in streaming mode.
    ///
    /// The returned stream yields response fragments as they arrive and ends
    /// when the model signals completion. Fragments may be empty; callers
    /// that do not want them should filter.
    async fn stream_complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<TextStream>;
}

/// Builds [`ChatModel`] clients for a given model name.
///
/// This is the credential-resolution seam: a factory carries whatever
/// credentials it was constructed with (config value or runtime-supplied)
/// and the rest of the pipeline stays agnostic. The
/// [`Generator`](crate::generator::Generator) uses it to rebuild its client
/// when the model name changes.
pub trait ChatModelFactory: Send + Sync {
    /// Create a client for the named model.
    fn create(&self, model_name: &str) -> Result<Arc<dyn ChatModel>>;
}
