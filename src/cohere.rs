//! Cohere-backed embedding and chat providers.
//!
//! Both clients talk to the Cohere v2 REST API through `reqwest`. Credentials
//! come from the constructor or the `COHERE_API_KEY` environment variable;
//! [`CohereFactory`] carries them for clients that are rebuilt at runtime.

use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{ChatModel, ChatModelFactory, TextStream};

/// Base URL of the Cohere v2 API.
const COHERE_API_BASE: &str = "https://api.cohere.com/v2";

/// Default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "embed-english-v3.0";

/// Dimensionality of `embed-english-v3.0` vectors.
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1024;

/// Default chat model.
const DEFAULT_CHAT_MODEL: &str = "command-r-plus";

fn api_key_from_env() -> Result<String> {
    std::env::var("COHERE_API_KEY").map_err(|_| RagError::Config(
        "COHERE_API_KEY environment variable not set".to_string(),
    ))
}

fn check_api_key(api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(RagError::Config("API key must not be empty".to_string()));
    }
    Ok(())
}

/// Extract a human-readable message from a Cohere error body.
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    serde_json::from_str::<ErrorBody>(body).map(|e| e.message).unwrap_or_else(|_| body.to_string())
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the Cohere `/v2/embed` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::cohere::CohereEmbedder;
///
/// let embedder = CohereEmbedder::from_env()?;
/// let vector = embedder.embed("hello world").await?;
/// assert_eq!(vector.len(), embedder.dimensions());
/// ```
pub struct CohereEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    input_type: String,
    dimensions: usize,
}

impl CohereEmbedder {
    /// Create a new embedder with the given API key and the default
    /// `embed-english-v3.0` model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(&api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            input_type: "search_document".to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        })
    }

    /// Create a new embedder using the `COHERE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Set the embedding model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the reported vector dimensionality (model dependent).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set the Cohere `input_type` sent with embed requests
    /// (`search_document`, `search_query`, …).
    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = input_type.into();
        self
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: Vec<&'a str>,
    input_type: &'a str,
    embedding_types: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: EmbedVectors,
}

#[derive(Deserialize)]
struct EmbedVectors {
    float: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for CohereEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::Embedding {
            provider: "Cohere".into(),
            message: "API returned an empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = "Cohere", batch_size = texts.len(), model = %self.model, "embedding batch");

        let request = EmbedRequest {
            model: &self.model,
            texts: texts.to_vec(),
            input_type: &self.input_type,
            embedding_types: &["float"],
        };

        let response = self
            .client
            .post(format!("{COHERE_API_BASE}/embed"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "Cohere", error = %e, "embed request failed");
                RagError::Embedding {
                    provider: "Cohere".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = "Cohere", %status, "embed API error");
            return Err(RagError::Embedding {
                provider: "Cohere".into(),
                message: format!("API returned {status}: {}", error_detail(&body)),
            });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| RagError::Embedding {
            provider: "Cohere".into(),
            message: format!("failed to parse response: {e}"),
        })?;

        Ok(parsed.embeddings.float)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Chat ───────────────────────────────────────────────────────────

/// A [`ChatModel`] backed by the Cohere `/v2/chat` endpoint.
///
/// Supports blocking completion and server-sent-event streaming.
pub struct CohereChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl CohereChat {
    /// Create a new chat client with the given API key and the default
    /// `command-r-plus` model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(&api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_CHAT_MODEL.to_string(),
        })
    }

    /// Create a new chat client using the `COHERE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Set the chat model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request_body(&self, prompt: &str, temperature: f32, max_tokens: u32, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": temperature,
            "max_tokens": max_tokens,
            "stream": stream,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: Option<String>,
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    message: Option<StreamDeltaMessage>,
}

#[derive(Deserialize)]
struct StreamDeltaMessage {
    content: Option<StreamDeltaContent>,
}

#[derive(Deserialize)]
struct StreamDeltaContent {
    text: Option<String>,
}

fn generation_error(message: impl Into<String>) -> RagError {
    RagError::Generation { provider: "Cohere".into(), message: message.into() }
}

#[async_trait]
impl ChatModel for CohereChat {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        debug!(provider = "Cohere", model = %self.model, temperature, "chat completion");

        let response = self
            .client
            .post(format!("{COHERE_API_BASE}/chat"))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt, temperature, max_tokens, false))
            .send()
            .await
            .map_err(|e| {
                error!(provider = "Cohere", error = %e, "chat request failed");
                generation_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = "Cohere", %status, "chat API error");
            return Err(generation_error(format!("API returned {status}: {}", error_detail(&body))));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| generation_error(format!("failed to parse response: {e}")))?;

        Ok(parsed.message.content.into_iter().filter_map(|b| b.text).collect::<Vec<_>>().join(""))
    }

    async fn stream_complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<TextStream> {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let body = self.request_body(prompt, temperature, max_tokens, true);

        let stream = try_stream! {
            let response = client
                .post(format!("{COHERE_API_BASE}/chat"))
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| generation_error(format!("request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                Err(generation_error(format!("API returned {status}: {}", error_detail(&text))))?;
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(part) = bytes.next().await {
                let part = part.map_err(|e| generation_error(format!("stream failed: {e}")))?;
                buffer.push_str(&String::from_utf8_lossy(&part));

                while let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    let Some(payload) = line.trim().strip_prefix("data:") else {
                        continue;
                    };
                    let payload = payload.trim();
                    if payload.is_empty() || payload == "[DONE]" {
                        continue;
                    }
                    let Ok(event) = serde_json::from_str::<StreamEvent>(payload) else {
                        continue;
                    };
                    if event.kind.as_deref() != Some("content-delta") {
                        continue;
                    }
                    if let Some(text) = event
                        .delta
                        .and_then(|d| d.message)
                        .and_then(|m| m.content)
                        .and_then(|c| c.text)
                    {
                        yield text;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

// ── Factory ────────────────────────────────────────────────────────

/// A [`ChatModelFactory`] that builds [`CohereChat`] clients.
///
/// Carries the API key so the [`Generator`](crate::generator::Generator) can
/// rebuild its client for a new model name without re-resolving credentials.
pub struct CohereFactory {
    api_key: String,
}

impl CohereFactory {
    /// Create a factory with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(&api_key)?;
        Ok(Self { api_key })
    }

    /// Create a factory using the `COHERE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }
}

impl ChatModelFactory for CohereFactory {
    fn create(&self, model_name: &str) -> Result<Arc<dyn ChatModel>> {
        Ok(Arc::new(CohereChat::new(self.api_key.clone())?.with_model(model_name)))
    }
}
