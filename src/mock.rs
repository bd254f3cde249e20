//! Deterministic test doubles for the embedding and chat capabilities.
//!
//! [`HashEmbedder`] gives real similarity structure with no network: texts
//! sharing tokens land near each other in the hashed bag-of-words space, so
//! ranking and threshold behavior can be exercised end to end.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{ChatModel, ChatModelFactory, TextStream};

/// A feature-hashing bag-of-words embedder.
///
/// Each lowercased alphanumeric token is hashed into one of `dimensions`
/// buckets; the resulting count vector is L2-normalized. Deterministic and
/// cheap, with enough similarity structure for realistic retrieval tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Create an embedder producing vectors of the given dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn bucket_of(token: &str, dimensions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimensions
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
        {
            vector[bucket_of(&token, self.dimensions)] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A scripted chat model that records how it was called.
pub struct MockChat {
    reply: String,
    fragments: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    last_temperature: Mutex<Option<f32>>,
}

impl MockChat {
    /// A model that always answers with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            fragments: Vec::new(),
            fail: false,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            last_temperature: Mutex::new(None),
        }
    }

    /// Script the fragments yielded by [`stream_complete`](ChatModel::stream_complete).
    pub fn with_fragments(mut self, fragments: Vec<&str>) -> Self {
        self.fragments = fragments.into_iter().map(String::from).collect();
        self
    }

    /// A model whose every call fails with a generation error.
    pub fn failing() -> Self {
        let mut mock = Self::new("");
        mock.fail = true;
        mock
    }

    /// Number of completed or attempted calls (blocking and streaming).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The prompt of the most recent call.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }

    /// The temperature of the most recent call.
    pub fn last_temperature(&self) -> Option<f32> {
        *self.last_temperature.lock().unwrap()
    }

    fn record(&self, prompt: &str, temperature: f32) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        *self.last_temperature.lock().unwrap() = Some(temperature);
    }
}

#[async_trait]
impl ChatModel for MockChat {
    fn name(&self) -> &str {
        "mock-chat"
    }

    async fn complete(&self, prompt: &str, temperature: f32, _max_tokens: u32) -> Result<String> {
        self.record(prompt, temperature);
        if self.fail {
            return Err(RagError::Generation {
                provider: "Mock".into(),
                message: "scripted failure".into(),
            });
        }
        Ok(self.reply.clone())
    }

    async fn stream_complete(
        &self,
        prompt: &str,
        temperature: f32,
        _max_tokens: u32,
    ) -> Result<TextStream> {
        self.record(prompt, temperature);
        if self.fail {
            return Err(RagError::Generation {
                provider: "Mock".into(),
                message: "scripted failure".into(),
            });
        }
        let fragments = self.fragments.clone();
        Ok(futures::stream::iter(fragments.into_iter().map(Ok)).boxed())
    }
}

/// A [`ChatModelFactory`] that always hands out the same shared [`MockChat`].
pub struct MockFactory {
    model: Arc<MockChat>,
}

impl MockFactory {
    /// Wrap an existing mock so tests can keep a handle to it.
    pub fn new(model: Arc<MockChat>) -> Self {
        Self { model }
    }
}

impl ChatModelFactory for MockFactory {
    fn create(&self, _model_name: &str) -> Result<Arc<dyn ChatModel>> {
        Ok(self.model.clone())
    }
}
