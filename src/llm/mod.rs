//! Text-generation and embedding services.
//!
//! Both capabilities sit behind one trait each, [`Generator`] and
//! [`Embedder`], so the review pipeline never talks HTTP itself.
//! [`OpenAiCompatClient`] implements both against any server speaking the
//! OpenAI `/v1/chat/completions` and `/v1/embeddings` protocol (OpenAI
//! itself, Ollama, vLLM). [`FallbackGenerator`] and [`FallbackEmbedder`]
//! try an ordered list of services and report which one answered.

mod client;
mod fallback;
pub mod mock;

pub use client::OpenAiCompatClient;
pub use fallback::{FallbackEmbedder, FallbackGenerator, Generated};
pub use mock::{MockEmbedder, MockGenerator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat message for completion requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Named JSON schema the reply must conform to
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Text generation service
#[async_trait]
pub trait Generator: Send + Sync + std::fmt::Debug {
    /// Name reported in logs and in `generated_by`
    fn name(&self) -> &str;

    /// Run one chat completion and return the reply text
    ///
    /// With a schema the service is asked for JSON conforming to it; callers
    /// still parse defensively.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> Result<String, LlmError>;
}

/// Embedding service
#[async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Embed a batch of texts; one vector per input, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Embed any number of texts in requests of at most `batch_size`
    ///
    /// Every vector comes from this embedder. A reply with the wrong number
    /// of vectors is a parse error.
    async fn embed_batched(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            let embedded = self.embed(batch).await?;
            if embedded.len() != batch.len() {
                return Err(LlmError::Parse(format!(
                    "{} returned {} vectors for {} texts",
                    self.name(),
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

/// Errors from generation and embedding services
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status from the service
    #[error("{service} returned HTTP {status}: {message}")]
    Service {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    /// The service answered without content
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// Misconfigured client (bad URL, no providers)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every provider in a fallback chain failed
    #[error("All providers failed: {0}")]
    AllProvidersFailed(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Parse(err.to_string())
    }
}
