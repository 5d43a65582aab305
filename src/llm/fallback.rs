//! Ordered provider chains: try each service until one answers.

use async_trait::async_trait;
use std::sync::Arc;

use super::{ChatMessage, Embedder, Generator, LlmError, ResponseSchema};

/// A successful generation and the provider that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub content: String,
    pub provider: String,
}

/// Generator that tries providers in order
#[derive(Debug, Clone, Default)]
pub struct FallbackGenerator {
    providers: Vec<Arc<dyn Generator>>,
}

impl FallbackGenerator {
    pub fn new(providers: Vec<Arc<dyn Generator>>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[Arc<dyn Generator>] {
        &self.providers
    }

    /// Generate with the first provider that succeeds, reporting which one
    pub async fn generate_with_provider(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> Result<Generated, LlmError> {
        if self.providers.is_empty() {
            return Err(LlmError::Config("no generation providers configured".to_string()));
        }

        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.generate(messages, schema).await {
                Ok(content) => {
                    return Ok(Generated {
                        content,
                        provider: provider.name().to_string(),
                    })
                }
                Err(e) => {
                    tracing::warn!("Generation provider '{}' failed: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(LlmError::AllProvidersFailed(failures.join("; ")))
    }
}

#[async_trait]
impl Generator for FallbackGenerator {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> Result<String, LlmError> {
        self.generate_with_provider(messages, schema)
            .await
            .map(|g| g.content)
    }
}

/// Embedder that tries providers in order
///
/// A whole call goes to one provider. [`Embedder::embed_batched`] falls back
/// for the full set of texts, so vectors from two models never share an index.
#[derive(Debug, Clone, Default)]
pub struct FallbackEmbedder {
    providers: Vec<Arc<dyn Embedder>>,
}

impl FallbackEmbedder {
    pub fn new(providers: Vec<Arc<dyn Embedder>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl Embedder for FallbackEmbedder {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.embed_batched(texts, texts.len()).await
    }

    async fn embed_batched(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        if self.providers.is_empty() {
            return Err(LlmError::Config("no embedding providers configured".to_string()));
        }

        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.embed_batched(texts, batch_size).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    tracing::warn!("Embedding provider '{}' failed: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(LlmError::AllProvidersFailed(failures.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockEmbedder, MockGenerator};

    #[tokio::test]
    async fn test_falls_through_to_secondary() {
        let primary = Arc::new(MockGenerator::failing("ollama"));
        let secondary = Arc::new(MockGenerator::new("openai").with_reply("{}"));
        let chain = FallbackGenerator::new(vec![primary.clone(), secondary.clone()]);

        let generated = chain
            .generate_with_provider(&[ChatMessage::user("x")], None)
            .await
            .unwrap();

        assert_eq!(generated.provider, "openai");
        assert_eq!(generated.content, "{}");
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = Arc::new(MockGenerator::new("ollama").with_reply("a"));
        let secondary = Arc::new(MockGenerator::new("openai").with_reply("b"));
        let chain = FallbackGenerator::new(vec![primary, secondary.clone()]);

        let generated = chain.generate_with_provider(&[], None).await.unwrap();
        assert_eq!(generated.provider, "ollama");
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_all_generators_fail() {
        let chain = FallbackGenerator::new(vec![
            Arc::new(MockGenerator::failing("a")),
            Arc::new(MockGenerator::failing("b")),
        ]);
        let err = chain.generate(&[], None).await.unwrap_err();
        match err {
            LlmError::AllProvidersFailed(msg) => {
                assert!(msg.contains("a:"));
                assert!(msg.contains("b:"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_is_config_error() {
        let chain = FallbackGenerator::default();
        assert!(matches!(chain.generate(&[], None).await, Err(LlmError::Config(_))));
        let embedder = FallbackEmbedder::default();
        assert!(matches!(embedder.embed(&[]).await, Err(LlmError::Config(_))));
    }

    #[tokio::test]
    async fn test_embedder_fallback() {
        let chain = FallbackEmbedder::new(vec![
            Arc::new(MockEmbedder::failing()),
            Arc::new(MockEmbedder::new(8)),
        ]);
        let vectors = chain.embed(&["soil".to_string()]).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].len(), 8);
    }

    #[tokio::test]
    async fn test_embedder_fallback_covers_every_batch() {
        // primary answers the first batch, then returns a short reply
        let primary = Arc::new(MockEmbedder::new(8).dropping_last_after(1));
        let secondary = Arc::new(MockEmbedder::new(8));
        let chain = FallbackEmbedder::new(vec![primary.clone(), secondary.clone()]);

        let texts: Vec<String> = (0..5).map(|i| format!("text {}", i)).collect();
        let vectors = chain.embed_batched(&texts, 2).await.unwrap();

        assert_eq!(vectors.len(), 5);
        assert_eq!(primary.batch_sizes(), vec![2, 2]);
        assert_eq!(secondary.batch_sizes(), vec![2, 2, 1]);
    }
}
