//! Registry for managing metadata source adapters.

use std::sync::Arc;

use super::{Source, SourceError};
use crate::config::Config;

/// Ordered collection of the sources taking part in a review
///
/// Registration order is kept: the retrieval fan-out reports records in
/// source order, so the registry is a list rather than a map.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the `[sources] enabled` list
    ///
    /// Sources are registered in the configured order. Ids that are unknown or
    /// whose Cargo feature is disabled are skipped with a warning. Sources
    /// that need a key are registered even when it is missing; they fail
    /// at fetch time.
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let mut registry = Self::new();
        let retry = config.retry.to_retry_config();

        for id in &config.sources.enabled {
            let id = id.trim().to_lowercase();
            match id.as_str() {
                #[cfg(feature = "source-crossref")]
                "crossref" => registry.register(Arc::new(
                    super::CrossRefSource::new(config.contact.mailto.clone())?.with_retry(retry),
                )),
                #[cfg(feature = "source-scopus")]
                "scopus" => registry.register(Arc::new(
                    super::ScopusSource::new(
                        config.api_keys.elsevier.clone(),
                        config.api_keys.elsevier_inst_token.clone(),
                    )?
                    .with_retry(retry),
                )),
                #[cfg(feature = "source-wos")]
                "wos" => registry.register(Arc::new(
                    super::WosSource::new(config.api_keys.wos.clone())?.with_retry(retry),
                )),
                #[cfg(feature = "source-openalex")]
                "openalex" => registry.register(Arc::new(
                    super::OpenAlexSource::new(config.contact.mailto.clone())?.with_retry(retry),
                )),
                #[cfg(feature = "source-semantic")]
                "semantic" => registry.register(Arc::new(
                    super::SemanticScholarSource::new(config.api_keys.semantic_scholar.clone())?
                        .with_retry(retry),
                )),
                other => {
                    tracing::warn!("Skipping unknown or disabled source '{}'", other);
                }
            }
        }

        for source in registry.all() {
            if source.requires_credentials() && !source.has_credentials() {
                tracing::warn!(
                    "Source '{}' is enabled but has no credentials; it will be skipped at fetch time",
                    source.id()
                );
            }
        }

        Ok(registry)
    }

    /// Register a source, replacing any source with the same id in place
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.sources.iter_mut().find(|s| s.id() == source.id()) {
            Some(existing) => *existing = source,
            None => self.sources.push(source),
        }
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// All registered sources, in registration order
    pub fn all(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// Get all source IDs
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
