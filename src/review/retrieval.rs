//! Concurrent retrieval across sources, with search-term expansion.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use super::terms::TermGenerator;
use crate::config::Config;
use crate::models::Record;
use crate::sources::{Source, SourceError};
use crate::utils::text::word_count;

/// Knobs for one retrieval pass
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalSettings {
    /// Upper bound for one source's fetch, retries included
    pub adapter_timeout: Duration,
    pub max_topic_chars: usize,
    pub max_topic_words: usize,
    /// Alternative queries requested from the term generator
    pub max_terms: usize,
    /// Records requested from each source per query
    pub limit: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RetrievalSettings {
    fn from(config: &Config) -> Self {
        Self {
            adapter_timeout: config.retrieval.adapter_timeout(),
            max_topic_chars: config.retrieval.max_topic_chars,
            max_topic_words: config.retrieval.max_topic_words,
            max_terms: config.retrieval.max_terms,
            limit: config.sources.limit,
        }
    }
}

/// Fans a topic out to every source and merges what comes back
#[derive(Debug, Clone)]
pub struct RetrievalCoordinator {
    terms: Arc<dyn TermGenerator>,
    settings: RetrievalSettings,
}

impl RetrievalCoordinator {
    pub fn new(terms: Arc<dyn TermGenerator>, settings: RetrievalSettings) -> Self {
        Self { terms, settings }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    pub fn term_generator(&self) -> Arc<dyn TermGenerator> {
        Arc::clone(&self.terms)
    }

    /// Whether a topic is long enough to warrant compact search terms
    pub fn is_verbose(&self, topic: &str) -> bool {
        topic.chars().count() > self.settings.max_topic_chars
            || word_count(topic) > self.settings.max_topic_words
    }

    /// Query every source with the topic, then with generated terms if needed
    ///
    /// Terms are generated when the topic round found nothing or the topic is
    /// verbose. Results are ordered by query round, then source order, then
    /// each source's own order. Source failures are logged and skipped, so an
    /// empty result is a normal outcome.
    pub async fn fanout(
        &self,
        topic: &str,
        language: &str,
        sources: &[Arc<dyn Source>],
    ) -> Vec<Record> {
        let mut records = self.query_round(topic, sources).await;
        tracing::info!("Topic round returned {} records", records.len());

        if records.is_empty() || self.is_verbose(topic) {
            let terms = match self
                .terms
                .generate_terms(topic, language, self.settings.max_terms)
                .await
            {
                Ok(terms) => terms,
                Err(e) => {
                    tracing::warn!("Search term generation failed, continuing without: {}", e);
                    Vec::new()
                }
            };

            for term in terms {
                tracing::debug!("Querying generated term: {}", term);
                let found = self.query_round(&term, sources).await;
                tracing::info!("Term '{}' returned {} records", term, found.len());
                records.extend(found);
            }
        }

        records
    }

    /// One concurrent pass over every source for a single query
    async fn query_round(&self, query: &str, sources: &[Arc<dyn Source>]) -> Vec<Record> {
        let timeout = self.settings.adapter_timeout;
        let limit = self.settings.limit;

        let fetches = sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                let result = match tokio::time::timeout(timeout, source.fetch(query, limit)).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Other(format!(
                        "timed out after {}s",
                        timeout.as_secs()
                    ))),
                };
                (source, result)
            }
        });

        let mut merged = Vec::new();
        for (source, result) in join_all(fetches).await {
            match result {
                Ok(found) => {
                    tracing::debug!("{} returned {} records", source.name(), found.len());
                    merged.extend(found);
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}", source.name(), e);
                }
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::StaticTermGenerator;
    use crate::sources::mock::make_record;
    use crate::sources::MockSource;

    fn settings() -> RetrievalSettings {
        RetrievalSettings {
            adapter_timeout: Duration::from_secs(5),
            max_topic_chars: 300,
            max_topic_words: 30,
            max_terms: 3,
            limit: 50,
        }
    }

    fn keys(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.citekey.as_str()).collect()
    }

    #[tokio::test]
    async fn test_merges_in_source_order_and_skips_failures() {
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(MockSource::new("a").with_records(vec![
                make_record("A1", "a1", None),
                make_record("A2", "a2", None),
            ])),
            Arc::new(MockSource::new("broken").with_failure(SourceError::RateLimit)),
            Arc::new(MockSource::new("b").with_records(vec![make_record("B1", "b1", None)])),
        ];
        let terms = Arc::new(StaticTermGenerator::new(["unused"]));
        let coordinator = RetrievalCoordinator::new(terms.clone(), settings());

        let records = coordinator.fanout("soil carbon", "English", &sources).await;
        assert_eq!(keys(&records), vec!["A1", "A2", "B1"]);
        assert_eq!(terms.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(
                MockSource::new("slow")
                    .with_records(vec![make_record("S1", "s", None)])
                    .with_delay(Duration::from_secs(120)),
            ),
            Arc::new(MockSource::new("fast").with_records(vec![make_record("F1", "f", None)])),
        ];
        let coordinator =
            RetrievalCoordinator::new(Arc::new(StaticTermGenerator::new(Vec::<String>::new())), settings());

        let records = coordinator.fanout("topic", "English", &sources).await;
        assert_eq!(keys(&records), vec!["F1"]);
    }

    #[tokio::test]
    async fn test_empty_round_expands_terms() {
        let source = Arc::new(
            MockSource::new("a")
                .with_response("term one", vec![make_record("T1", "t1", None)])
                .with_response("term two", vec![make_record("T2", "t2", None)]),
        );
        let sources: Vec<Arc<dyn Source>> = vec![source.clone()];
        let coordinator = RetrievalCoordinator::new(
            Arc::new(StaticTermGenerator::new(["term one", "term two"])),
            settings(),
        );

        let records = coordinator.fanout("nothing matches", "English", &sources).await;
        assert_eq!(keys(&records), vec!["T1", "T2"]);
        assert_eq!(source.queries(), vec!["nothing matches", "term one", "term two"]);
    }

    #[tokio::test]
    async fn test_verbose_topic_expands_even_with_results() {
        let source = Arc::new(
            MockSource::new("a")
                .with_records(vec![make_record("D1", "d", None)])
                .with_response("short", vec![make_record("S1", "s", None)]),
        );
        let sources: Vec<Arc<dyn Source>> = vec![source.clone()];
        let coordinator =
            RetrievalCoordinator::new(Arc::new(StaticTermGenerator::new(["short"])), settings());

        let topic = "word ".repeat(40);
        assert!(coordinator.is_verbose(&topic));
        let records = coordinator.fanout(&topic, "English", &sources).await;
        assert_eq!(keys(&records), vec!["D1", "S1"]);
    }

    #[tokio::test]
    async fn test_term_failure_is_not_fatal() {
        let sources: Vec<Arc<dyn Source>> = vec![Arc::new(MockSource::new("empty"))];
        let coordinator =
            RetrievalCoordinator::new(Arc::new(StaticTermGenerator::failing()), settings());

        assert!(coordinator.fanout("topic", "English", &sources).await.is_empty());
    }
}
