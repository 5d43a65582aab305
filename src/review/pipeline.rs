//! End-to-end review orchestration.

use std::sync::Arc;
use tracing::Instrument;

use super::retrieval::{RetrievalCoordinator, RetrievalSettings};
use super::selector::RelevanceSelector;
use super::synthesizer::DraftSynthesizer;
use super::terms::{LlmTermGenerator, TermGenerator};
use super::{render_markdown, resolve, ReviewError, Stage};
use crate::config::Config;
use crate::llm::{
    Embedder, FallbackEmbedder, FallbackGenerator, Generator, LlmError, OpenAiCompatClient,
};
use crate::models::{FormattedReferences, ReviewRequest, ReviewResult};
use crate::sources::SourceRegistry;
use crate::utils::{dedupe_citekeys, format_citation, structured_citation, CitationStyle};

const DEFAULT_TOP_K: usize = 12;
const DEFAULT_EMBED_BATCH: usize = 100;

/// Runs a review from topic to formatted references
///
/// Each call builds its own record set, index and draft, so one pipeline can
/// serve concurrent requests.
#[derive(Debug, Clone)]
pub struct ReviewPipeline {
    registry: SourceRegistry,
    retrieval: RetrievalCoordinator,
    selector: RelevanceSelector,
    synthesizer: DraftSynthesizer,
    top_k: usize,
}

impl ReviewPipeline {
    /// Assemble a pipeline from its collaborators
    pub fn new(
        registry: SourceRegistry,
        terms: Arc<dyn TermGenerator>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<FallbackGenerator>,
    ) -> Self {
        Self {
            registry,
            retrieval: RetrievalCoordinator::new(terms, RetrievalSettings::default()),
            selector: RelevanceSelector::new(embedder, DEFAULT_EMBED_BATCH),
            synthesizer: DraftSynthesizer::new(generator),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Build the configured sources and services
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let registry = SourceRegistry::from_config(config)
            .map_err(|e| LlmError::Config(format!("failed to build sources: {}", e)))?;

        let mut providers: Vec<Arc<dyn Generator>> =
            vec![Arc::new(OpenAiCompatClient::new(&config.llm.primary)?)];
        if let Some(secondary) = &config.llm.secondary {
            providers.push(Arc::new(OpenAiCompatClient::new(secondary)?));
        }
        let generator = Arc::new(FallbackGenerator::new(providers));

        let embedder: Arc<dyn Embedder> = Arc::new(FallbackEmbedder::new(vec![Arc::new(
            OpenAiCompatClient::new(&config.embedding)?,
        )]));
        let terms: Arc<dyn TermGenerator> = Arc::new(LlmTermGenerator::new(generator.clone()));

        Ok(Self::new(registry, terms, embedder.clone(), generator)
            .with_retrieval_settings(RetrievalSettings::from(config))
            .with_selector(RelevanceSelector::new(embedder, config.selection.embed_batch_size))
            .with_top_k(config.selection.top_k))
    }

    pub fn with_retrieval_settings(mut self, settings: RetrievalSettings) -> Self {
        let terms = self.retrieval.term_generator();
        self.retrieval = RetrievalCoordinator::new(terms, settings);
        self
    }

    pub fn with_selector(mut self, selector: RelevanceSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Records handed to the generation step
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run a literature review
    ///
    /// The topic and citation style are validated before any network call.
    /// An empty retrieval is a successful, empty result.
    pub async fn synthesize_review(
        &self,
        request: &ReviewRequest,
    ) -> Result<ReviewResult, ReviewError> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(ReviewError::InvalidRequest(
                "topic must not be empty".to_string(),
            ));
        }
        let style: CitationStyle = request.citation_format.parse()?;
        let language = match request.language.trim() {
            "" => "English",
            language => language,
        };

        let span = tracing::info_span!("review", topic = %topic, style = style.id());
        self.run(request, topic, language, style).instrument(span).await
    }

    async fn run(
        &self,
        request: &ReviewRequest,
        topic: &str,
        language: &str,
        style: CitationStyle,
    ) -> Result<ReviewResult, ReviewError> {
        enter(Stage::Retrieving);
        let records = self
            .retrieval
            .fanout(topic, language, self.registry.all())
            .await;
        if records.is_empty() {
            tracing::info!("No records retrieved");
            enter(Stage::Done);
            return Ok(ReviewResult::empty(&request.topic, style.id()));
        }

        enter(Stage::Normalizing);
        let records = dedupe_citekeys(records);

        enter(Stage::Selecting);
        let top = self
            .selector
            .select_top_k(topic, records.clone(), self.top_k)
            .await?;

        enter(Stage::Synthesizing);
        let synthesis = self.synthesizer.synthesize(topic, language, &top).await?;
        tracing::info!("Draft written by '{}'", synthesis.provider);

        enter(Stage::Resolving);
        let resolution = resolve(&synthesis.draft, &records);

        enter(Stage::Formatting);
        let entries: Vec<String> = resolution
            .selected
            .iter()
            .map(|r| format_citation(r, style))
            .collect();
        let citations = resolution.selected.iter().map(structured_citation).collect();
        let result = render_markdown(&synthesis.draft, &resolution, &entries);

        enter(Stage::Done);
        Ok(ReviewResult {
            query: request.topic.clone(),
            result,
            resources: top,
            citations,
            references_formatted: FormattedReferences {
                style: style.id().to_string(),
                entries,
            },
            generated_by: Some(synthesis.provider),
        })
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "Entering stage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockEmbedder, MockGenerator};
    use crate::review::StaticTermGenerator;
    use crate::sources::mock::make_record;
    use crate::sources::MockSource;

    fn pipeline(source: MockSource, generator: MockGenerator) -> ReviewPipeline {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(source));
        ReviewPipeline::new(
            registry,
            Arc::new(StaticTermGenerator::new(Vec::<String>::new())),
            Arc::new(MockEmbedder::new(32)),
            Arc::new(FallbackGenerator::new(vec![Arc::new(generator)])),
        )
    }

    #[tokio::test]
    async fn test_blank_topic_rejected() {
        let generator = MockGenerator::new("ollama");
        let p = pipeline(MockSource::new("m"), generator);
        let err = p.synthesize_review(&ReviewRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, ReviewError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_unknown_style_checked_before_retrieval() {
        let source = MockSource::new("m");
        let mut registry = SourceRegistry::new();
        let source = Arc::new(source);
        registry.register(source.clone());
        let p = ReviewPipeline::new(
            registry,
            Arc::new(StaticTermGenerator::new(Vec::<String>::new())),
            Arc::new(MockEmbedder::new(8)),
            Arc::new(FallbackGenerator::default()),
        );

        let err = p
            .synthesize_review(&ReviewRequest::new("soil").citation_format("mla"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::UnsupportedStyle(_)));
        assert!(source.queries().is_empty());
    }

    #[tokio::test]
    async fn test_full_review() {
        let source = MockSource::new("m").with_records(vec![
            make_record("Lee2021", "soil carbon stocks", Some("10.1/a")),
            make_record("Lee2021", "soil carbon loss", None),
        ]);
        let generator = MockGenerator::new("ollama").with_reply(
            r#"{"title": "Soil", "summary": "S.", "sections": [{"heading": "H", "body": "Rise (Lee2021a; Lee2021b)."}], "limitations": "L.", "references": ["Lee2021a", "Lee2021b", "Ghost2000"]}"#,
        );

        let result = pipeline(source, generator)
            .synthesize_review(&ReviewRequest::new("soil carbon").citation_format("raw"))
            .await
            .unwrap();

        assert_eq!(result.generated_by.as_deref(), Some("ollama"));
        assert_eq!(result.resources.len(), 2);
        assert_eq!(
            result.references_formatted.entries,
            vec!["Lee2021a – 10.1/a", "Lee2021b"]
        );
        assert_eq!(result.citations.len(), 2);
        assert!(result.result.contains("Rise [Lee2021a][10.1/a]; [Lee2021b]."));
        assert!(result.result.contains("## References\n- Lee2021a – 10.1/a\n- Lee2021b"));
    }
}
