//! Draft synthesis through the generation chain.

use std::sync::Arc;

use super::prompts::{draft_messages, DRAFT_SCHEMA_NAME};
use super::ReviewError;
use crate::llm::{FallbackGenerator, LlmError, ResponseSchema};
use crate::models::{Draft, Record};
use crate::utils::citekey::extract_citekeys;

/// A parsed draft and the provider that wrote it
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub draft: Draft,
    pub provider: String,
}

/// Asks the generation chain for a structured review draft
#[derive(Debug, Clone)]
pub struct DraftSynthesizer {
    generator: Arc<FallbackGenerator>,
}

impl DraftSynthesizer {
    pub fn new(generator: Arc<FallbackGenerator>) -> Self {
        Self { generator }
    }

    /// Draft a review of `records`
    ///
    /// Providers are tried in order. A reply that does not parse as a draft
    /// counts as that provider failing, so the next one gets a turn. When the
    /// draft lists no references they are recovered from the section bodies.
    pub async fn synthesize(
        &self,
        topic: &str,
        language: &str,
        records: &[Record],
    ) -> Result<Synthesis, ReviewError> {
        let messages = draft_messages(topic, language, records);
        let schema = ResponseSchema::new(DRAFT_SCHEMA_NAME, Draft::json_schema());

        let mut failures = Vec::new();
        for provider in self.generator.providers() {
            let reply = match provider.generate(&messages, Some(&schema)).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("Generation provider '{}' failed: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                    continue;
                }
            };

            match parse_draft(&reply) {
                Ok(mut draft) => {
                    if draft.references.is_empty() {
                        draft.references = recover_references(&draft);
                        tracing::debug!(
                            "Recovered {} citekeys from section bodies",
                            draft.references.len()
                        );
                    }
                    tracing::info!("Draft generated by '{}'", provider.name());
                    return Ok(Synthesis {
                        draft,
                        provider: provider.name().to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!("Provider '{}' returned an unusable draft: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        let error = if failures.is_empty() {
            LlmError::Config("no generation providers configured".to_string())
        } else {
            LlmError::AllProvidersFailed(failures.join("; "))
        };
        Err(ReviewError::Generation(error))
    }
}

/// Citekeys cited in the section bodies, first-seen order, without repeats
fn recover_references(draft: &Draft) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    draft
        .sections
        .iter()
        .flat_map(|s| extract_citekeys(&s.body))
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Parse a generation reply into a [`Draft`]
///
/// Accepts bare JSON, JSON inside a code fence, or JSON surrounded by prose.
pub fn parse_draft(reply: &str) -> Result<Draft, LlmError> {
    let json = extract_json(reply)
        .ok_or_else(|| LlmError::Parse("reply contains no JSON object".to_string()))?;
    let draft: Draft = serde_json::from_str(json)?;
    if draft.title.trim().is_empty() && draft.sections.is_empty() {
        return Err(LlmError::Parse("draft has neither title nor sections".to_string()));
    }
    Ok(draft)
}

/// The outermost `{...}` span of a reply
pub(crate) fn extract_json(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockGenerator;
    use crate::sources::mock::make_record;

    const DRAFT: &str = r#"{
        "title": "Soil carbon",
        "summary": "Short.",
        "sections": [{"heading": "Stocks", "body": "Stocks rise (Lee2021a; Kim2020). Decline noted (Kim2020)."}],
        "limitations": "Few records.",
        "references": []
    }"#;

    #[test]
    fn test_parse_draft_tolerates_fences() {
        let reply = format!("Here you go:\n```json\n{}\n```\nThanks", DRAFT);
        let draft = parse_draft(&reply).unwrap();
        assert_eq!(draft.title, "Soil carbon");
        assert_eq!(draft.sections.len(), 1);
    }

    #[test]
    fn test_parse_draft_rejects_prose() {
        assert!(matches!(parse_draft("I cannot help with that."), Err(LlmError::Parse(_))));
        assert!(parse_draft("{\"summary\": \"only\"}").is_err());
    }

    #[tokio::test]
    async fn test_synthesize_recovers_references() {
        let generator = FallbackGenerator::new(vec![Arc::new(
            MockGenerator::new("ollama").with_reply(DRAFT),
        )]);
        let synthesizer = DraftSynthesizer::new(Arc::new(generator));

        let synthesis = synthesizer
            .synthesize("soil", "English", &[make_record("Lee2021a", "t", None)])
            .await
            .unwrap();

        assert_eq!(synthesis.provider, "ollama");
        assert_eq!(synthesis.draft.references, vec!["Lee2021a", "Kim2020"]);
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_through() {
        let primary = Arc::new(MockGenerator::new("ollama").with_reply("not json"));
        let secondary = Arc::new(MockGenerator::new("openai").with_reply(DRAFT));
        let synthesizer = DraftSynthesizer::new(Arc::new(FallbackGenerator::new(vec![
            primary.clone(),
            secondary,
        ])));

        let synthesis = synthesizer.synthesize("soil", "English", &[]).await.unwrap();
        assert_eq!(synthesis.provider, "openai");
        assert_eq!(primary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_generation_error() {
        let synthesizer = DraftSynthesizer::new(Arc::new(FallbackGenerator::new(vec![
            Arc::new(MockGenerator::failing("ollama")),
            Arc::new(MockGenerator::failing("openai")),
        ])));

        let err = synthesizer.synthesize("soil", "English", &[]).await.unwrap_err();
        assert!(matches!(err, ReviewError::Generation(LlmError::AllProvidersFailed(_))));
    }
}
