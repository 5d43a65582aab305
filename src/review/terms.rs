//! Compact search-term generation for verbose or unproductive topics.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};

use super::prompts::{terms_messages, terms_schema, TERMS_SCHEMA_NAME};
use super::synthesizer::extract_json;
use crate::llm::{FallbackGenerator, LlmError, ResponseSchema};

/// Terms closer than this (normalized Levenshtein) count as the same query
const NEAR_DUPLICATE: f64 = 0.9;

/// Derives short database queries from a topic
#[async_trait]
pub trait TermGenerator: Send + Sync + std::fmt::Debug {
    /// Up to `max_terms` queries, most useful first
    async fn generate_terms(
        &self,
        topic: &str,
        language: &str,
        max_terms: usize,
    ) -> Result<Vec<String>, LlmError>;
}

#[derive(Debug, Deserialize)]
struct SearchTerms {
    #[serde(default)]
    terms: Vec<String>,
}

/// Term generator backed by the generation chain
#[derive(Debug, Clone)]
pub struct LlmTermGenerator {
    generator: Arc<FallbackGenerator>,
}

impl LlmTermGenerator {
    pub fn new(generator: Arc<FallbackGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl TermGenerator for LlmTermGenerator {
    async fn generate_terms(
        &self,
        topic: &str,
        language: &str,
        max_terms: usize,
    ) -> Result<Vec<String>, LlmError> {
        let messages = terms_messages(topic, language, max_terms);
        let schema = ResponseSchema::new(TERMS_SCHEMA_NAME, terms_schema());
        let generated = self
            .generator
            .generate_with_provider(&messages, Some(&schema))
            .await?;

        let json = extract_json(&generated.content)
            .ok_or_else(|| LlmError::Parse("search terms reply contains no JSON".to_string()))?;
        let parsed: SearchTerms = serde_json::from_str(json)?;

        let terms = clean_terms(parsed.terms, max_terms);
        tracing::debug!("'{}' generated {} search terms", generated.provider, terms.len());
        Ok(terms)
    }
}

/// Trim, drop blanks and near-duplicates, and cap at `max_terms`
pub(crate) fn clean_terms(terms: Vec<String>, max_terms: usize) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    if max_terms == 0 {
        return kept;
    }
    for term in terms {
        let term = term.trim().to_string();
        if term.is_empty() {
            continue;
        }
        let lower = term.to_lowercase();
        let duplicate = kept
            .iter()
            .any(|k| strsim::normalized_levenshtein(&k.to_lowercase(), &lower) >= NEAR_DUPLICATE);
        if !duplicate {
            kept.push(term);
        }
        if kept.len() >= max_terms {
            break;
        }
    }
    kept
}

/// Term generator returning a fixed list, for tests and offline runs
#[derive(Debug, Default)]
pub struct StaticTermGenerator {
    terms: Vec<String>,
    fail: bool,
    calls: Mutex<usize>,
}

impl StaticTermGenerator {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A generator whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TermGenerator for StaticTermGenerator {
    async fn generate_terms(
        &self,
        _topic: &str,
        _language: &str,
        max_terms: usize,
    ) -> Result<Vec<String>, LlmError> {
        *self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        if self.fail {
            return Err(LlmError::EmptyResponse("static".to_string()));
        }
        Ok(clean_terms(self.terms.clone(), max_terms))
    }
}
