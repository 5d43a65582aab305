//! Relevance selection: embed records and keep those nearest the topic.

use std::sync::Arc;

use super::ReviewError;
use crate::llm::{Embedder, LlmError};
use crate::models::Record;
use crate::utils::text::truncate_words;

/// Word cap per embedded text, roughly the embedding model's token limit
const MAX_EMBED_WORDS: usize = 8192;

/// Text a record is embedded as
///
/// Title, `(venue)` and abstract separated by blank lines; whatever is
/// missing is left out, and a record with nothing at all falls back to its
/// citekey.
pub fn record_text(record: &Record) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !record.title.trim().is_empty() {
        parts.push(record.title.trim().to_string());
    }
    if let Some(venue) = &record.venue {
        parts.push(format!("({})", venue));
    }
    if let Some(abstract_text) = record.r#abstract.as_deref().filter(|a| !a.trim().is_empty()) {
        parts.push(abstract_text.trim().to_string());
    }
    if parts.is_empty() {
        return record.citekey.clone();
    }
    truncate_words(&parts.join("\n\n"), MAX_EMBED_WORDS)
}

/// In-memory flat index ranking payloads by cosine similarity
#[derive(Debug, Clone)]
pub struct SimilarityIndex<T> {
    dimensions: usize,
    entries: Vec<(Vec<f32>, T)>,
}

impl<T> SimilarityIndex<T> {
    /// Create an index for vectors of one dimensionality
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
        }
    }

    /// Add a vector with its payload
    pub fn add(&mut self, vector: Vec<f32>, payload: T) -> Result<(), LlmError> {
        if vector.len() != self.dimensions {
            return Err(LlmError::Parse(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        self.entries.push((vector, payload));
        Ok(())
    }

    /// Consume the index, returning the payloads of the `k` nearest entries
    ///
    /// Most similar first; ties keep insertion order.
    pub fn into_nearest(self, query: &[f32], k: usize) -> Result<Vec<T>, LlmError> {
        let order = self.ranked(query, k)?;
        let mut slots: Vec<Option<T>> = self.entries.into_iter().map(|(_, p)| Some(p)).collect();
        Ok(order
            .into_iter()
            .filter_map(|(_, i)| slots[i].take())
            .collect())
    }

    /// Entry positions by descending score
    fn ranked(&self, query: &[f32], k: usize) -> Result<Vec<(f32, usize)>, LlmError> {
        if query.len() != self.dimensions {
            return Err(LlmError::Parse(format!(
                "query has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(f32, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (vector, _))| {
                let score = cosine_similarity(query, vector);
                (if score.is_nan() { f32::NEG_INFINITY } else { score }, i)
            })
            .collect();
        // stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Picks the records most relevant to a topic
#[derive(Debug, Clone)]
pub struct RelevanceSelector {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl RelevanceSelector {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Return the `k` records nearest `topic`, most similar first
    ///
    /// Always returns `min(k, records.len())` records; ties keep input order.
    pub async fn select_top_k(
        &self,
        topic: &str,
        records: Vec<Record>,
        k: usize,
    ) -> Result<Vec<Record>, ReviewError> {
        if records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        // the topic is embedded last, in the same call as the records
        let mut texts: Vec<String> = records.iter().map(record_text).collect();
        texts.push(topic.to_string());
        let mut vectors = self
            .embedder
            .embed_batched(&texts, self.batch_size)
            .await
            .map_err(ReviewError::Embedding)?;

        let query = vectors.pop().ok_or_else(|| {
            ReviewError::Embedding(LlmError::EmptyResponse(self.embedder.name().to_string()))
        })?;

        let mut index = SimilarityIndex::new(query.len());
        for (vector, record) in vectors.into_iter().zip(records) {
            index.add(vector, record).map_err(ReviewError::Embedding)?;
        }

        let selected = index.into_nearest(&query, k).map_err(ReviewError::Embedding)?;
        tracing::debug!("Selected {} of {} records", selected.len(), texts.len() - 1);
        Ok(selected)
    }
}
