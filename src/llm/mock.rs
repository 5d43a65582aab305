//! Mock generation and embedding services for testing purposes.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use super::{ChatMessage, Embedder, Generator, LlmError, ResponseSchema};

/// A mock generator with canned replies
///
/// Replies can be keyed by the requested schema name, so one mock can serve
/// both term generation and drafting.
#[derive(Debug)]
pub struct MockGenerator {
    name: String,
    reply: Option<String>,
    schema_replies: HashMap<String, String>,
    fail: bool,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockGenerator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reply: None,
            schema_replies: HashMap::new(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A generator whose every call fails
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    /// Reply used when no schema-specific reply matches
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Reply used when the request carries the named schema
    pub fn with_schema_reply(mut self, schema: impl Into<String>, reply: impl Into<String>) -> Self {
        self.schema_replies.insert(schema.into(), reply.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Messages of every call so far
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(messages.to_vec());

        if self.fail {
            return Err(LlmError::Service {
                service: self.name.clone(),
                status: 503,
                message: "mock failure".to_string(),
            });
        }

        schema
            .and_then(|s| self.schema_replies.get(&s.name))
            .or(self.reply.as_ref())
            .cloned()
            .ok_or_else(|| LlmError::EmptyResponse(self.name.clone()))
    }
}

/// A deterministic embedder for tests
///
/// Texts are embedded as hashed bags of lowercase words, so texts sharing
/// words land close together under cosine similarity.
#[derive(Debug)]
pub struct MockEmbedder {
    dimensions: usize,
    overrides: HashMap<String, Vec<f32>>,
    fail: bool,
    short_after: Option<usize>,
    batches: Mutex<Vec<usize>>,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            overrides: HashMap::new(),
            fail: false,
            short_after: None,
            batches: Mutex::new(Vec::new()),
        }
    }

    /// An embedder whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(8)
        }
    }

    /// Return one vector fewer than requested
    pub fn dropping_last(self) -> Self {
        self.dropping_last_after(0)
    }

    /// Answer `calls` requests correctly, then return one vector too few
    pub fn dropping_last_after(mut self, calls: usize) -> Self {
        self.short_after = Some(calls);
        self
    }

    /// Fixed vector for an exact text
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.overrides.insert(text.into(), vector);
        self
    }

    /// Size of every batch embedded so far
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.overrides.get(text) {
            return v.clone();
        }
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if word.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let call = {
            let mut batches = self.batches.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            batches.push(texts.len());
            batches.len() - 1
        };

        if self.fail {
            return Err(LlmError::Http("mock embedder unavailable".to_string()));
        }

        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vector_for(t)).collect();
        if self.short_after.is_some_and(|after| call >= after) {
            vectors.pop();
        }
        Ok(vectors)
    }
}
