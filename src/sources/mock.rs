//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{Record, RecordBuilder, SourceType};
use crate::sources::{Source, SourceError};

/// A mock source that returns predefined records and records every query
/// it receives.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    name: String,
    records: Vec<Record>,
    responses: HashMap<String, Vec<Record>>,
    failure: Option<SourceError>,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl MockSource {
    /// Create a mock source with the given id and no records
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: format!("Mock {}", id),
            id,
            records: Vec::new(),
            responses: HashMap::new(),
            failure: None,
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Records returned for any query without a specific response
    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    /// Records returned for one exact query
    pub fn with_response(mut self, query: impl Into<String>, records: Vec<Record>) -> Self {
        self.responses.insert(query.into(), records);
        self
    }

    /// Fail every fetch with this error
    pub fn with_failure(mut self, error: SourceError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queries received so far, in call order
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::Other(self.id.clone())
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Record>, SourceError> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(query.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let records = self.responses.get(query).unwrap_or(&self.records);
        Ok(records.iter().take(limit).cloned().collect())
    }
}

/// Helper function to create a record for testing.
pub fn make_record(citekey: &str, title: &str, doi: Option<&str>) -> Record {
    RecordBuilder::new(citekey, title, SourceType::Other("mock".to_string()))
        .abstract_text(format!("Abstract of {}", title))
        .doi(doi.unwrap_or_default())
        .build()
}
