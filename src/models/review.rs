//! Review request and result models.

use serde::{Deserialize, Serialize};

use super::{CitationEntry, Record};

fn default_citation_format() -> String {
    "raw".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

/// Input to a literature review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Research topic or question
    pub topic: String,

    /// Citation style name (`raw`, `bibtex` or `apa7`)
    #[serde(default = "default_citation_format")]
    pub citation_format: String,

    /// Output language for the narrative
    #[serde(default = "default_language")]
    pub language: String,
}

impl ReviewRequest {
    /// Create a new request with default style and language
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            citation_format: default_citation_format(),
            language: default_language(),
        }
    }

    /// Set citation style
    pub fn citation_format(mut self, style: impl Into<String>) -> Self {
        self.citation_format = style.into();
        self
    }

    /// Set output language
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// Reference list rendered in one citation style
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedReferences {
    pub style: String,
    pub entries: Vec<String>,
}

/// Output of a literature review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// The topic as submitted
    pub query: String,

    /// Markdown narrative with `[citekey][doi]` markers
    pub result: String,

    /// Selected top-k records
    pub resources: Vec<Record>,

    /// Records the narrative actually cites, structured
    pub citations: Vec<CitationEntry>,

    pub references_formatted: FormattedReferences,

    /// Generation provider that produced the draft
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
}

impl ReviewResult {
    /// Result returned when no provider produced any record
    pub fn empty(topic: &str, style: &str) -> Self {
        Self {
            query: topic.to_string(),
            result: format!(
                "# Literature review on: {}\n\n## Limitations\nNo records were retrieved from the configured sources for this query.\n",
                topic
            ),
            resources: Vec::new(),
            citations: Vec::new(),
            references_formatted: FormattedReferences {
                style: style.to_string(),
                entries: Vec::new(),
            },
            generated_by: None,
        }
    }

    /// Whether retrieval came back empty ("no data available")
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.generated_by.is_none()
    }
}
