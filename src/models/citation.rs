//! Structured citation entry.

use serde::{Deserialize, Serialize};

/// Plain-field rendering of one record, unformatted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEntry {
    pub citekey: String,
    pub title: String,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub publisher: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub source: String,
}
