//! Bibliographic metadata sources with a trait-based adapter architecture.
//!
//! This module defines the [`Source`] trait that every metadata provider
//! implements. Each adapter turns a free-text topic into the provider's query
//! form, pages through results, and maps the provider payload into canonical
//! [`Record`]s with a synthesized citekey.
//!
//! # Feature Flags
//!
//! Individual sources can be disabled at compile time using Cargo features:
//!
//! - `crossref` - Crossref Works API (default: enabled)
//! - `scopus` - Elsevier Scopus Search API, needs `ELSEVIER_API_KEY` (default: enabled)
//! - `wos` - Clarivate Web of Science API, needs `WOS_API_KEY` (default: enabled)
//! - `openalex` - OpenAlex works search (default: enabled)
//! - `semantic` - Semantic Scholar graph search (default: enabled)
//!
//! # Feature Groups
//!
//! - `open` - crossref, openalex, semantic (no credentials needed)
//! - `licensed` - scopus, wos
//! - `full` - All sources (default)
//!
//! # Runtime Source Configuration
//!
//! Which compiled-in sources take part in a review, and in which order, is
//! controlled by `[sources] enabled` in the configuration file or the
//! `RESEARCH_REVIEW_SOURCES__ENABLED` environment variable.

#[cfg(feature = "source-crossref")]
mod crossref;
#[cfg(feature = "source-openalex")]
mod openalex;
mod registry;
#[cfg(feature = "source-scopus")]
mod scopus;
#[cfg(feature = "source-semantic")]
mod semantic;
#[cfg(feature = "source-wos")]
mod wos;

pub mod mock;

#[cfg(feature = "source-crossref")]
pub use crossref::CrossRefSource;
pub use mock::MockSource;
#[cfg(feature = "source-openalex")]
pub use openalex::OpenAlexSource;
pub use registry::SourceRegistry;
#[cfg(feature = "source-scopus")]
pub use scopus::ScopusSource;
#[cfg(feature = "source-semantic")]
pub use semantic::SemanticScholarSource;
#[cfg(feature = "source-wos")]
pub use wos::WosSource;

use async_trait::async_trait;
use std::future::Future;

use crate::models::{Record, SourceType};

/// The Source trait defines the interface for all metadata provider adapters.
///
/// # Implementing a New Source
///
/// 1. Create a struct holding an [`HttpClient`](crate::utils::HttpClient) and its base URL
/// 2. Implement `id`, `name`, `source_type` and `fetch`
/// 3. Override `requires_credentials`/`has_credentials` if the provider needs a key
/// 4. Add the source to [`SourceRegistry::from_config`]
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g., "crossref", "scopus")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Provider tag attached to every record this source returns
    fn source_type(&self) -> SourceType;

    /// Whether the provider refuses anonymous requests
    fn requires_credentials(&self) -> bool {
        false
    }

    /// Whether credentials this source needs are configured
    fn has_credentials(&self) -> bool {
        true
    }

    /// Fetch up to `limit` records for a free-text query
    ///
    /// Implementations page through results until `limit` records are
    /// collected or the provider runs out, retrying transient failures.
    /// Missing credentials fail immediately with
    /// [`SourceError::MissingCredentials`].
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Record>, SourceError>;
}

/// Errors that can occur when working with sources
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// A credential the provider requires is not configured
    #[error("Missing credentials: {0} is not set")]
    MissingCredentials(String),

    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status from the provider
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// API error reported in the provider payload
    #[error("API error: {0}")]
    Api(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

/// Map a provider response status into a [`SourceError`]
///
/// 429 becomes [`SourceError::RateLimit`], any other non-success status a
/// [`SourceError::Status`] that the retry policy classifies by code.
pub(crate) fn check_status(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::RateLimit);
    }
    Err(SourceError::Status {
        status: status.as_u16(),
        message: format!("{} API returned status: {}", provider, status),
    })
}

/// One page of provider results
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records mapped from the page
    pub records: Vec<Record>,
    /// Items the provider returned, including any the adapter skipped
    pub returned: usize,
}

impl Page {
    pub fn new(records: Vec<Record>, returned: usize) -> Self {
        Self { records, returned }
    }
}

/// Page through a provider until `limit` records are collected
///
/// `fetch_page(offset, rows)` returns one page. Paging stops at `limit`, on
/// a page shorter than requested, or on a page with no usable records. A failure on the
/// first page is returned; a failure on a later page ends paging and keeps
/// what was already collected.
pub async fn paginate<F, Fut>(
    limit: usize,
    page_size: usize,
    mut fetch_page: F,
) -> Result<Vec<Record>, SourceError>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Page, SourceError>>,
{
    let rows = page_size.max(1).min(limit);
    let mut records: Vec<Record> = Vec::new();
    let mut offset = 0;

    while records.len() < limit {
        let page = match fetch_page(offset, rows).await {
            Ok(page) => page,
            Err(e) if offset == 0 => return Err(e),
            Err(e) => {
                tracing::warn!("Stopping pagination at offset {}: {}", offset, e);
                break;
            }
        };

        tracing::debug!(
            "Fetched page at offset {} ({} items, {} records)",
            offset,
            page.returned,
            page.records.len()
        );
        let usable = page.records.len();
        records.extend(page.records);
        offset += page.returned;

        if page.returned < rows || usable == 0 {
            break;
        }
    }

    records.truncate(limit);
    Ok(records)
}

/// Field-qualified query syntax of one provider
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSyntax {
    /// Prefix wrapped around a bare topic, e.g. `TITLE-ABS-KEY` or `TS=`
    pub wrapper: &'static str,
    /// Character that follows a field tag
    pub delimiter: char,
    /// Field tags the provider understands
    pub tags: &'static [&'static str],
}

/// Wrap a bare topic in a field qualifier unless it already starts with one
///
/// Only a known tag directly before the provider's delimiter counts, so
/// `AI(ethics)` is still wrapped for a provider whose tags end in `=`.
pub(crate) fn qualify(topic: &str, syntax: &FieldSyntax) -> String {
    let trimmed = topic.trim();
    let field = syntax.wrapper;
    let already = trimmed.split_once(syntax.delimiter).is_some_and(|(head, _)| {
        let head = head.trim();
        syntax.tags.iter().any(|tag| tag.eq_ignore_ascii_case(head))
    });
    if already {
        trimmed.to_string()
    } else {
        format!("{}({})", field, trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(offset: usize, n: usize) -> Page {
        let records = (0..n)
            .map(|i| {
                RecordBuilder::new(format!("K{}", offset + i), "t", SourceType::CrossRef).build()
            })
            .collect();
        Page::new(records, n)
    }

    #[tokio::test]
    async fn test_paginate_stops_at_limit() {
        let calls = AtomicUsize::new(0);
        let records = paginate(25, 10, |offset, rows| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(page(offset, rows)) }
        })
        .await
        .unwrap();

        assert_eq!(records.len(), 25);
        assert_eq!(records[24].citekey, "K24");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_paginate_stops_on_short_page() {
        let records = paginate(50, 10, |offset, _rows| async move {
            Ok(if offset == 0 { page(0, 10) } else { page(offset, 3) })
        })
        .await
        .unwrap();
        assert_eq!(records.len(), 13);
    }

    #[tokio::test]
    async fn test_paginate_first_page_error_propagates() {
        let result = paginate(10, 5, |_, _| async {
            Err(SourceError::MissingCredentials("KEY".to_string()))
        })
        .await;
        assert!(matches!(result, Err(SourceError::MissingCredentials(_))));
    }

    #[tokio::test]
    async fn test_paginate_later_error_keeps_partial() {
        let records = paginate(20, 5, |offset, rows| async move {
            if offset == 0 {
                Ok(page(0, rows))
            } else {
                Err(SourceError::Network("reset".to_string()))
            }
        })
        .await
        .unwrap();
        assert_eq!(records.len(), 5);
    }

    #[tokio::test]
    async fn test_paginate_offsets_count_skipped_items() {
        let offsets = std::sync::Mutex::new(Vec::new());
        let records = paginate(6, 4, |offset, rows| {
            offsets.lock().unwrap().push(offset);
            async move {
                // provider returns a full page but one item is unusable
                let mut p = page(offset, rows);
                p.records.pop();
                Ok(p)
            }
        })
        .await
        .unwrap();

        assert_eq!(records.len(), 6);
        assert_eq!(*offsets.lock().unwrap(), vec![0, 4]);
    }

    #[test]
    fn test_qualify() {
        const PAREN: FieldSyntax = FieldSyntax {
            wrapper: "TITLE-ABS-KEY",
            delimiter: '(',
            tags: &["TITLE-ABS-KEY", "AUTHLASTNAME"],
        };
        const EQUALS: FieldSyntax = FieldSyntax {
            wrapper: "TS=",
            delimiter: '=',
            tags: &["TS", "TI", "AI"],
        };

        assert_eq!(qualify("soil carbon", &PAREN), "TITLE-ABS-KEY(soil carbon)");
        assert_eq!(qualify("TITLE-ABS-KEY(x)", &PAREN), "TITLE-ABS-KEY(x)");
        assert_eq!(qualify("NASA(missions)", &PAREN), "TITLE-ABS-KEY(NASA(missions))");
        assert_eq!(qualify("  heat waves ", &EQUALS), "TS=(heat waves)");
        assert_eq!(qualify("TS=(heat)", &EQUALS), "TS=(heat)");
        assert_eq!(qualify("What is (really) going on", &EQUALS), "TS=(What is (really) going on)");
        assert_eq!(qualify("AI (ethics)", &EQUALS), "TS=(AI (ethics))");
        assert_eq!(qualify("AI(ethics)", &EQUALS), "TS=(AI(ethics))");
        assert_eq!(qualify("AI=0000-0001", &EQUALS), "AI=0000-0001");
    }

    #[test]
    fn test_status_errors_display() {
        let err = SourceError::Status {
            status: 503,
            message: "Scopus API returned status: 503".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: Scopus API returned status: 503");
    }
}
