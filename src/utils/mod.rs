//! Utility modules supporting review operations.
//!
//! - [`dedupe_citekeys`]: Make citekeys unique across a merged record set
//! - [`citekey`]: Citekey synthesis and recovery of citation markers from text
//! - [`CitationStyle`], [`format_citation`], [`format_references`]: Reference rendering
//! - [`HttpClient`]: Shared HTTP client with sensible defaults
//! - [`RetryConfig`], [`with_retry`]: Retry with exponential backoff on transient errors
//! - [`text`]: Markup stripping and word-level helpers
//!
//! # Deduplication
//!
//! ```rust
//! use research_review::models::{RecordBuilder, SourceType};
//! use research_review::utils::dedupe_citekeys;
//!
//! let records = vec![
//!     RecordBuilder::new("Lee2021", "First", SourceType::CrossRef).build(),
//!     RecordBuilder::new("Lee2021", "Second", SourceType::Scopus).build(),
//! ];
//! let unique = dedupe_citekeys(records);
//! assert_eq!(unique[0].citekey, "Lee2021a");
//! assert_eq!(unique[1].citekey, "Lee2021b");
//! ```
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use research_review::sources::SourceError;
//! use research_review::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let result = with_retry(RetryConfig::default(), || async { fetch_data().await }).await?;
//! # Ok(())
//! # }
//! ```

pub mod citekey;
mod cite;
mod dedup;
mod http;
mod retry;
pub mod text;

pub use cite::{
    format_citation, format_references, structured_citation, CitationStyle, UnsupportedStyle,
};
pub use dedup::dedupe_citekeys;
pub use http::{HttpClient, USER_AGENT};
pub use retry::{api_retry_config, with_retry, RetryConfig, TransientError};
