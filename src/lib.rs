//! # Research Review
//!
//! Synthesizes grounded literature reviews from bibliographic metadata.
//! A topic is fanned out to several metadata providers, the merged records
//! get unique citekeys, the most relevant ones are drafted into a review by
//! a text-generation service, and the citations in that draft are resolved
//! back to records and rendered in a citation style.
//!
//! ## Architecture
//!
//! - [`models`]: Core data structures (Record, Draft, ReviewRequest, ReviewResult)
//! - [`sources`]: Metadata provider adapters behind the [`Source`] trait
//! - [`llm`]: Generation and embedding clients with provider fallback
//! - [`review`]: The review pipeline and its stages
//! - [`mcp`]: MCP server exposing the `literature_review` tool
//! - [`utils`]: Citekeys, deduplication, citation styles, HTTP and retry
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use research_review::config::Config;
//! use research_review::models::ReviewRequest;
//! use research_review::review::ReviewPipeline;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ReviewPipeline::from_config(&Config::default())?;
//! let request = ReviewRequest::new("soil carbon under warming").citation_format("apa7");
//! let review = pipeline.synthesize_review(&request).await?;
//! println!("{}", review.result);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod review;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use models::{Record, ReviewRequest, ReviewResult};
pub use review::{ReviewError, ReviewPipeline};
pub use sources::{Source, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
