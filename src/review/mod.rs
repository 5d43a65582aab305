//! Literature review pipeline.
//!
//! A review runs as one forward pass over [`Stage`]s:
//!
//! 1. [`RetrievalCoordinator`] fans the topic out to every source, adding
//!    generated search terms when the topic is verbose or finds nothing
//! 2. [`dedupe_citekeys`](crate::utils::dedupe_citekeys) makes citekeys unique
//! 3. [`RelevanceSelector`] keeps the records closest to the topic
//! 4. [`DraftSynthesizer`] asks the generation chain for a structured draft
//! 5. [`resolve`] maps the draft's citekeys back to records
//! 6. The cited records are rendered in the requested citation style
//!
//! [`ReviewPipeline`] wires the stages together.

mod pipeline;
pub mod prompts;
mod render;
mod resolver;
mod retrieval;
mod selector;
mod synthesizer;
mod terms;

pub use pipeline::ReviewPipeline;
pub use render::render_markdown;
pub use resolver::{enrich_markers, resolve, Resolution};
pub use retrieval::{RetrievalCoordinator, RetrievalSettings};
pub use selector::{record_text, RelevanceSelector, SimilarityIndex};
pub use synthesizer::{parse_draft, DraftSynthesizer, Synthesis};
pub use terms::{LlmTermGenerator, StaticTermGenerator, TermGenerator};

use crate::llm::LlmError;
use crate::utils::UnsupportedStyle;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Retrieving,
    Normalizing,
    Selecting,
    Synthesizing,
    Resolving,
    Formatting,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Retrieving => "retrieving",
            Stage::Normalizing => "normalizing",
            Stage::Selecting => "selecting",
            Stage::Synthesizing => "synthesizing",
            Stage::Resolving => "resolving",
            Stage::Formatting => "formatting",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Broad failure classes callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is unusable; retrying will not help
    InvalidRequest,
    /// A generation or embedding service could not be reached
    ServiceUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::ServiceUnavailable => "service_unavailable",
        }
    }
}

/// Errors surfaced by a review
///
/// Source failures never appear here: they are logged and absorbed during
/// retrieval, and an empty retrieval is a successful empty result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReviewError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    UnsupportedStyle(#[from] UnsupportedStyle),

    #[error("Embedding failed: {0}")]
    Embedding(LlmError),

    #[error("Generation failed: {0}")]
    Generation(LlmError),
}

impl ReviewError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::InvalidRequest(_) | ReviewError::UnsupportedStyle(_) => {
                ErrorKind::InvalidRequest
            }
            ReviewError::Embedding(_) | ReviewError::Generation(_) => {
                ErrorKind::ServiceUnavailable
            }
        }
    }
}
