//! Core data models for records, drafts and review operations.

mod citation;
mod draft;
mod record;
mod review;

pub use citation::CitationEntry;
pub use draft::{Draft, Section};
pub use record::{Record, RecordBuilder, SourceType};
pub use review::{FormattedReferences, ReviewRequest, ReviewResult};
