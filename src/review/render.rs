//! Markdown rendering of a resolved draft.

use super::resolver::{enrich_markers, Resolution};
use crate::models::Draft;

/// Render the review narrative
///
/// Empty summary or limitations are left out, as is the reference heading
/// when nothing was cited. Inline markers are enriched with DOIs.
pub fn render_markdown(draft: &Draft, resolution: &Resolution, references: &[String]) -> String {
    let mut lines: Vec<String> = vec![format!("# {}", draft.title.trim()), String::new()];

    if !draft.summary.trim().is_empty() {
        lines.push("## Executive Summary".to_string());
        lines.push(enrich_markers(draft.summary.trim(), resolution));
        lines.push(String::new());
    }

    for section in &draft.sections {
        lines.push(format!("## {}", section.heading.trim()));
        lines.push(enrich_markers(section.body.trim(), resolution));
        lines.push(String::new());
    }

    if !draft.limitations.trim().is_empty() {
        lines.push("## Limitations".to_string());
        lines.push(draft.limitations.trim().to_string());
        lines.push(String::new());
    }

    if !references.is_empty() {
        lines.push("## References".to_string());
        lines.extend(references.iter().map(|r| format!("- {}", r)));
        lines.push(String::new());
    }

    lines.join("\n")
}
