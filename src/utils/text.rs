//! Text cleanup helpers for provider payloads.

use scraper::Html;

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip HTML/JATS markup and decode entities, returning plain text
///
/// Text nodes are joined with spaces so adjacent paragraphs do not run
/// together.
pub fn strip_markup(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    if !raw.contains('<') && !raw.contains('&') {
        return collapse_whitespace(raw);
    }

    let fragment = Html::parse_fragment(raw);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Keep at most `max_words` whitespace-separated words
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let mut words = text.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(max_words).collect();
    if words.next().is_none() {
        text.to_string()
    } else {
        kept.join(" ")
    }
}

/// Number of whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
