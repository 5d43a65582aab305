//! Prompt text for drafting and search-term generation.

use serde::Serialize;

use crate::llm::ChatMessage;
use crate::models::{Record, SourceType};

/// Schema name sent with drafting requests
pub const DRAFT_SCHEMA_NAME: &str = "literature_draft";

/// Schema name sent with search-term requests
pub const TERMS_SCHEMA_NAME: &str = "search_terms";

pub const DRAFT_SYSTEM_PROMPT: &str = "You are an expert academic writer.
Return ONLY a valid JSON object matching the literature_draft schema:
- title: string
- summary: string (150-250 words)
- sections: array of {heading, body}
- limitations: string
- references: array of citekeys used in the text

Rules:
- Ground every claim strictly in the provided records (titles and abstracts).
- Cite inline with the record citekey in parentheses, e.g. (Smith2021) or (Lee2022a; Kim2023).
- Be precise, technical and concise; avoid speculation.
- Never invent sources or citekeys that are not in the records.";

pub const TERMS_SYSTEM_PROMPT: &str = "You are an expert search strategist for scientific databases.
Return only JSON that matches the search_terms schema.";

/// The record fields the generation service sees
#[derive(Debug, Serialize)]
struct PromptRecord<'a> {
    citekey: &'a str,
    title: &'a str,
    r#abstract: Option<&'a str>,
    year: Option<i32>,
    authors: &'a [String],
    venue: Option<&'a str>,
    doi: Option<&'a str>,
    url: Option<&'a str>,
    source: &'a SourceType,
}

/// Serialize records to the minimal JSON shown in the drafting prompt
pub fn records_json(records: &[Record]) -> String {
    let minimal: Vec<PromptRecord<'_>> = records
        .iter()
        .map(|r| PromptRecord {
            citekey: &r.citekey,
            title: &r.title,
            r#abstract: r.r#abstract.as_deref(),
            year: r.year,
            authors: &r.authors,
            venue: r.venue.as_deref(),
            doi: r.doi.as_deref(),
            url: r.url.as_deref(),
            source: &r.source,
        })
        .collect();
    serde_json::to_string_pretty(&minimal).unwrap_or_else(|_| "[]".to_string())
}

/// Messages for drafting a review of `records`
pub fn draft_messages(topic: &str, language: &str, records: &[Record]) -> Vec<ChatMessage> {
    let user = format!(
        "Topic: {topic}
Output language: {language}

You are given normalized records (JSON):
{records}

Write a literature review (~800-1200 words) with subheadings derived from the material.
Return a JSON object conforming to literature_draft. No extra commentary.",
        records = records_json(records),
    );
    vec![ChatMessage::system(DRAFT_SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Messages asking for compact database queries
pub fn terms_messages(topic: &str, language: &str, max_terms: usize) -> Vec<ChatMessage> {
    let user = format!(
        "Research topic (may be long or verbose):
{topic}

Output language: {language}.
Craft 1-{max_terms} concise, effective search queries for Crossref/Scopus/Web of Science.
Guidelines: keep queries short; prefer TITLE-ABS-KEY style phrases; use quotes for exact phrases; avoid special characters the engines do not support.",
        max_terms = max_terms.clamp(1, 5),
    );
    vec![ChatMessage::system(TERMS_SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// JSON schema for the search-term reply
pub fn terms_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "language": { "type": "string" },
            "terms": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 1,
                "maxItems": 5
            }
        },
        "required": ["language", "terms"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::make_record;

    #[test]
    fn test_records_json_is_minimal() {
        let mut record = make_record("Lee2021", "Soil", Some("10.1/x"));
        record.publisher = Some("Elsevier".to_string());
        let json: serde_json::Value = serde_json::from_str(&records_json(&[record])).unwrap();

        let entry = &json[0];
        assert_eq!(entry["citekey"], "Lee2021");
        assert_eq!(entry["doi"], "10.1/x");
        assert_eq!(entry["abstract"], "Abstract of Soil");
        assert!(entry.get("publisher").is_none());
    }

    #[test]
    fn test_draft_messages_carry_topic_and_language() {
        let messages = draft_messages("heat waves", "Turkish", &[]);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.contains("Topic: heat waves"));
        assert!(messages[1].content.contains("Output language: Turkish"));
    }
}
