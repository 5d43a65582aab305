//! Draft model: the structured narrative returned by the generation service.

use serde::{Deserialize, Serialize};

/// One titled section of the review body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section heading
    pub heading: String,

    /// Paragraphs with inline `(Citekey)` citations
    pub body: String,
}

/// A synthesized review before citation reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Draft {
    #[serde(default)]
    pub title: String,

    /// Executive summary (150–250 words requested)
    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub sections: Vec<Section>,

    #[serde(default)]
    pub limitations: String,

    /// Citekeys referenced in the text
    #[serde(default)]
    pub references: Vec<String>,
}

impl Draft {
    /// JSON schema the generation service is asked to conform to
    pub fn json_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "summary": { "type": "string" },
                "sections": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "heading": { "type": "string" },
                            "body": { "type": "string" }
                        },
                        "required": ["heading", "body"],
                        "additionalProperties": false
                    }
                },
                "limitations": { "type": "string" },
                "references": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            },
            "required": ["title", "summary", "sections", "limitations", "references"],
            "additionalProperties": false
        })
    }
}
