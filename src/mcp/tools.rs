//! Tool registry for MCP tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::models::ReviewRequest;
use crate::review::{ErrorKind, ReviewPipeline};

/// An MCP tool that can be called by the client
#[derive(Clone)]
pub struct Tool {
    /// Tool name (e.g., "literature_review")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema for input parameters
    pub input_schema: serde_json::Value,

    /// Handler function to execute the tool
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Why a tool call failed, as reported to the client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// The arguments cannot be served; the client should change them
    #[error("{0}")]
    InvalidParams(String),

    /// Something on the server side failed
    #[error("{0}")]
    Internal(String),
}

/// Handler for executing a tool
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    /// Execute the tool with the given arguments
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Registry for all MCP tools
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// Create the registry serving reviews from `pipeline`
    pub fn from_pipeline(pipeline: Arc<ReviewPipeline>) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };
        let source_names: Vec<&str> = pipeline.registry().all().iter().map(|s| s.name()).collect();

        registry.register(Tool {
            name: "literature_review".to_string(),
            description: format!(
                "Write a grounded literature review on a topic from records retrieved across {} sources ({}), with formatted references",
                source_names.len(),
                source_names.join(", ")
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "Research topic or question"
                    },
                    "citation_format": {
                        "type": "string",
                        "description": "Reference style",
                        "enum": ["raw", "bibtex", "apa7"],
                        "default": "raw"
                    },
                    "language": {
                        "type": "string",
                        "description": "Output language for the narrative",
                        "default": "English"
                    }
                },
                "required": ["topic"]
            }),
            handler: Arc::new(LiteratureReviewHandler {
                pipeline: pipeline.clone(),
            }),
        });

        registry.register(Tool {
            name: "list_sources".to_string(),
            description: "List the bibliographic sources a review queries, in order".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            handler: Arc::new(ListSourcesHandler { pipeline }),
        });

        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get all tools
    pub fn all(&self) -> Vec<&Tool> {
        self.tools.values().collect()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::InvalidParams(format!("Tool '{}' not found", name)))?;

        tool.handler.execute(args).await
    }
}

#[derive(Debug)]
struct LiteratureReviewHandler {
    pipeline: Arc<ReviewPipeline>,
}

#[async_trait::async_trait]
impl ToolHandler for LiteratureReviewHandler {
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let request: ReviewRequest = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidParams(format!("Invalid arguments: {}", e)))?;

        let result = self
            .pipeline
            .synthesize_review(&request)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidRequest => ToolError::InvalidParams(e.to_string()),
                ErrorKind::ServiceUnavailable => ToolError::Internal(e.to_string()),
            })?;

        serde_json::to_value(result).map_err(|e| ToolError::Internal(e.to_string()))
    }
}

#[derive(Debug)]
struct ListSourcesHandler {
    pipeline: Arc<ReviewPipeline>,
}

#[async_trait::async_trait]
impl ToolHandler for ListSourcesHandler {
    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let sources: Vec<Value> = self
            .pipeline
            .registry()
            .all()
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id(),
                    "name": s.name(),
                    "requires_credentials": s.requires_credentials(),
                    "has_credentials": s.has_credentials(),
                })
            })
            .collect();
        Ok(Value::Array(sources))
    }
}
