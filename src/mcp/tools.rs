//! MCP Tools Implementation
//!
//! The `search` tool, answering queries through a shared retriever.

use crate::mcp::protocol::*;
use crate::mcp::server::ToolHandler;
use crate::retrieval::Retriever;
use crate::{RagError, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error};

/// Corpus search tool handler
pub struct SearchHandler {
    retriever: Arc<Retriever>,
    default_top_k: usize,
}

impl SearchHandler {
    /// Create a new search handler
    #[inline]
    pub fn new(retriever: Arc<Retriever>, default_top_k: usize) -> Self {
        Self {
            retriever,
            default_top_k,
        }
    }

    /// Create the search tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "search".to_string(),
            description: Some("Search the indexed corpus for relevant passages".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "top_k": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum number of results (default: 3)"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }

    fn top_k(&self, value: Option<&Value>) -> Result<usize> {
        match value {
            None | Some(Value::Null) => Ok(self.default_top_k),
            Some(value) => value
                .as_u64()
                .filter(|top_k| *top_k >= 1)
                .and_then(|top_k| usize::try_from(top_k).ok())
                .ok_or_else(|| {
                    RagError::Mcp(format!("top_k must be a positive integer, got {}", value))
                }),
        }
    }
}

#[async_trait]
impl ToolHandler for SearchHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();

        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RagError::Mcp("Missing required parameter: query".to_string()))?;
        let top_k = self.top_k(args.get("top_k"))?;

        debug!("Searching corpus: query='{}', top_k={}", query, top_k);

        match self.retriever.retrieve(query, top_k).await {
            Ok(results) => {
                let response = json!({ "results": results });
                Ok(CallToolResult::text(serde_json::to_string_pretty(&response)?))
            }
            Err(e) => {
                error!("Error performing search: {}", e);
                Ok(CallToolResult::error(format!("Search error: {}", e)))
            }
        }
    }
}
