use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Definition of a tool that can be offered to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool's arguments.
    pub parameters: serde_json::Value,
}

/// Trait for callable tools.
///
/// Tools take JSON arguments and return a string that is handed back to the
/// model verbatim as a tool message.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, input: serde_json::Value) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReportError, ToolError};

    struct RowCountTool;

    #[async_trait]
    impl Tool for RowCountTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "row_count".into(),
                description: "Counts rows in a JSON array".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {"rows": {"type": "array"}},
                    "required": ["rows"]
                }),
            }
        }

        async fn call(&self, input: serde_json::Value) -> Result<String> {
            let rows = input.get("rows").and_then(|v| v.as_array()).ok_or_else(|| {
                ReportError::Tool(ToolError::InvalidInput("missing 'rows' array".into()))
            })?;
            Ok(rows.len().to_string())
        }
    }

    #[tokio::test]
    async fn tool_call_success() {
        let out = RowCountTool
            .call(serde_json::json!({"rows": [1, 2, 3]}))
            .await
            .unwrap();
        assert_eq!(out, "3");
    }

    #[tokio::test]
    async fn tool_call_invalid_input() {
        let err = RowCountTool
            .call(serde_json::json!({"rows": "nope"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Tool(ToolError::InvalidInput(_))));
    }

    #[test]
    fn definition_names_required_args() {
        let def = RowCountTool.definition();
        assert_eq!(def.parameters["required"][0], "rows");
    }
}
