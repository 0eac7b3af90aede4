use serde::{Deserialize, Serialize};

/// Token usage reported by a backend for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// A request from the model to call one of the stage's tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Assistant turn: free text plus any tool calls it asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIContent {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// One turn in a stage conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System { content: String },
    User { content: String },
    #[serde(rename = "ai")]
    AI(AIContent),
    Tool {
        content: String,
        tool_call_id: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Message::AI(AIContent {
            content: content.into(),
            tool_calls: Vec::new(),
        })
    }

    pub fn ai_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::AI(AIContent {
            content: content.into(),
            tool_calls,
        })
    }

    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Tool { content, .. } => content,
            Message::AI(ai) => &ai.content,
        }
    }

    /// Tool calls requested by an assistant turn; empty for every other role.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::AI(ai) => &ai.tool_calls,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_serialization() {
        let json = serde_json::to_string(&Message::user("月次売上レポート")).unwrap();
        assert!(json.contains(r#""type":"user""#));
        let json = serde_json::to_string(&Message::ai("ok")).unwrap();
        assert!(json.contains(r#""type":"ai""#));
        assert!(!json.contains("tool_calls"));
    }

    #[test]
    fn tool_calls_only_on_ai_turns() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "read_s3_data".into(),
            arguments: serde_json::json!({"s3_path": "s3://bucket/daily.json"}),
        };
        let msg = Message::ai_with_tool_calls("", vec![call.clone()]);
        assert_eq!(msg.tool_calls(), &[call]);
        assert!(Message::tool("{}", "call_1").tool_calls().is_empty());
    }

    #[test]
    fn tool_message_roundtrip() {
        let msg = Message::tool(r#"{"exists":true}"#, "call_7");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.content(), r#"{"exists":true}"#);
    }
}
