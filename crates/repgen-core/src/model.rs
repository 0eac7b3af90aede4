use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Message, UsageMetadata};
use crate::tool::ToolDefinition;

/// Options controlling a ChatModel invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallOptions {
    /// Tools the model may call during this turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// Result of a chat model generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub message: Message,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetadata>,
}

/// Trait for chat language models.
///
/// Implementations own request formatting and response parsing for one
/// provider. A single `generate` call is one round trip; tool execution
/// loops live above this trait.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, messages: &[Message], options: &CallOptions) -> Result<ChatResult>;

    fn model_name(&self) -> &str;
}
