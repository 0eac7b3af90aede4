use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use repgen_core::error::{ModelError, ReportError, Result};
use repgen_core::message::Message;
use repgen_core::model::{CallOptions, ChatModel};
use repgen_core::tool::{Tool, ToolDefinition};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Text-generation capability used by the report pipeline.
///
/// Takes the stage instructions, the tools the stage may call and the
/// serialised input; returns the final free text of the model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        instructions: &str,
        tools: &[Arc<dyn Tool>],
        input: &str,
    ) -> Result<String>;
}

/// [`TextGenerator`] backed by a [`ChatModel`] with native tool calling.
///
/// The loop is `model -> tools -> model -> ...` until the model answers
/// without tool calls or `max_tool_rounds` is exhausted.
pub struct ChatGenerator<M> {
    model: M,
    max_tool_rounds: usize,
}

impl<M: ChatModel> ChatGenerator<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

#[async_trait]
impl<M: ChatModel> TextGenerator for ChatGenerator<M> {
    async fn generate(
        &self,
        instructions: &str,
        tools: &[Arc<dyn Tool>],
        input: &str,
    ) -> Result<String> {
        let tool_defs: Vec<ToolDefinition> = tools.iter().map(|t| t.definition()).collect();
        let tools_map: HashMap<String, &Arc<dyn Tool>> =
            tools.iter().map(|t| (t.definition().name, t)).collect();

        let options = CallOptions { tools: tool_defs };

        let mut messages = vec![Message::system(instructions), Message::user(input)];

        for round in 0..=self.max_tool_rounds {
            let result = self.model.generate(&messages, &options).await?;
            let calls = result.message.tool_calls().to_vec();
            if calls.is_empty() {
                return Ok(result.message.content().to_string());
            }
            if round == self.max_tool_rounds {
                break;
            }

            tracing::debug!(
                model = self.model.model_name(),
                round,
                calls = calls.len(),
                "executing tool calls"
            );
            messages.push(result.message);

            for tc in &calls {
                let output = match tools_map.get(&tc.name) {
                    Some(tool) => match tool.call(tc.arguments.clone()).await {
                        Ok(out) => out,
                        Err(e) => serde_json::json!({"status": "error", "message": e.to_string()})
                            .to_string(),
                    },
                    None => {
                        tracing::warn!(tool = %tc.name, "model requested unknown tool");
                        serde_json::json!({
                            "status": "error",
                            "message": format!("Tool not found: {}", tc.name),
                        })
                        .to_string()
                    }
                };
                messages.push(Message::tool(output, &tc.id));
            }
        }

        Err(ReportError::Model(ModelError::InvalidResponse(format!(
            "model still requesting tools after {} rounds",
            self.max_tool_rounds
        ))))
    }
}
