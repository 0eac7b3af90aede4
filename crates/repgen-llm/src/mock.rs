use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use repgen_core::error::{ModelError, ReportError, Result};
use repgen_core::message::{Message, ToolCall};
use repgen_core::model::{CallOptions, ChatModel, ChatResult};

/// One canned reply of a [`ScriptedChatModel`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    Error(String),
}

impl ScriptedReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Single tool call with a generated id.
    pub fn tool_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        let name = name.into();
        Self::ToolCalls(vec![ToolCall {
            id: format!("call_{name}"),
            name,
            arguments,
        }])
    }
}

/// A mock ChatModel that replays a fixed script and records what it was sent.
///
/// Replies are consumed in order. Once the script is exhausted every further
/// call fails with `ModelError::InvalidResponse`, which keeps a test honest
/// about how many model calls a pipeline makes.
pub struct ScriptedChatModel {
    script: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<Vec<Message>>>,
    call_count: AtomicUsize,
}

impl ScriptedChatModel {
    pub fn new(script: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Script made only of text replies.
    pub fn from_texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::new(texts.into_iter().map(ScriptedReply::text))
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Message lists received so far, in call order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn generate(&self, messages: &[Message], _options: &CallOptions) -> Result<ChatResult> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let next = self
            .script
            .lock()
            .map_err(|_| ReportError::Other("scripted model lock poisoned".into()))?
            .pop_front();

        let message = match next {
            Some(ScriptedReply::Text(text)) => Message::ai(text),
            Some(ScriptedReply::ToolCalls(calls)) => Message::ai_with_tool_calls("", calls),
            Some(ScriptedReply::Error(reason)) => {
                return Err(ReportError::Model(ModelError::ApiRequest(reason)));
            }
            None => {
                return Err(ReportError::Model(ModelError::InvalidResponse(
                    "script exhausted".into(),
                )));
            }
        };

        Ok(ChatResult {
            message,
            usage: None,
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
