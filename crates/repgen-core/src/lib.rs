pub mod config;
pub mod error;
pub mod message;
pub mod model;
pub mod runnable;
pub mod tool;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::RunnableConfig;
    pub use crate::error::{
        ModelError, PipelineError, ReportError, Result, SecretError, StorageError, ToolError,
    };
    pub use crate::message::{Message, ToolCall};
    pub use crate::model::{CallOptions, ChatModel, ChatResult};
    pub use crate::runnable::Runnable;
    pub use crate::tool::{Tool, ToolDefinition};
}
