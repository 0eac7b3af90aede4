use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the repgen pipeline.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ReportError {
    /// True when the generation or storage capability itself failed.
    pub fn is_backend(&self) -> bool {
        match self {
            ReportError::Model(_) | ReportError::Storage(_) => true,
            ReportError::Pipeline(PipelineError::Run { source, .. }) => source.is_backend(),
            _ => false,
        }
    }
}

/// Failures of the text-generation backend.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Generation timed out after {limit:?}")]
    Timeout { limit: Duration },
}

/// Failures of the object-store capability.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Storage request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Secret '{name}' could not be read: {reason}")]
    Unreadable { name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Stage-level failures raised while running the report pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stage '{stage}' returned empty output")]
    EmptyOutput { stage: String },

    #[error("Stage '{stage}' output could not be parsed ({reason}): {excerpt}")]
    Parse {
        stage: String,
        reason: String,
        excerpt: String,
    },

    #[error("Run failed in state {state}: {source}")]
    Run {
        state: String,
        source: Box<ReportError>,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;
