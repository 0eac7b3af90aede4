use std::time::Duration;

use uuid::Uuid;

/// Per-run configuration threaded through every stage invocation.
#[derive(Debug, Clone)]
pub struct RunnableConfig {
    /// Unique identifier for this run; attached to every log line.
    pub run_id: Uuid,

    /// Free-form labels, e.g. the generation mode. Logged when a run starts.
    pub tags: Vec<String>,

    /// Upper bound for a single generation call. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for RunnableConfig {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tags: Vec::new(),
            timeout: None,
        }
    }
}

impl RunnableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
