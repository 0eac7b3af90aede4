use async_trait::async_trait;

use crate::config::RunnableConfig;
use crate::error::Result;

/// Async unit of work with a typed input and output.
///
/// Pipeline stages implement this trait so that the orchestrator can drive
/// them uniformly and fan a stage out over several inputs with `batch`.
#[async_trait]
pub trait Runnable: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    async fn invoke(&self, input: Self::Input, config: &RunnableConfig) -> Result<Self::Output>;

    /// Process multiple inputs concurrently.
    ///
    /// Results are returned in input order regardless of completion order.
    /// The first failure is returned and the remaining invocations are
    /// dropped.
    async fn batch(
        &self,
        inputs: Vec<Self::Input>,
        config: &RunnableConfig,
    ) -> Result<Vec<Self::Output>> {
        let calls = inputs.into_iter().map(|input| self.invoke(input, config));
        futures::future::try_join_all(calls).await
    }
}
