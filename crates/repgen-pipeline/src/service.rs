use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use repgen_core::config::RunnableConfig;
use repgen_core::error::Result;

use crate::document::ReportDocument;
use crate::fallback::FallbackAssembler;
use crate::orchestrator::ReportPipeline;

/// Deployment variant of report generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerationMode {
    /// Keyword assembler only; no backend is ever called.
    #[default]
    Mock,
    /// Full pipeline; stage failures are returned to the caller.
    Strict,
    /// Full pipeline; stage failures are replaced by the fallback document.
    Resilient,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Mock => "mock",
            GenerationMode::Strict => "strict",
            GenerationMode::Resilient => "resilient",
        }
    }

    pub fn needs_backend(&self) -> bool {
        !matches!(self, GenerationMode::Mock)
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "strict" => Ok(Self::Strict),
            "resilient" => Ok(Self::Resilient),
            other => Err(format!("unknown generation mode '{other}'")),
        }
    }
}

enum Engine {
    Mock(FallbackAssembler),
    Pipeline {
        pipeline: Arc<ReportPipeline>,
        resilient: bool,
    },
}

/// Entry point used by the HTTP layer.
pub struct ReportService {
    engine: Engine,
}

impl ReportService {
    pub fn mock(assembler: FallbackAssembler) -> Self {
        Self {
            engine: Engine::Mock(assembler),
        }
    }

    pub fn strict(pipeline: Arc<ReportPipeline>) -> Self {
        Self {
            engine: Engine::Pipeline {
                pipeline,
                resilient: false,
            },
        }
    }

    pub fn resilient(pipeline: Arc<ReportPipeline>) -> Self {
        Self {
            engine: Engine::Pipeline {
                pipeline,
                resilient: true,
            },
        }
    }

    pub fn mode(&self) -> GenerationMode {
        match &self.engine {
            Engine::Mock(_) => GenerationMode::Mock,
            Engine::Pipeline { resilient: false, .. } => GenerationMode::Strict,
            Engine::Pipeline { resilient: true, .. } => GenerationMode::Resilient,
        }
    }

    pub async fn generate(&self, request: &str, paths: &[String]) -> Result<ReportDocument> {
        let config = RunnableConfig::new().with_tag(self.mode().as_str());
        tracing::info!(
            run_id = %config.run_id,
            mode = %self.mode(),
            paths = paths.len(),
            "generating report"
        );

        match &self.engine {
            Engine::Mock(assembler) => Ok(assembler.assemble(request, paths)),
            Engine::Pipeline {
                pipeline,
                resilient: false,
            } => Ok(pipeline.run(request, paths, &config).await?.document),
            Engine::Pipeline {
                pipeline,
                resilient: true,
            } => Ok(pipeline.run_or_fallback(request, paths, &config).await),
        }
    }
}
