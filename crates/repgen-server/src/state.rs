use std::sync::Arc;

use repgen_core::error::Result;
use repgen_llm::{ChatGenerator, OpenAIChatModel};
use repgen_pipeline::clock::{Clock, SystemClock};
use repgen_pipeline::fallback::FallbackAssembler;
use repgen_pipeline::orchestrator::{PipelineOptions, ReportPipeline};
use repgen_pipeline::secrets::{EnvSecretStore, FileSecretStore, SecretStore, resolve_api_key};
use repgen_pipeline::service::{GenerationMode, ReportService};
use repgen_pipeline::storage::{HttpObjectStore, ObjectStore};
use repgen_pipeline::tools::data_tools;

use crate::config::ServerConfig;

/// Caller authentication settings.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub required: bool,
    /// Expected `x-api-key`. `None` while required rejects every caller.
    pub api_key: Option<String>,
}

impl AuthSettings {
    pub fn disabled() -> Self {
        Self {
            required: false,
            api_key: None,
        }
    }

    pub fn key(api_key: impl Into<String>) -> Self {
        Self {
            required: true,
            api_key: Some(api_key.into()),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReportService>,
    pub auth: AuthSettings,
    pub allowed_bucket: String,
}

impl AppState {
    pub fn new(service: ReportService, auth: AuthSettings, allowed_bucket: impl Into<String>) -> Self {
        Self {
            service: Arc::new(service),
            auth,
            allowed_bucket: allowed_bucket.into(),
        }
    }

    /// Wire the configured generation mode to its backends.
    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let service = match config.mode {
            GenerationMode::Mock => ReportService::mock(FallbackAssembler::new(clock)),
            GenerationMode::Strict => ReportService::strict(Arc::new(build_pipeline(config, clock).await?)),
            GenerationMode::Resilient => {
                ReportService::resilient(Arc::new(build_pipeline(config, clock).await?))
            }
        };

        if config.api_key_required && config.api_key.is_none() {
            tracing::warn!("API_KEY is not set; every report request will be rejected");
        }

        Ok(Self::new(
            service,
            AuthSettings {
                required: config.api_key_required,
                api_key: config.api_key.clone(),
            },
            config.allowed_bucket.clone(),
        ))
    }
}

async fn build_pipeline(config: &ServerConfig, clock: Arc<dyn Clock>) -> Result<ReportPipeline> {
    let api_key = if config.use_secrets_manager {
        let store: Box<dyn SecretStore> = match &config.secrets_dir {
            Some(dir) => Box::new(FileSecretStore::new(dir.clone())),
            None => Box::new(EnvSecretStore::new()),
        };
        resolve_api_key(
            config.openai_api_key.as_deref(),
            Some((store.as_ref(), config.secret_name.as_str())),
        )
        .await?
    } else {
        resolve_api_key(config.openai_api_key.as_deref(), None).await?
    };

    let options = PipelineOptions {
        stage_timeout: Some(config.stage_timeout),
        fallback_style: config.fallback_style,
        ..PipelineOptions::default()
    };

    let model = OpenAIChatModel::new(api_key, config.openai_model.as_str())
        .with_base_url(config.openai_base_url.as_str())
        .with_request_timeout(config.stage_timeout)?;
    let generator = ChatGenerator::new(model).with_max_tool_rounds(options.max_tool_rounds);
    let store: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(config.s3_endpoint.as_str()));

    tracing::info!(
        model = %config.openai_model,
        mode = %config.mode,
        "generation backend configured"
    );

    Ok(ReportPipeline::new(Arc::new(generator), data_tools(store), clock).with_options(options))
}
