use std::path::PathBuf;
use std::time::Duration;

use repgen_llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use repgen_pipeline::fallback::FallbackStyle;
use repgen_pipeline::orchestrator::DEFAULT_STAGE_TIMEOUT;
use repgen_pipeline::secrets::DEFAULT_SECRET_NAME;
use repgen_pipeline::service::GenerationMode;
use repgen_pipeline::storage::DEFAULT_S3_ENDPOINT;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ALLOWED_BUCKET: &str = "kizukai-ds-tmp";

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub api_key_required: bool,
    pub api_key: Option<String>,
    pub allowed_bucket: String,
    pub mode: GenerationMode,
    pub fallback_style: FallbackStyle,
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub use_secrets_manager: bool,
    pub secret_name: String,
    pub secrets_dir: Option<PathBuf>,
    pub stage_timeout: Duration,
    pub s3_endpoint: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            api_key_required: true,
            api_key: None,
            allowed_bucket: DEFAULT_ALLOWED_BUCKET.into(),
            mode: GenerationMode::Mock,
            fallback_style: FallbackStyle::Keyword,
            openai_model: DEFAULT_MODEL.into(),
            openai_base_url: DEFAULT_BASE_URL.into(),
            openai_api_key: None,
            use_secrets_manager: false,
            secret_name: DEFAULT_SECRET_NAME.into(),
            secrets_dir: None,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            s3_endpoint: DEFAULT_S3_ENDPOINT.into(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let mode = match var("REPGEN_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.mode,
        };
        let fallback_style = match var("REPGEN_FALLBACK") {
            Some(raw) => raw.parse()?,
            None => defaults.fallback_style,
        };
        let stage_timeout = match var("REPGEN_STAGE_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| format!("invalid REPGEN_STAGE_TIMEOUT_SECS '{raw}': {e}"))?,
            None => defaults.stage_timeout,
        };

        Ok(Self {
            bind_addr: var("REPGEN_BIND_ADDR").unwrap_or(defaults.bind_addr),
            // Only an explicit "false" turns the gate off.
            api_key_required: var("API_KEY_REQUIRED")
                .is_none_or(|v| !v.trim().eq_ignore_ascii_case("false")),
            api_key: var("API_KEY"),
            allowed_bucket: var("ALLOWED_S3_BUCKET").unwrap_or(defaults.allowed_bucket),
            mode,
            fallback_style,
            openai_model: var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_api_key: var("OPENAI_API_KEY"),
            use_secrets_manager: var("USE_SECRETS_MANAGER")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            secret_name: var("OPENAI_API_KEY_SECRET_NAME").unwrap_or(defaults.secret_name),
            secrets_dir: var("REPGEN_SECRETS_DIR").map(PathBuf::from),
            stage_timeout,
            s3_endpoint: var("S3_ENDPOINT").unwrap_or(defaults.s3_endpoint),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.api_key_required);
        assert!(config.api_key.is_none());
        assert_eq!(config.allowed_bucket, "kizukai-ds-tmp");
        assert_eq!(config.mode, GenerationMode::Mock);
        assert_eq!(config.fallback_style, FallbackStyle::Keyword);
        assert_eq!(config.stage_timeout, Duration::from_secs(120));
        assert!(!config.use_secrets_manager);
        assert_eq!(config.secret_name, "openai-api-key");
    }

    #[test]
    fn explicit_values() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("API_KEY_REQUIRED", "FALSE"),
            ("API_KEY", "secret"),
            ("ALLOWED_S3_BUCKET", "reports"),
            ("REPGEN_MODE", "resilient"),
            ("REPGEN_FALLBACK", "error_notice"),
            ("REPGEN_STAGE_TIMEOUT_SECS", "30"),
            ("USE_SECRETS_MANAGER", "true"),
            ("REPGEN_SECRETS_DIR", "/run/secrets"),
        ]))
        .unwrap();
        assert!(!config.api_key_required);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.allowed_bucket, "reports");
        assert_eq!(config.mode, GenerationMode::Resilient);
        assert_eq!(config.fallback_style, FallbackStyle::ErrorNotice);
        assert_eq!(config.stage_timeout, Duration::from_secs(30));
        assert!(config.use_secrets_manager);
        assert_eq!(config.secrets_dir, Some(PathBuf::from("/run/secrets")));
    }

    #[test]
    fn anything_but_false_keeps_gate_on() {
        let config = ServerConfig::from_lookup(lookup(&[("API_KEY_REQUIRED", "no")])).unwrap();
        assert!(config.api_key_required);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(ServerConfig::from_lookup(lookup(&[("REPGEN_MODE", "chaos")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("REPGEN_STAGE_TIMEOUT_SECS", "soon")])).is_err());
    }

    #[test]
    #[serial]
    fn reads_process_environment() {
        // SAFETY: serialized with the other environment tests
        unsafe {
            std::env::set_var("ALLOWED_S3_BUCKET", "env-bucket");
            std::env::set_var("REPGEN_MODE", "strict");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.allowed_bucket, "env-bucket");
        assert_eq!(config.mode, GenerationMode::Strict);

        unsafe {
            std::env::remove_var("ALLOWED_S3_BUCKET");
            std::env::remove_var("REPGEN_MODE");
        }
    }

    #[test]
    #[serial]
    fn blank_environment_values_fall_back_to_defaults() {
        unsafe { std::env::set_var("ALLOWED_S3_BUCKET", "  "); }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.allowed_bucket, DEFAULT_ALLOWED_BUCKET);

        unsafe { std::env::remove_var("ALLOWED_S3_BUCKET"); }
    }
}
