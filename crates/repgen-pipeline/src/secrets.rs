//! Secret retrieval for the generation backend credential.

use std::path::PathBuf;

use async_trait::async_trait;

use repgen_core::error::{ReportError, Result, SecretError};

pub const DEFAULT_SECRET_NAME: &str = "openai-api-key";

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String>;
}

pub const ENV_SECRET_PREFIX: &str = "REPGEN_SECRET_";

/// Reads secrets from environment variables.
///
/// `openai-api-key` is looked up as `REPGEN_SECRET_OPENAI_API_KEY`.
#[derive(Debug, Clone, Copy)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn new() -> Self {
        Self
    }

    pub fn variable_for(&self, name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{ENV_SECRET_PREFIX}{suffix}")
    }
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let var = self.variable_for(name);
        std::env::var(&var).map_err(|_| ReportError::Secret(SecretError::NotFound(name.into())))
    }
}

/// One file per secret under a directory (mounted secrets volumes).
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String> {
        if name.contains('/') || name.contains("..") {
            return Err(ReportError::Secret(SecretError::Unreadable {
                name: name.into(),
                reason: "secret names may not contain path separators".into(),
            }));
        }
        let path = self.dir.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ReportError::Secret(SecretError::NotFound(name.into())))
            }
            Err(e) => Err(ReportError::Secret(SecretError::Unreadable {
                name: name.into(),
                reason: e.to_string(),
            })),
        }
    }
}

/// A JSON secret yields its `api_key` field; anything else is the key itself.
pub fn extract_api_key(secret: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(secret) {
        Ok(serde_json::Value::Object(map)) => match map.get("api_key") {
            Some(serde_json::Value::String(key)) => key.trim().to_string(),
            _ => secret.to_string(),
        },
        _ => secret.trim().to_string(),
    }
}

/// Resolve the backend credential.
///
/// With a secret store configured, the secret is tried first; a missing or
/// empty secret falls through to the environment key.
pub async fn resolve_api_key(
    env_key: Option<&str>,
    secrets: Option<(&dyn SecretStore, &str)>,
) -> Result<String> {
    if let Some((store, name)) = secrets {
        match store.get_secret(name).await {
            Ok(raw) => {
                let key = extract_api_key(&raw);
                if !key.is_empty() {
                    tracing::info!(secret = name, "API key resolved from secret store");
                    return Ok(key);
                }
                tracing::warn!(secret = name, "secret is empty, falling back to environment");
            }
            Err(e) => tracing::warn!(secret = name, error = %e, "secret lookup failed"),
        }
    }

    env_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ReportError::Secret(SecretError::NotFound("OPENAI_API_KEY".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_extraction() {
        assert_eq!(extract_api_key(r#"{"api_key": "sk-json"}"#), "sk-json");
        assert_eq!(extract_api_key(r#"{"api_key": "  sk-padded\n"}"#), "sk-padded");
        assert_eq!(extract_api_key("sk-plain\n"), "sk-plain");
        assert_eq!(extract_api_key(r#"{"other": 1}"#), r#"{"other": 1}"#);
    }

    #[test]
    fn env_variable_naming() {
        let store = EnvSecretStore::new();
        assert_eq!(store.variable_for("openai-api-key"), "REPGEN_SECRET_OPENAI_API_KEY");
        assert_eq!(store.variable_for("team/key.v2"), "REPGEN_SECRET_TEAM_KEY_V2");
    }

    #[tokio::test]
    async fn file_store_reads_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("openai-api-key"), "{\"api_key\":\"sk-file\"}\n").unwrap();
        let store = FileSecretStore::new(dir.path());

        let raw = store.get_secret("openai-api-key").await.unwrap();
        assert_eq!(extract_api_key(&raw), "sk-file");

        let err = store.get_secret("nope").await.unwrap_err();
        assert!(matches!(err, ReportError::Secret(SecretError::NotFound(_))));

        let err = store.get_secret("../etc").await.unwrap_err();
        assert!(matches!(err, ReportError::Secret(SecretError::Unreadable { .. })));
    }

    #[tokio::test]
    async fn secret_takes_priority_over_env() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("k"), "sk-secret").unwrap();
        let store = FileSecretStore::new(dir.path());

        let secrets: (&dyn SecretStore, &str) = (&store, "k");

        let key = resolve_api_key(Some("sk-env"), Some(secrets)).await.unwrap();
        assert_eq!(key, "sk-secret");
    }

    #[tokio::test]
    async fn missing_secret_falls_back_to_env() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());

        let secrets: (&dyn SecretStore, &str) = (&store, "k");

        let key = resolve_api_key(Some("sk-env"), Some(secrets)).await.unwrap();
        assert_eq!(key, "sk-env");

        let err = resolve_api_key(None, Some(secrets)).await.unwrap_err();
        assert!(matches!(err, ReportError::Secret(SecretError::NotFound(_))));
        assert!(resolve_api_key(Some("  "), None).await.is_err());
    }
}
