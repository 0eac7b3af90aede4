use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::{AppState, AuthSettings};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Proof that the caller passed the API-key gate.
#[derive(Debug, Clone, Copy)]
pub struct ApiKeyGuard;

impl ApiKeyGuard {
    pub fn check(auth: &AuthSettings, presented: Option<&str>) -> Result<Self, AppError> {
        if !auth.required {
            return Ok(ApiKeyGuard);
        }
        let presented = presented
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Auth("API Key required".into()))?;
        match &auth.api_key {
            Some(expected) if expected == presented => Ok(ApiKeyGuard),
            _ => Err(AppError::Auth("Invalid API Key".into())),
        }
    }
}

impl FromRequestParts<AppState> for ApiKeyGuard {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        Self::check(&state.auth, presented)
    }
}
