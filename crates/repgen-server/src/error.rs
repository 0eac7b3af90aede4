use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;

use repgen_core::error::ReportError;
use repgen_pipeline::clock::iso_timestamp;

/// Application error type that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Auth(String),
    PathValidation(String),
    BadRequest(String),
    Report(ReportError),
    Internal(String),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        AppError::Report(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::FORBIDDEN,
            AppError::PathValidation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Report(err) if err.is_backend() => StatusCode::BAD_GATEWAY,
            AppError::Report(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::Auth(msg) | AppError::BadRequest(msg) | AppError::Internal(msg) => {
                msg.clone()
            }
            AppError::PathValidation(path) => format!("Invalid S3 path: {path}"),
            AppError::Report(err) => format!("Report generation failed: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), %message, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), %message, "request rejected");
        }

        let body = json!({
            "error": true,
            "message": message,
            "status_code": status.as_u16(),
            "timestamp": iso_timestamp(Utc::now()),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repgen_core::error::{ModelError, PipelineError, StorageError};

    #[test]
    fn auth_error_returns_403() {
        let resp = AppError::Auth("API Key required".into()).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn path_validation_names_the_path() {
        let err = AppError::PathValidation("s3://other/x.json".into());
        assert_eq!(err.message(), "Invalid S3 path: s3://other/x.json");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn backend_failure_returns_502() {
        let err = AppError::Report(ReportError::Model(ModelError::Timeout {
            limit: std::time::Duration::from_secs(120),
        }));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let storage = AppError::Report(ReportError::Storage(StorageError::Request("reset".into())));
        assert_eq!(storage.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn wrapped_backend_failure_returns_502() {
        let err = AppError::Report(ReportError::Pipeline(PipelineError::Run {
            state: "GOAL".into(),
            source: Box::new(ReportError::Model(ModelError::Auth("bad key".into()))),
        }));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn pipeline_failure_returns_500() {
        let err = AppError::Report(ReportError::Pipeline(PipelineError::EmptyOutput {
            stage: "goal".into(),
        }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().starts_with("Report generation failed:"));
    }
}
