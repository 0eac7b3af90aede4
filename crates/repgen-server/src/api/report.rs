use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::{Json, Router, routing::post};
use chrono::Utc;

use repgen_pipeline::clock::iso_timestamp;
use repgen_pipeline::storage::S3Path;

use crate::error::AppError;
use crate::extractors::ApiKeyGuard;
use crate::state::AppState;
use crate::types::{GenerateReportRequest, GenerateReportResponse};

pub fn routes() -> Router<AppState> {
    Router::new().route("/generate-report", post(generate_report))
}

/// First path outside `s3://<bucket>/`, if any.
pub fn first_foreign_path<'a>(paths: &'a [String], bucket: &str) -> Option<&'a String> {
    paths.iter().find(|p| !S3Path::is_within_bucket(p, bucket))
}

async fn generate_report(
    _guard: ApiKeyGuard,
    State(state): State<AppState>,
    payload: Result<Json<GenerateReportRequest>, JsonRejection>,
) -> Result<Json<GenerateReportResponse>, AppError> {
    let Json(req) = payload?;
    tracing::info!(
        request = %req.user_request,
        paths = req.s3_paths.len(),
        "received report request"
    );

    if let Some(path) = first_foreign_path(&req.s3_paths, &state.allowed_bucket) {
        return Err(AppError::PathValidation(path.clone()));
    }

    let report = state.service.generate(&req.user_request, &req.s3_paths).await?;
    tracing::info!(report_id = %report.report_id, "report generated");

    Ok(Json(GenerateReportResponse {
        status: "success",
        report,
        generated_at: iso_timestamp(Utc::now()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_foreign_path_finds_offender() {
        let paths = vec![
            "s3://ok/a.json".to_string(),
            "s3://okay/b.json".to_string(),
            "s3://other/c.json".to_string(),
        ];
        assert_eq!(first_foreign_path(&paths, "ok"), Some(&paths[1]));
        assert_eq!(first_foreign_path(&paths[..1], "ok"), None);
    }
}
