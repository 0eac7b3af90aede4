use axum::extract::State;
use axum::{Json, Router, routing::get};

use repgen_pipeline::catalog::ComponentCatalog;

use crate::state::AppState;
use crate::types::SamplePathsResponse;

const SAMPLE_KEYS: &[&str] = &[
    "ai_report_json_mock/input_data/daily-sales.json",
    "ai_report_json_mock/input_data/category-sales.json",
];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sample-s3-paths", get(sample_paths))
        .route("/available-components", get(available_components))
}

async fn sample_paths(State(state): State<AppState>) -> Json<SamplePathsResponse> {
    Json(SamplePathsResponse {
        sample_paths: sample_paths_for(&state.allowed_bucket),
        description: "利用可能なサンプルS3パス",
    })
}

async fn available_components() -> Json<ComponentCatalog> {
    Json(ComponentCatalog::standard())
}

pub fn sample_paths_for(bucket: &str) -> Vec<String> {
    SAMPLE_KEYS
        .iter()
        .map(|key| format!("s3://{bucket}/{key}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_paths_use_the_bucket() {
        let paths = sample_paths_for("reports");
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.starts_with("s3://reports/")));
    }
}
