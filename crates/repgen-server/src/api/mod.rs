pub mod catalog;
pub mod report;

use axum::{Json, Router, routing::get};
use chrono::Utc;

use repgen_pipeline::clock::iso_timestamp;

use crate::state::AppState;
use crate::types::{HealthResponse, ServiceInfo};

pub const SERVICE_NAME: &str = "report-generator-api";

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(catalog::routes())
        .merge(report::routes())
        .with_state(state)
}

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Report Generator API",
        version: env!("CARGO_PKG_VERSION"),
        health: "/health",
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: iso_timestamp(Utc::now()),
        service: SERVICE_NAME,
    })
}
