use serde::{Deserialize, Serialize};

use repgen_pipeline::document::ReportDocument;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerateReportRequest {
    pub user_request: String,
    pub s3_paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateReportResponse {
    pub status: &'static str,
    pub report: ReportDocument,
    pub generated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub health: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SamplePathsResponse {
    pub sample_paths: Vec<String>,
    pub description: &'static str,
}
