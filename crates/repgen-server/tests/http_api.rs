//! Route-level tests against the in-process router. No network.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use repgen_llm::{ChatGenerator, ScriptedChatModel, ScriptedReply};
use repgen_pipeline::clock::FixedClock;
use repgen_pipeline::fallback::FallbackAssembler;
use repgen_pipeline::orchestrator::ReportPipeline;
use repgen_pipeline::service::ReportService;
use repgen_server::state::{AppState, AuthSettings};

const BUCKET: &str = "kizukai-ds-tmp";
const KEY: &str = "test-key";

fn mock_state(auth: AuthSettings) -> AppState {
    let assembler = FallbackAssembler::new(Arc::new(FixedClock::from_millis(1_700_000_000_000)));
    AppState::new(ReportService::mock(assembler), auth, BUCKET)
}

fn strict_state(script: Vec<ScriptedReply>) -> AppState {
    let generator = ChatGenerator::new(ScriptedChatModel::new(script));
    let pipeline = ReportPipeline::new(
        Arc::new(generator),
        Vec::new(),
        Arc::new(FixedClock::from_millis(0)),
    );
    AppState::new(ReportService::strict(Arc::new(pipeline)), AuthSettings::key(KEY), BUCKET)
}

fn generate_request(key: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/generate-report")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body)).unwrap()
}

fn sales_body(paths: &[&str]) -> String {
    json!({
        "user_request": "月次売上レポートを作成してください。日別の売上推移と製品カテゴリ別の売上を見たいです。",
        "s3_paths": paths,
    })
    .to_string()
}

async fn send(state: AppState, req: Request<Body>) -> (StatusCode, Value) {
    let resp = repgen_server::app_router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
    send(state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn root_banner() {
    let (status, body) = get(mock_state(AuthSettings::disabled()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Report Generator API");
    assert_eq!(body["health"], "/health");
}

#[tokio::test]
async fn health_reports_service_name() {
    let (status, body) = get(mock_state(AuthSettings::disabled()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "report-generator-api");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn sample_paths_follow_configured_bucket() {
    let (status, body) = get(mock_state(AuthSettings::disabled()), "/sample-s3-paths").await;
    assert_eq!(status, StatusCode::OK);
    let paths = body["sample_paths"].as_array().unwrap();
    assert_eq!(paths.len(), 2);
    for path in paths {
        assert!(path.as_str().unwrap().starts_with("s3://kizukai-ds-tmp/"));
    }
}

#[tokio::test]
async fn available_components_catalog() {
    let (status, body) = get(mock_state(AuthSettings::disabled()), "/available-components").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["header_components"], json!(["MainHeader", "SubHeader"]));
    assert_eq!(
        body["main_components"],
        json!(["DataTable", "BarChart", "Card", "TextField", "MarkdownField"])
    );
    assert_eq!(body["data_sources"], json!(["TEXT", "S3"]));
    assert_eq!(body["bar_chart_required_props"], json!(["xField", "yFields"]));
    assert_eq!(body["card_required_props"], json!(["title"]));
}

#[tokio::test]
async fn generate_report_with_valid_key() {
    let daily = "s3://kizukai-ds-tmp/ai_report_json_mock/input_data/daily-sales.json";
    let category = "s3://kizukai-ds-tmp/ai_report_json_mock/input_data/category-sales.json";
    let req = generate_request(Some(KEY), sales_body(&[daily, category]));

    let (status, body) = send(mock_state(AuthSettings::key(KEY)), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert!(body["generated_at"].is_string());

    let report = &body["report"];
    assert_eq!(report["reportId"], "report_1700000000000");
    assert_eq!(report["title"], "月次売上レポート");
    assert_eq!(report["createdBy"], "agent_generated");

    let main = report["sections"]["main"].as_array().unwrap();
    let table = main.iter().find(|s| s["component"] == "DataTable").unwrap();
    assert_eq!(table["contents"][0]["value"], daily);
    let chart = main.iter().find(|s| s["component"] == "BarChart").unwrap();
    assert_eq!(chart["contents"][0]["value"], category);
    assert_eq!(chart["contents"][0]["props"]["xField"], "category");
    assert_eq!(chart["contents"][0]["props"]["yFields"], json!(["sales", "profit"]));
}

#[tokio::test]
async fn missing_key_is_forbidden() {
    let req = generate_request(None, sales_body(&[]));
    let (status, body) = send(mock_state(AuthSettings::key(KEY)), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "API Key required");
    assert_eq!(body["status_code"], 403);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn wrong_key_is_forbidden() {
    let req = generate_request(Some("wrong"), sales_body(&[]));
    let (status, body) = send(mock_state(AuthSettings::key(KEY)), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid API Key");
}

#[tokio::test]
async fn required_but_unconfigured_key_rejects_all() {
    let auth = AuthSettings {
        required: true,
        api_key: None,
    };
    let req = generate_request(Some("anything"), sales_body(&[]));
    let (status, _) = send(mock_state(auth), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn disabled_gate_needs_no_key() {
    let req = generate_request(None, sales_body(&[]));
    let (status, body) = send(mock_state(AuthSettings::disabled()), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn foreign_bucket_is_rejected_before_generation() {
    // An empty script would fail the run if any stage were invoked.
    let state = strict_state(Vec::new());
    let req = generate_request(
        Some(KEY),
        sales_body(&["s3://kizukai-ds-tmp/a.json", "s3://kizukai-ds-tmp-evil/b.json"]),
    );
    let (status, body) = send(state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid S3 path: s3://kizukai-ds-tmp-evil/b.json");
    assert_eq!(body["status_code"], 400);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let req = generate_request(Some(KEY), r#"{"user_request": 42}"#.to_string());
    let (status, body) = send(mock_state(AuthSettings::key(KEY)), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn strict_parse_failure_is_server_error() {
    let state = strict_state(vec![ScriptedReply::text("I cannot answer that.")]);
    let req = generate_request(Some(KEY), sales_body(&[]));
    let (status, body) = send(state, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Report generation failed"));
    assert!(message.contains("GOAL"));
}

#[tokio::test]
async fn strict_backend_failure_is_bad_gateway() {
    let state = strict_state(vec![ScriptedReply::Error("upstream unavailable".into())]);
    let req = generate_request(Some(KEY), sales_body(&[]));
    let (status, body) = send(state, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status_code"], 502);
}
