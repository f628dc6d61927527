//! Exercises the Databricks and ADF adapters' HTTP-status-to-`AdapterErrorKind` mapping against
//! a real HTTP server, rather than asserting on the mapping function in isolation.

use std::time::Duration;

use remediation_adapters::{AdfAdapter, DatabricksAdapter};
use remediation_common::AdapterErrorKind;
use remediation_core::PlatformAdapter;
use serde_json::json;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEADLINE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn databricks_retry_job_success_returns_new_run_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/2.1/jobs/run-now"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "run_id": 999 })))
        .mount(&server)
        .await;

    let adapter = DatabricksAdapter::new(server.uri(), "token");
    let run_id = adapter.retry_job("J1", "R1", DEADLINE).await.unwrap();
    assert_eq!(run_id, "999");
}

#[tokio::test]
async fn databricks_429_maps_to_throttled_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/2.1/jobs/run-now"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let adapter = DatabricksAdapter::new(server.uri(), "token");
    let err = adapter.retry_job("J1", "R1", DEADLINE).await.unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::Throttled);
    assert_eq!(err.retry_after_seconds, Some(7));
}

#[tokio::test]
async fn databricks_401_maps_to_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.1/clusters/get"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let adapter = DatabricksAdapter::new(server.uri(), "token");
    let err = adapter.get_cluster_state("C1", DEADLINE).await.unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::AuthFailure);
}

#[tokio::test]
async fn databricks_404_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/2.1/clusters/restart"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = DatabricksAdapter::new(server.uri(), "token");
    let err = adapter.restart_cluster("C1", DEADLINE).await.unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::NotFound);
}

#[tokio::test]
async fn databricks_5xx_maps_to_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/2.1/clusters/restart"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let adapter = DatabricksAdapter::new(server.uri(), "token");
    let err = adapter.restart_cluster("C1", DEADLINE).await.unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::Transient);
}

#[tokio::test]
async fn adf_rerun_pipeline_success_returns_run_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/subscriptions/.*/createRun$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "runId": "run-123" })))
        .mount(&server)
        .await;

    let adapter = AdfAdapter::new(server.uri(), "token", "sub-1");
    let run_id = adapter
        .rerun_pipeline("pipe", "factory", "rg", DEADLINE)
        .await
        .unwrap();
    assert_eq!(run_id, "run-123");
}

#[tokio::test]
async fn adf_429_maps_to_throttled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/subscriptions/.*/createRun$"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let adapter = AdfAdapter::new(server.uri(), "token", "sub-1");
    let err = adapter
        .rerun_pipeline("pipe", "factory", "rg", DEADLINE)
        .await
        .unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::Throttled);
}

#[tokio::test]
async fn adf_pipeline_run_state_succeeded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pipelineruns/run-123"))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Succeeded" })))
        .mount(&server)
        .await;

    let adapter = AdfAdapter::new(server.uri(), "token", "sub-1");
    let state = adapter.get_pipeline_run_state("run-123", DEADLINE).await.unwrap();
    assert_eq!(state.status, remediation_core::PipelineRunStatus::Succeeded);
}

#[tokio::test]
async fn adf_pipeline_run_state_404_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pipelineruns/run-missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = AdfAdapter::new(server.uri(), "token", "sub-1");
    let err = adapter
        .get_pipeline_run_state("run-missing", DEADLINE)
        .await
        .unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::NotFound);
}
