//! HTTP handlers for the operator surface and the webhook intake endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use remediation_common::RecoveryRequest;
use remediation_core::OperatorSurface;
use serde_json::json;
use tracing::{info, warn};

use crate::app::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/webhooks/pipeline-failure", post(handle_pipeline_failure))
        .route("/api/circuit-breakers", get(list_circuit_breakers))
        .route("/api/circuit-breakers/:key/reset", post(reset_circuit_breaker))
        .route("/api/supported-error-types", get(list_supported_error_types))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Accepts an upstream failure report and runs it through the recovery orchestrator.
///
/// Error classification (which `error_type` a raw failure maps to) happens upstream of this
/// engine; callers are expected to submit an already-classified `RecoveryRequest`.
async fn handle_pipeline_failure(
    State(state): State<AppState>,
    Json(request): Json<RecoveryRequest>,
) -> impl IntoResponse {
    info!(ticket_id = %request.ticket_id, error_type = %request.error_type, "received recovery request");
    let result = state.executor.execute(&request).await;
    if result.success {
        (StatusCode::OK, Json(result)).into_response()
    } else {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(result)).into_response()
    }
}

async fn list_circuit_breakers(State(state): State<AppState>) -> impl IntoResponse {
    let surface = OperatorSurface::new(&state.executor);
    Json(surface.list_breakers().await)
}

async fn reset_circuit_breaker(State(state): State<AppState>, Path(key): Path<String>) -> impl IntoResponse {
    let surface = OperatorSurface::new(&state.executor);
    warn!(breaker_key = %key, "operator reset circuit breaker");
    surface.reset_breaker(&key).await;
    StatusCode::NO_CONTENT
}

async fn list_supported_error_types(State(state): State<AppState>) -> impl IntoResponse {
    let surface = OperatorSurface::new(&state.executor);
    Json(surface.list_playbooks())
}
