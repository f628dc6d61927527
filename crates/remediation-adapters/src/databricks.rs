//! Databricks REST platform adapter. The wire format of the Databricks Jobs/Clusters APIs is
//! out of scope for the orchestrator core; this adapter's job is only to translate the typed
//! `PlatformAdapter` contract into bounded HTTP calls and map transport/HTTP failures onto the
//! adapter error kinds the executor understands.

use std::time::Duration;

use async_trait::async_trait;
use remediation_common::AdapterError;
use remediation_core::{AdapterResult, ClusterLifecycle, ClusterState, PipelineRunState, PlatformAdapter, RunLifecycle, RunResult, RunState};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::debug;

pub struct DatabricksAdapter {
    client: Client,
    base_url: String,
    token: String,
}

impl DatabricksAdapter {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value, deadline: Duration) -> AdapterResult<serde_json::Value> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        map_response(response).await
    }

    async fn get(&self, path: &str, deadline: Duration) -> AdapterResult<serde_json::Value> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        map_response(response).await
    }
}

fn classify_transport_error(err: &reqwest::Error) -> AdapterError {
    if err.is_timeout() || err.is_connect() {
        AdapterError::transient(err.to_string())
    } else {
        AdapterError::permanent(err.to_string())
    }
}

async fn map_response(response: reqwest::Response) -> AdapterResult<serde_json::Value> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        return Err(AdapterError::throttled("rate limited by Databricks", retry_after));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AdapterError {
            kind: remediation_common::AdapterErrorKind::AuthFailure,
            message: format!("Databricks rejected credentials: {status}"),
            retry_after_seconds: None,
        });
    }
    if status == StatusCode::NOT_FOUND {
        return Err(AdapterError::not_found(format!("Databricks resource not found: {status}")));
    }
    if status.is_server_error() {
        return Err(AdapterError::transient(format!("Databricks server error: {status}")));
    }
    if !status.is_success() {
        return Err(AdapterError::permanent(format!("Databricks request failed: {status}")));
    }

    response
        .json()
        .await
        .map_err(|e| AdapterError::permanent(format!("invalid Databricks response body: {e}")))
}

#[async_trait]
impl PlatformAdapter for DatabricksAdapter {
    fn platform(&self) -> &'static str {
        "databricks"
    }

    async fn retry_job(&self, job_id: &str, run_id: &str, deadline: Duration) -> AdapterResult<String> {
        debug!(job_id, run_id, "retrying databricks job run");
        let body = self
            .post("/api/2.1/jobs/run-now", json!({ "job_id": job_id, "retry_run_id": run_id }), deadline)
            .await?;
        body.get("run_id")
            .and_then(|v| v.as_u64())
            .map(|v| v.to_string())
            .ok_or_else(|| AdapterError::permanent("missing run_id in retry response"))
    }

    async fn restart_cluster(&self, cluster_id: &str, deadline: Duration) -> AdapterResult<()> {
        debug!(cluster_id, "restarting databricks cluster");
        self.post("/api/2.1/clusters/restart", json!({ "cluster_id": cluster_id }), deadline)
            .await?;
        Ok(())
    }

    async fn scale_cluster(
        &self,
        cluster_id: &str,
        delta_percent: u32,
        cap: u32,
        deadline: Duration,
    ) -> AdapterResult<u32> {
        let current = self.get_cluster_state(cluster_id, deadline).await?.worker_count;
        let scaled = ((current as f64) * (1.0 + delta_percent as f64 / 100.0)).ceil() as u32;
        let new_count = scaled.min(cap);
        if new_count == current {
            return Ok(current);
        }
        self.post(
            "/api/2.1/clusters/resize",
            json!({ "cluster_id": cluster_id, "num_workers": new_count }),
            deadline,
        )
        .await?;
        Ok(new_count)
    }

    async fn library_fallback(
        &self,
        cluster_id: &str,
        library_name: &str,
        candidate_versions: &[String],
        deadline: Duration,
    ) -> AdapterResult<String> {
        for version in candidate_versions {
            let result = self
                .post(
                    "/api/2.1/libraries/install",
                    json!({ "cluster_id": cluster_id, "library": { "pypi": { "package": format!("{library_name}=={version}") } } }),
                    deadline,
                )
                .await;
            if result.is_ok() {
                return Ok(version.clone());
            }
        }
        Err(AdapterError::permanent(format!(
            "no candidate version of '{library_name}' was accepted"
        )))
    }

    async fn rerun_pipeline(
        &self,
        _pipeline_name: &str,
        _factory_name: &str,
        _resource_group: &str,
        _deadline: Duration,
    ) -> AdapterResult<String> {
        Err(AdapterError::permanent("rerun_pipeline is not a Databricks action"))
    }

    async fn get_cluster_state(&self, cluster_id: &str, deadline: Duration) -> AdapterResult<ClusterState> {
        let body = self
            .get(&format!("/api/2.1/clusters/get?cluster_id={cluster_id}"), deadline)
            .await?;
        let state = match body.get("state").and_then(|v| v.as_str()).unwrap_or("UNKNOWN") {
            "RUNNING" => ClusterLifecycle::Running,
            "RESTARTING" | "RESIZING" => ClusterLifecycle::Restarting,
            "TERMINATED" | "ERROR" => ClusterLifecycle::Terminated,
            "PENDING" => ClusterLifecycle::Pending,
            _ => ClusterLifecycle::Unknown,
        };
        Ok(ClusterState {
            state,
            termination_reason: body
                .get("termination_reason")
                .and_then(|v| v.get("code"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            worker_count: body.get("num_workers").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        })
    }

    async fn get_run_state(&self, run_id: &str, deadline: Duration) -> AdapterResult<RunState> {
        let body = self
            .get(&format!("/api/2.1/jobs/runs/get?run_id={run_id}"), deadline)
            .await?;
        let state = body.get("state").cloned().unwrap_or_default();
        let life_cycle_state = match state.get("life_cycle_state").and_then(|v| v.as_str()).unwrap_or("") {
            "TERMINATED" | "INTERNAL_ERROR" => RunLifecycle::Terminated,
            "PENDING" | "QUEUED" => RunLifecycle::Pending,
            _ => RunLifecycle::Running,
        };
        let result_state = match state.get("result_state").and_then(|v| v.as_str()) {
            Some("SUCCESS") => Some(RunResult::Success),
            Some("FAILED") => Some(RunResult::Failed),
            Some("TIMEDOUT") => Some(RunResult::TimedOut),
            Some("CANCELED") => Some(RunResult::Canceled),
            _ => None,
        };
        Ok(RunState {
            life_cycle_state,
            result_state,
            error: state.get("state_message").and_then(|v| v.as_str()).map(str::to_string),
        })
    }

    async fn get_pipeline_run_state(&self, _run_id: &str, _deadline: Duration) -> AdapterResult<PipelineRunState> {
        Err(AdapterError::permanent("pipeline runs are an ADF concept"))
    }
}
