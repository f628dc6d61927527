//! Azure Data Factory platform adapter. Only `rerun_pipeline` and `get_pipeline_run_state` are
//! meaningful for ADF; the cluster/job/library capabilities are Databricks-only and return a
//! permanent error if ever dispatched against this adapter (a configuration mistake, not a
//! runtime condition the executor should retry).

use std::time::Duration;

use async_trait::async_trait;
use remediation_common::{AdapterError, AdapterErrorKind};
use remediation_core::{
    AdapterResult, ClusterState, PipelineRunState, PipelineRunStatus, PlatformAdapter, RunState,
};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::debug;

const API_VERSION: &str = "2018-06-01";

pub struct AdfAdapter {
    client: Client,
    management_api_base: String,
    bearer_token: String,
    subscription_id: String,
}

impl AdfAdapter {
    pub fn new(
        management_api_base: impl Into<String>,
        bearer_token: impl Into<String>,
        subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            management_api_base: management_api_base.into(),
            bearer_token: bearer_token.into(),
            subscription_id: subscription_id.into(),
        }
    }

    fn not_applicable() -> AdapterError {
        AdapterError::permanent("this capability is not an ADF action")
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
        return Err(AdapterError::throttled("rate limited by ADF", retry_after));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AdapterError {
            kind: AdapterErrorKind::AuthFailure,
            message: format!("ADF rejected credentials: {status}"),
            retry_after_seconds: None,
        });
    }
    if status == StatusCode::NOT_FOUND {
        return Err(AdapterError::not_found(format!("ADF resource not found: {status}")));
    }
    if status.is_server_error() {
        return Err(AdapterError::transient(format!("ADF server error: {status}")));
    }
    if !status.is_success() {
        return Err(AdapterError::permanent(format!("ADF request failed: {status}")));
    }

    response
        .json()
        .await
        .map_err(|e| AdapterError::permanent(format!("invalid ADF response body: {e}")))
}

#[async_trait]
impl PlatformAdapter for AdfAdapter {
    fn platform(&self) -> &'static str {
        "adf"
    }

    async fn retry_job(&self, _job_id: &str, _run_id: &str, _deadline: Duration) -> AdapterResult<String> {
        Err(Self::not_applicable())
    }

    async fn restart_cluster(&self, _cluster_id: &str, _deadline: Duration) -> AdapterResult<()> {
        Err(Self::not_applicable())
    }

    async fn scale_cluster(
        &self,
        _cluster_id: &str,
        _delta_percent: u32,
        _cap: u32,
        _deadline: Duration,
    ) -> AdapterResult<u32> {
        Err(Self::not_applicable())
    }

    async fn library_fallback(
        &self,
        _cluster_id: &str,
        _library_name: &str,
        _candidate_versions: &[String],
        _deadline: Duration,
    ) -> AdapterResult<String> {
        Err(Self::not_applicable())
    }

    async fn rerun_pipeline(
        &self,
        pipeline_name: &str,
        factory_name: &str,
        resource_group: &str,
        deadline: Duration,
    ) -> AdapterResult<String> {
        debug!(pipeline_name, factory_name, "triggering ADF pipeline run");
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{resource_group}/providers/Microsoft.DataFactory/factories/{factory_name}/pipelines/{pipeline_name}/createRun?api-version={API_VERSION}",
            self.management_api_base, self.subscription_id
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.bearer_token)
            .json(&json!({}))
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let body = map_response(response).await?;
        body.get("runId")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AdapterError::permanent("missing runId in ADF response"))
    }

    async fn get_cluster_state(&self, _cluster_id: &str, _deadline: Duration) -> AdapterResult<ClusterState> {
        Err(Self::not_applicable())
    }

    async fn get_run_state(&self, _run_id: &str, _deadline: Duration) -> AdapterResult<RunState> {
        Err(Self::not_applicable())
    }

    async fn get_pipeline_run_state(&self, run_id: &str, deadline: Duration) -> AdapterResult<PipelineRunState> {
        let url = format!(
            "{}/pipelineruns/{run_id}?api-version={API_VERSION}",
            self.management_api_base
        );
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let body = map_response(response).await?;

        let status = match body.get("status").and_then(|v| v.as_str()).unwrap_or("") {
            "Succeeded" => PipelineRunStatus::Succeeded,
            "Failed" => PipelineRunStatus::Failed,
            "Cancelled" => PipelineRunStatus::Cancelled,
            _ => PipelineRunStatus::InProgress,
        };

        Ok(PipelineRunState {
            status,
            error: body
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}
