//! Platform Adapter Interface (C2): the closed capability surface the executor dispatches
//! through. Concrete implementations (Databricks, ADF, or a test mock) live in the
//! `remediation-adapters` crate; this trait is the seam between them and the orchestrator.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use remediation_common::AdapterError;
use serde_json::Value;

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Lifecycle state of a cluster, as reported by `GetClusterState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterState {
    pub state: ClusterLifecycle,
    pub termination_reason: Option<String>,
    pub worker_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLifecycle {
    Running,
    Restarting,
    Terminated,
    Pending,
    Unknown,
}

/// Terminal/non-terminal state of a job run, as reported by `GetRunState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub life_cycle_state: RunLifecycle,
    pub result_state: Option<RunResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLifecycle {
    Pending,
    Running,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    Success,
    Failed,
    TimedOut,
    Canceled,
}

/// Status of an ADF pipeline run, as reported by `GetPipelineRunState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRunState {
    pub status: PipelineRunStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineRunStatus {
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

/// A platform's implementation of the §4.2 capability set. All calls are bounded by `deadline`
/// and honored as such: an adapter that cannot complete within the deadline must return a
/// `Transient` (or `Throttled`) error rather than block past it.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Stable platform identifier (`"databricks"`, `"adf"`), used in logs and diagnostics.
    fn platform(&self) -> &'static str;

    async fn retry_job(
        &self,
        job_id: &str,
        run_id: &str,
        deadline: Duration,
    ) -> AdapterResult<String>;

    async fn restart_cluster(&self, cluster_id: &str, deadline: Duration) -> AdapterResult<()>;

    async fn scale_cluster(
        &self,
        cluster_id: &str,
        delta_percent: u32,
        cap: u32,
        deadline: Duration,
    ) -> AdapterResult<u32>;

    async fn library_fallback(
        &self,
        cluster_id: &str,
        library_name: &str,
        candidate_versions: &[String],
        deadline: Duration,
    ) -> AdapterResult<String>;

    async fn rerun_pipeline(
        &self,
        pipeline_name: &str,
        factory_name: &str,
        resource_group: &str,
        deadline: Duration,
    ) -> AdapterResult<String>;

    async fn get_cluster_state(
        &self,
        cluster_id: &str,
        deadline: Duration,
    ) -> AdapterResult<ClusterState>;

    async fn get_run_state(&self, run_id: &str, deadline: Duration) -> AdapterResult<RunState>;

    async fn get_pipeline_run_state(
        &self,
        run_id: &str,
        deadline: Duration,
    ) -> AdapterResult<PipelineRunState>;
}

/// Action-specific parameters decoded from `PlaybookConfig::action_params`.
pub fn param_u32(params: &HashMap<String, Value>, key: &str, default: u32) -> u32 {
    params
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .unwrap_or(default)
}

pub fn param_str_vec(params: &HashMap<String, Value>, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
