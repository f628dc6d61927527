//! A scripted, in-memory `PlatformAdapter` used by integration tests. Each call type is backed
//! by a queue of canned responses so a test can script an exact sequence of failures followed
//! by a success, mirroring the concrete scenarios in the testable-properties section of the
//! specification.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use remediation_common::AdapterError;
use remediation_core::{
    AdapterResult, ClusterState, PipelineRunState, PlatformAdapter, RunState,
};

#[derive(Default)]
pub struct ScriptedAdapter {
    platform: &'static str,
    retry_job: Mutex<VecDeque<AdapterResult<String>>>,
    restart_cluster: Mutex<VecDeque<AdapterResult<()>>>,
    scale_cluster: Mutex<VecDeque<AdapterResult<u32>>>,
    library_fallback: Mutex<VecDeque<AdapterResult<String>>>,
    rerun_pipeline: Mutex<VecDeque<AdapterResult<String>>>,
    cluster_state: Mutex<VecDeque<AdapterResult<ClusterState>>>,
    run_state: Mutex<VecDeque<AdapterResult<RunState>>>,
    pipeline_run_state: Mutex<VecDeque<AdapterResult<PipelineRunState>>>,
    pub request_count: Mutex<usize>,
}

impl ScriptedAdapter {
    pub fn new(platform: &'static str) -> Self {
        Self {
            platform,
            ..Default::default()
        }
    }

    pub fn push_retry_job(&self, result: AdapterResult<String>) -> &Self {
        self.retry_job.lock().push_back(result);
        self
    }

    pub fn push_restart_cluster(&self, result: AdapterResult<()>) -> &Self {
        self.restart_cluster.lock().push_back(result);
        self
    }

    pub fn push_scale_cluster(&self, result: AdapterResult<u32>) -> &Self {
        self.scale_cluster.lock().push_back(result);
        self
    }

    pub fn push_library_fallback(&self, result: AdapterResult<String>) -> &Self {
        self.library_fallback.lock().push_back(result);
        self
    }

    pub fn push_rerun_pipeline(&self, result: AdapterResult<String>) -> &Self {
        self.rerun_pipeline.lock().push_back(result);
        self
    }

    pub fn push_cluster_state(&self, result: AdapterResult<ClusterState>) -> &Self {
        self.cluster_state.lock().push_back(result);
        self
    }

    pub fn push_run_state(&self, result: AdapterResult<RunState>) -> &Self {
        self.run_state.lock().push_back(result);
        self
    }

    pub fn push_pipeline_run_state(&self, result: AdapterResult<PipelineRunState>) -> &Self {
        self.pipeline_run_state.lock().push_back(result);
        self
    }

    pub fn call_count(&self) -> usize {
        *self.request_count.lock()
    }

    fn next<T>(queue: &Mutex<VecDeque<AdapterResult<T>>>) -> AdapterResult<T> {
        queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AdapterError::permanent("scripted adapter exhausted")))
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
    fn platform(&self) -> &'static str {
        self.platform
    }

    async fn retry_job(&self, _job_id: &str, _run_id: &str, _deadline: Duration) -> AdapterResult<String> {
        *self.request_count.lock() += 1;
        Self::next(&self.retry_job)
    }

    async fn restart_cluster(&self, _cluster_id: &str, _deadline: Duration) -> AdapterResult<()> {
        *self.request_count.lock() += 1;
        Self::next(&self.restart_cluster)
    }

    async fn scale_cluster(
        &self,
        _cluster_id: &str,
        _delta_percent: u32,
        _cap: u32,
        _deadline: Duration,
    ) -> AdapterResult<u32> {
        *self.request_count.lock() += 1;
        Self::next(&self.scale_cluster)
    }

    async fn library_fallback(
        &self,
        _cluster_id: &str,
        _library_name: &str,
        _candidate_versions: &[String],
        _deadline: Duration,
    ) -> AdapterResult<String> {
        *self.request_count.lock() += 1;
        Self::next(&self.library_fallback)
    }

    async fn rerun_pipeline(
        &self,
        _pipeline_name: &str,
        _factory_name: &str,
        _resource_group: &str,
        _deadline: Duration,
    ) -> AdapterResult<String> {
        *self.request_count.lock() += 1;
        Self::next(&self.rerun_pipeline)
    }

    async fn get_cluster_state(&self, _cluster_id: &str, _deadline: Duration) -> AdapterResult<ClusterState> {
        Self::next(&self.cluster_state)
    }

    async fn get_run_state(&self, _run_id: &str, _deadline: Duration) -> AdapterResult<RunState> {
        Self::next(&self.run_state)
    }

    async fn get_pipeline_run_state(
        &self,
        _run_id: &str,
        _deadline: Duration,
    ) -> AdapterResult<PipelineRunState> {
        Self::next(&self.pipeline_run_state)
    }
}
