//! Health Verifier (C4): post-action polling of resource state until healthy, unhealthy, or
//! timeout.

use std::time::Duration;

use crate::adapter::{
    ClusterLifecycle, ClusterState, PipelineRunState, PipelineRunStatus, PlatformAdapter,
    RunLifecycle, RunResult, RunState,
};
use tokio::time::Instant;
use tracing::debug;

/// The kind of resource a health check polls, each with its own terminal-state policy (§4.4).
pub enum HealthTarget<'a> {
    Cluster {
        cluster_id: &'a str,
        /// When set, the cluster is only healthy once it has reached (at least) this worker
        /// count, used after `scale_cluster`.
        expected_worker_count: Option<u32>,
    },
    JobRun {
        run_id: &'a str,
    },
    PipelineRun {
        run_id: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthOutcome {
    pub healthy: bool,
    pub reason: String,
}

impl HealthOutcome {
    fn healthy() -> Self {
        Self {
            healthy: true,
            reason: "healthy".to_string(),
        }
    }

    fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            healthy: false,
            reason: reason.into(),
        }
    }
}

/// Polls `adapter` for `target` every `poll_interval` until a terminal state is observed or
/// `timeout` elapses.
pub async fn verify_health(
    adapter: &dyn PlatformAdapter,
    target: HealthTarget<'_>,
    timeout: Duration,
    poll_interval: Duration,
) -> HealthOutcome {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let outcome = match &target {
            HealthTarget::Cluster {
                cluster_id,
                expected_worker_count,
            } => poll_cluster(adapter, cluster_id, *expected_worker_count, remaining).await,
            HealthTarget::JobRun { run_id } => poll_job_run(adapter, run_id, remaining).await,
            HealthTarget::PipelineRun { run_id } => {
                poll_pipeline_run(adapter, run_id, remaining).await
            }
        };

        if let Some(outcome) = outcome {
            return outcome;
        }

        if Instant::now() >= deadline {
            return HealthOutcome::unhealthy("timeout");
        }

        let sleep_for = poll_interval.min(deadline.saturating_duration_since(Instant::now()));
        if sleep_for.is_zero() {
            return HealthOutcome::unhealthy("timeout");
        }
        tokio::time::sleep(sleep_for).await;
    }
}

/// Returns `Some(outcome)` when a terminal state (healthy or unhealthy) was observed, `None`
/// when the caller should keep polling.
async fn poll_cluster(
    adapter: &dyn PlatformAdapter,
    cluster_id: &str,
    expected_worker_count: Option<u32>,
    remaining: Duration,
) -> Option<HealthOutcome> {
    let state = fetch_cluster_state(adapter, cluster_id, remaining).await?;
    classify_cluster(&state, expected_worker_count)
}

async fn fetch_cluster_state(
    adapter: &dyn PlatformAdapter,
    cluster_id: &str,
    remaining: Duration,
) -> Option<ClusterState> {
    match adapter.get_cluster_state(cluster_id, remaining).await {
        Ok(state) => Some(state),
        Err(err) => {
            debug!(cluster_id, error = %err, "transient error polling cluster state");
            None
        }
    }
}

fn classify_cluster(state: &ClusterState, expected_worker_count: Option<u32>) -> Option<HealthOutcome> {
    match state.state {
        ClusterLifecycle::Running => {
            if let Some(reason) = &state.termination_reason {
                return Some(HealthOutcome::unhealthy(reason.clone()));
            }
            match expected_worker_count {
                Some(expected) if state.worker_count < expected => None,
                _ => Some(HealthOutcome::healthy()),
            }
        }
        ClusterLifecycle::Terminated => Some(HealthOutcome::unhealthy(
            state
                .termination_reason
                .clone()
                .unwrap_or_else(|| "terminated".to_string()),
        )),
        ClusterLifecycle::Restarting | ClusterLifecycle::Pending | ClusterLifecycle::Unknown => None,
    }
}

async fn poll_job_run(
    adapter: &dyn PlatformAdapter,
    run_id: &str,
    remaining: Duration,
) -> Option<HealthOutcome> {
    let state = match adapter.get_run_state(run_id, remaining).await {
        Ok(state) => state,
        Err(err) => {
            debug!(run_id, error = %err, "transient error polling run state");
            return None;
        }
    };
    classify_run(&state)
}

fn classify_run(state: &RunState) -> Option<HealthOutcome> {
    match state.life_cycle_state {
        RunLifecycle::Terminated => match state.result_state {
            Some(RunResult::Success) => Some(HealthOutcome::healthy()),
            Some(RunResult::Failed) | Some(RunResult::TimedOut) | Some(RunResult::Canceled) => {
                Some(HealthOutcome::unhealthy(
                    state.error.clone().unwrap_or_else(|| "run failed".to_string()),
                ))
            }
            None => Some(HealthOutcome::unhealthy("terminated without result state")),
        },
        RunLifecycle::Pending | RunLifecycle::Running => None,
    }
}

async fn poll_pipeline_run(
    adapter: &dyn PlatformAdapter,
    run_id: &str,
    remaining: Duration,
) -> Option<HealthOutcome> {
    let state = match adapter.get_pipeline_run_state(run_id, remaining).await {
        Ok(state) => state,
        Err(err) => {
            debug!(run_id, error = %err, "transient error polling pipeline run state");
            return None;
        }
    };
    classify_pipeline_run(&state)
}

fn classify_pipeline_run(state: &PipelineRunState) -> Option<HealthOutcome> {
    match state.status {
        PipelineRunStatus::Succeeded => Some(HealthOutcome::healthy()),
        PipelineRunStatus::Failed | PipelineRunStatus::Cancelled => Some(HealthOutcome::unhealthy(
            state
                .error
                .clone()
                .unwrap_or_else(|| "pipeline run failed".to_string()),
        )),
        PipelineRunStatus::InProgress => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_running_without_termination_is_healthy() {
        let state = ClusterState {
            state: ClusterLifecycle::Running,
            termination_reason: None,
            worker_count: 4,
        };
        assert_eq!(classify_cluster(&state, None), Some(HealthOutcome::healthy()));
    }

    #[test]
    fn cluster_below_expected_worker_count_keeps_polling() {
        let state = ClusterState {
            state: ClusterLifecycle::Running,
            termination_reason: None,
            worker_count: 4,
        };
        assert_eq!(classify_cluster(&state, Some(6)), None);
    }

    #[test]
    fn job_run_success_is_healthy() {
        let state = RunState {
            life_cycle_state: RunLifecycle::Terminated,
            result_state: Some(RunResult::Success),
            error: None,
        };
        assert_eq!(classify_run(&state), Some(HealthOutcome::healthy()));
    }

    #[test]
    fn job_run_failed_is_unhealthy() {
        let state = RunState {
            life_cycle_state: RunLifecycle::Terminated,
            result_state: Some(RunResult::Failed),
            error: Some("boom".to_string()),
        };
        let outcome = classify_run(&state).unwrap();
        assert!(!outcome.healthy);
    }

    #[test]
    fn job_run_still_running_keeps_polling() {
        let state = RunState {
            life_cycle_state: RunLifecycle::Running,
            result_state: None,
            error: None,
        };
        assert_eq!(classify_run(&state), None);
    }
}
