//! End-to-end exercises of the playbook executor against a scripted adapter, covering the
//! concrete retry/fallback/chain/circuit-breaker scenarios the orchestrator must handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use remediation_adapters::ScriptedAdapter;
use remediation_common::{
    ActionKind, AdapterError, HealthCheckConfig, PlaybookConfig, RecoveryRequest, RemediationConfig,
    RetryConfig,
};
use remediation_core::{
    ClusterLifecycle, ClusterState, PlatformAdapter, PlaybookExecutor, PlaybookRegistry,
    RunLifecycle, RunResult, RunState,
};
use serde_json::json;

fn fast_config() -> RemediationConfig {
    RemediationConfig {
        retry: RetryConfig {
            base_delay_seconds: 0,
            max_delay_seconds: 0,
        },
        health_check: HealthCheckConfig {
            poll_interval_seconds: 1,
            ..RemediationConfig::default().health_check
        },
        ..RemediationConfig::default()
    }
}

fn executor(registry: HashMap<String, PlaybookConfig>, adapter: Arc<ScriptedAdapter>) -> PlaybookExecutor {
    let mut adapters: HashMap<&'static str, Arc<dyn PlatformAdapter>> = HashMap::new();
    adapters.insert("databricks", adapter as Arc<dyn PlatformAdapter>);
    PlaybookExecutor::new(
        Arc::new(PlaybookRegistry::new(registry)),
        remediation_core::CircuitBreakerFabric::new(),
        adapters,
        fast_config(),
    )
}

fn running_cluster(worker_count: u32) -> ClusterState {
    ClusterState {
        state: ClusterLifecycle::Running,
        termination_reason: None,
        worker_count,
    }
}

fn successful_run() -> RunState {
    RunState {
        life_cycle_state: RunLifecycle::Terminated,
        result_state: Some(RunResult::Success),
        error: None,
    }
}

#[tokio::test]
async fn s1_happy_retry_succeeds_on_first_attempt() {
    let adapter = Arc::new(ScriptedAdapter::new("databricks"));
    adapter.push_retry_job(Ok("R2".to_string()));
    adapter.push_run_state(Ok(successful_run()));

    let mut registry = HashMap::new();
    registry.insert(
        "DatabricksJobExecutionError".to_string(),
        PlaybookConfig {
            action: ActionKind::RetryJob,
            max_retries: 3,
            timeout_seconds: 60,
            fallback_action: Some(ActionKind::ScaleCluster),
            chained_playbook: None,
            verify_health: true,
            health_check_timeout: 5,
            snapshot_before: false,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: 300,
            action_params: HashMap::new(),
            description: String::new(),
        },
    );

    let executor = executor(registry, adapter);
    let request = RecoveryRequest::new("DatabricksJobExecutionError", "T1")
        .with_metadata("job_id", "J")
        .with_metadata("run_id", "R");

    let result = executor.execute(&request).await;

    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.actions_taken, vec!["retry_job"]);
    assert!(!result.fallback_invoked);
    assert_eq!(result.metadata.get("new_run_id"), Some(&json!("R2")));
    let breaker = result.circuit_breaker_status.unwrap();
    assert_eq!(breaker.consecutive_failures, 0);
}

#[tokio::test]
async fn s2_primary_exhausts_fallback_succeeds() {
    let adapter = Arc::new(ScriptedAdapter::new("databricks"));
    for _ in 0..4 {
        adapter.push_retry_job(Err(AdapterError::transient("job still failing")));
    }
    adapter.push_scale_cluster(Ok(6));
    adapter.push_cluster_state(Ok(running_cluster(6)));

    let mut registry = HashMap::new();
    registry.insert(
        "DatabricksJobExecutionError".to_string(),
        PlaybookConfig {
            action: ActionKind::RetryJob,
            max_retries: 3,
            timeout_seconds: 60,
            fallback_action: Some(ActionKind::ScaleCluster),
            chained_playbook: None,
            verify_health: true,
            health_check_timeout: 5,
            snapshot_before: false,
            circuit_breaker_threshold: 10,
            circuit_breaker_timeout: 300,
            action_params: HashMap::new(),
            description: String::new(),
        },
    );

    let executor = executor(registry, adapter);
    let request = RecoveryRequest::new("DatabricksJobExecutionError", "T2")
        .with_metadata("job_id", "J")
        .with_metadata("run_id", "R");

    let result = executor.execute(&request).await;

    assert!(result.success);
    assert_eq!(result.attempts, 4);
    assert!(result.fallback_invoked);
    assert_eq!(
        result.actions_taken,
        vec!["retry_job", "retry_job", "retry_job", "retry_job", "scale_cluster"]
    );
}

#[tokio::test]
async fn s3_circuit_opens_then_recovers() {
    let adapter = Arc::new(ScriptedAdapter::new("databricks"));
    adapter.push_retry_job(Err(AdapterError::permanent("boom 1")));
    adapter.push_retry_job(Err(AdapterError::permanent("boom 2")));
    adapter.push_retry_job(Ok("R2".to_string()));

    let mut registry = HashMap::new();
    registry.insert(
        "DatabricksJobExecutionError".to_string(),
        PlaybookConfig {
            action: ActionKind::RetryJob,
            max_retries: 0,
            timeout_seconds: 60,
            fallback_action: None,
            chained_playbook: None,
            verify_health: false,
            health_check_timeout: 5,
            snapshot_before: false,
            circuit_breaker_threshold: 2,
            circuit_breaker_timeout: 1,
            action_params: HashMap::new(),
            description: String::new(),
        },
    );

    let executor = executor(registry, adapter.clone());
    let request = RecoveryRequest::new("DatabricksJobExecutionError", "T3")
        .with_metadata("job_id", "J")
        .with_metadata("run_id", "R");

    let first = executor.execute(&request).await;
    assert!(!first.success);
    assert_eq!(first.circuit_breaker_status.unwrap().consecutive_failures, 1);

    let second = executor.execute(&request).await;
    assert!(!second.success);
    assert_eq!(second.circuit_breaker_status.unwrap().consecutive_failures, 2);

    let blocked = executor.execute(&request).await;
    assert!(!blocked.success);
    assert!(blocked.message.starts_with("circuit breaker open"));
    assert_eq!(adapter.call_count(), 2, "a blocked call must never reach the adapter");

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let recovered = executor.execute(&request).await;
    assert!(recovered.success);
    let breaker = recovered.circuit_breaker_status.unwrap();
    assert_eq!(breaker.consecutive_failures, 0);
}

#[tokio::test]
async fn s4_scale_chain_retries_job_after_scaling() {
    let adapter = Arc::new(ScriptedAdapter::new("databricks"));
    adapter.push_scale_cluster(Ok(6));
    adapter.push_cluster_state(Ok(running_cluster(6)));
    adapter.push_retry_job(Ok("R2".to_string()));
    adapter.push_run_state(Ok(successful_run()));

    let mut registry = HashMap::new();
    registry.insert(
        "DatabricksOutOfMemoryError".to_string(),
        PlaybookConfig {
            action: ActionKind::ScaleCluster,
            max_retries: 0,
            timeout_seconds: 60,
            fallback_action: None,
            chained_playbook: Some("DatabricksJobExecutionError".to_string()),
            verify_health: true,
            health_check_timeout: 5,
            snapshot_before: false,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: 300,
            action_params: HashMap::new(),
            description: String::new(),
        },
    );
    registry.insert(
        "DatabricksJobExecutionError".to_string(),
        PlaybookConfig {
            action: ActionKind::RetryJob,
            max_retries: 0,
            timeout_seconds: 60,
            fallback_action: None,
            chained_playbook: None,
            verify_health: true,
            health_check_timeout: 5,
            snapshot_before: false,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: 300,
            action_params: HashMap::new(),
            description: String::new(),
        },
    );

    let executor = executor(registry, adapter);
    let request = RecoveryRequest::new("DatabricksOutOfMemoryError", "T4")
        .with_metadata("cluster_id", "C1")
        .with_metadata("job_id", "J1")
        .with_metadata("run_id", "R1");

    let result = executor.execute(&request).await;

    assert!(result.success);
    assert_eq!(result.actions_taken, vec!["scale_cluster"]);
    let chained = result.chained_result.expect("chained playbook must have run");
    assert!(chained.success);
    assert_eq!(chained.actions_taken, vec!["retry_job"]);
}

#[tokio::test]
async fn s5_library_fallback_exhausts_candidates() {
    let adapter = Arc::new(ScriptedAdapter::new("databricks"));
    adapter.push_library_fallback(Err(AdapterError::permanent(
        "no candidate version of 'numpy' was accepted",
    )));

    let mut registry = HashMap::new();
    let mut action_params = HashMap::new();
    action_params.insert(
        "candidate_versions".to_string(),
        json!(["2.1.0", "2.0.3", "1.5.3"]),
    );
    registry.insert(
        "DatabricksLibraryConflictError".to_string(),
        PlaybookConfig {
            action: ActionKind::LibraryFallback,
            max_retries: 0,
            timeout_seconds: 60,
            fallback_action: None,
            chained_playbook: None,
            verify_health: false,
            health_check_timeout: 0,
            snapshot_before: false,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: 300,
            action_params,
            description: String::new(),
        },
    );

    let executor = executor(registry, adapter);
    let request = RecoveryRequest::new("DatabricksLibraryConflictError", "T5")
        .with_metadata("cluster_id", "C1")
        .with_metadata("library_name", "numpy");

    let result = executor.execute(&request).await;

    assert!(!result.success);
    assert_eq!(result.actions_taken, vec!["library_fallback"]);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.circuit_breaker_status.unwrap().consecutive_failures, 1);
}

#[tokio::test]
async fn s6_health_check_times_out_after_acknowledged_restart() {
    let adapter = Arc::new(ScriptedAdapter::new("databricks"));
    for _ in 0..2 {
        adapter.push_restart_cluster(Ok(()));
        adapter.push_cluster_state(Ok(ClusterState {
            state: ClusterLifecycle::Restarting,
            termination_reason: None,
            worker_count: 4,
        }));
    }

    let mut registry = HashMap::new();
    registry.insert(
        "DatabricksClusterUnreachableError".to_string(),
        PlaybookConfig {
            action: ActionKind::RestartCluster,
            max_retries: 1,
            timeout_seconds: 60,
            fallback_action: None,
            chained_playbook: None,
            verify_health: true,
            health_check_timeout: 1,
            snapshot_before: false,
            circuit_breaker_threshold: 10,
            circuit_breaker_timeout: 300,
            action_params: HashMap::new(),
            description: String::new(),
        },
    );

    let executor = executor(registry, adapter);
    let request = RecoveryRequest::new("DatabricksClusterUnreachableError", "T6")
        .with_metadata("cluster_id", "C1");

    let result = executor.execute(&request).await;

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.actions_taken, vec!["restart_cluster", "restart_cluster"]);
    assert!(!result.health_check_passed);
}

/// An unknown `error_type` resolves to an immediate terminal failure, never reaching an adapter.
#[tokio::test]
async fn unknown_error_type_fails_without_touching_adapter() {
    let adapter = Arc::new(ScriptedAdapter::new("databricks"));
    let executor = executor(HashMap::new(), adapter.clone());
    let request = RecoveryRequest::new("SomeUnregisteredError", "T7");

    let result = executor.execute(&request).await;

    assert!(!result.success);
    assert_eq!(adapter.call_count(), 0);
}

/// A disabled action fails immediately without ever recording a circuit breaker outcome.
#[tokio::test]
async fn disabled_action_short_circuits_without_recording_breaker_outcome() {
    let adapter = Arc::new(ScriptedAdapter::new("databricks"));
    let mut registry = HashMap::new();
    registry.insert(
        "DatabricksJobExecutionError".to_string(),
        PlaybookConfig {
            action: ActionKind::RetryJob,
            max_retries: 3,
            timeout_seconds: 60,
            fallback_action: None,
            chained_playbook: None,
            verify_health: false,
            health_check_timeout: 0,
            snapshot_before: false,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: 300,
            action_params: HashMap::new(),
            description: String::new(),
        },
    );

    let mut config = fast_config();
    config.action_flags.job_retry = false;

    let mut adapters: HashMap<&'static str, Arc<dyn PlatformAdapter>> = HashMap::new();
    adapters.insert("databricks", adapter.clone() as Arc<dyn PlatformAdapter>);
    let executor = PlaybookExecutor::new(
        Arc::new(PlaybookRegistry::new(registry)),
        remediation_core::CircuitBreakerFabric::new(),
        adapters,
        config,
    );

    let request = RecoveryRequest::new("DatabricksJobExecutionError", "T8")
        .with_metadata("job_id", "J")
        .with_metadata("run_id", "R");

    let result = executor.execute(&request).await;

    assert!(!result.success);
    assert_eq!(adapter.call_count(), 0);
    assert_eq!(result.circuit_breaker_status.unwrap().consecutive_failures, 0);
}
