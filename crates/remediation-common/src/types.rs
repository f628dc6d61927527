//! Domain types shared between the executor, adapters and operator surface.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A recovery action the executor can dispatch through a `PlatformAdapter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    RetryJob,
    RestartCluster,
    ScaleCluster,
    LibraryFallback,
    RerunPipeline,
    RollbackConfig,
    Noop,
}

impl ActionKind {
    /// The stable identifier recorded in `PlaybookExecutionResult::actions_taken`.
    pub fn identifier(&self) -> &'static str {
        match self {
            ActionKind::RetryJob => "retry_job",
            ActionKind::RestartCluster => "restart_cluster",
            ActionKind::ScaleCluster => "scale_cluster",
            ActionKind::LibraryFallback => "library_fallback",
            ActionKind::RerunPipeline => "rerun_pipeline",
            ActionKind::RollbackConfig => "rollback_config",
            ActionKind::Noop => "noop",
        }
    }
}

/// Immutable recovery policy for one `error_type`, registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookConfig {
    pub action: ActionKind,
    pub max_retries: u32,
    pub timeout_seconds: u64,
    pub fallback_action: Option<ActionKind>,
    pub chained_playbook: Option<String>,
    pub verify_health: bool,
    pub health_check_timeout: u64,
    pub snapshot_before: bool,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout: u64,
    #[serde(default)]
    pub action_params: HashMap<String, Value>,
    pub description: String,
}

impl PlaybookConfig {
    /// The read-only view handed out by `ListPlaybooks` on the operator surface.
    pub fn public_view(&self, error_type: &str) -> PlaybookPublicView {
        PlaybookPublicView {
            error_type: error_type.to_string(),
            action: self.action,
            max_retries: self.max_retries,
            fallback_action: self.fallback_action,
            chained_playbook: self.chained_playbook.clone(),
            verify_health: self.verify_health,
            circuit_breaker_threshold: self.circuit_breaker_threshold,
            circuit_breaker_timeout: self.circuit_breaker_timeout,
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybookPublicView {
    pub error_type: String,
    pub action: ActionKind,
    pub max_retries: u32,
    pub fallback_action: Option<ActionKind>,
    pub chained_playbook: Option<String>,
    pub verify_health: bool,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout: u64,
    pub description: String,
}

/// One invocation of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub error_type: String,
    pub ticket_id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RecoveryRequest {
    pub fn new(error_type: impl Into<String>, ticket_id: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            ticket_id: ticket_id.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The resource id the circuit-breaker key and health checks hinge on, selected per action.
    ///
    /// Falls back to `None` (the caller then degrades the breaker key to `"global"`) when the
    /// expected field is absent from `metadata`.
    pub fn primary_resource_id(&self, action: ActionKind) -> Option<&str> {
        let key = match action {
            ActionKind::RestartCluster | ActionKind::ScaleCluster | ActionKind::LibraryFallback => {
                "cluster_id"
            }
            ActionKind::RetryJob => "job_id",
            ActionKind::RerunPipeline => "pipeline_name",
            ActionKind::RollbackConfig | ActionKind::Noop => return self.metadata.get("resource_id").map(String::as_str),
        };
        self.metadata.get(key).map(String::as_str)
    }
}

/// Circuit breaker lifecycle state (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time snapshot of one breaker, as returned by the operator surface.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStatus {
    pub key: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub last_outcome_at: Option<DateTime<Utc>>,
}

/// Opaque, platform-specific resource state captured before a mutating action.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub resource_kind: String,
    pub resource_id: String,
    pub captured_at: DateTime<Utc>,
    pub state: Value,
}

/// Outcome of executing one playbook, possibly nested via `chained_result`.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybookExecutionResult {
    pub success: bool,
    pub message: String,
    pub actions_taken: Vec<String>,
    pub attempts: u32,
    pub health_check_passed: bool,
    pub fallback_invoked: bool,
    pub chained_result: Option<Box<PlaybookExecutionResult>>,
    pub circuit_breaker_status: Option<CircuitBreakerStatus>,
    pub execution_time_seconds: f64,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl PlaybookExecutionResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            actions_taken: Vec::new(),
            attempts: 0,
            health_check_passed: false,
            fallback_invoked: false,
            chained_result: None,
            circuit_breaker_status: None,
            execution_time_seconds: 0.0,
            metadata: HashMap::new(),
        }
    }
}
