//! Declarative built-in playbook table (spec §4.1: "the table itself is data, not code").
//!
//! These are the defaults shipped with the binary. Operators may supersede individual entries
//! by constructing a `PlaybookRegistry` from their own table (e.g. loaded from a platform-owned
//! playbook file) instead of calling `with_builtin_defaults`.

use std::collections::HashMap;

use remediation_common::{ActionKind, PlaybookConfig};

pub fn default_playbooks() -> HashMap<String, PlaybookConfig> {
    let mut table = HashMap::new();

    table.insert(
        "DatabricksJobExecutionError".to_string(),
        PlaybookConfig {
            action: ActionKind::RetryJob,
            max_retries: 3,
            timeout_seconds: 300,
            fallback_action: Some(ActionKind::ScaleCluster),
            chained_playbook: None,
            verify_health: true,
            health_check_timeout: 120,
            snapshot_before: false,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: 300,
            action_params: HashMap::new(),
            description: "Retry a failed Databricks job run, falling back to scaling the cluster".to_string(),
        },
    );

    table.insert(
        "DatabricksClusterUnreachableError".to_string(),
        PlaybookConfig {
            action: ActionKind::RestartCluster,
            max_retries: 1,
            timeout_seconds: 180,
            fallback_action: None,
            chained_playbook: None,
            verify_health: true,
            health_check_timeout: 600,
            snapshot_before: true,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: 600,
            action_params: HashMap::new(),
            description: "Restart an unreachable Databricks cluster".to_string(),
        },
    );

    table.insert(
        "DatabricksOutOfMemoryError".to_string(),
        PlaybookConfig {
            action: ActionKind::ScaleCluster,
            max_retries: 1,
            timeout_seconds: 180,
            fallback_action: None,
            chained_playbook: Some("DatabricksJobExecutionError".to_string()),
            verify_health: true,
            health_check_timeout: 300,
            snapshot_before: true,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: 300,
            action_params: HashMap::new(),
            description: "Scale up the cluster and re-run the job that ran out of memory".to_string(),
        },
    );

    table.insert(
        "DatabricksLibraryConflictError".to_string(),
        PlaybookConfig {
            action: ActionKind::LibraryFallback,
            max_retries: 0,
            timeout_seconds: 300,
            fallback_action: None,
            chained_playbook: None,
            verify_health: false,
            health_check_timeout: 0,
            snapshot_before: true,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: 300,
            action_params: HashMap::new(),
            description: "Fall back to an earlier compatible library version".to_string(),
        },
    );

    table.insert(
        "AdfPipelineExecutionError".to_string(),
        PlaybookConfig {
            action: ActionKind::RerunPipeline,
            max_retries: 2,
            timeout_seconds: 300,
            fallback_action: None,
            chained_playbook: None,
            verify_health: true,
            health_check_timeout: 900,
            snapshot_before: false,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: 300,
            action_params: HashMap::new(),
            description: "Re-run a failed Azure Data Factory pipeline run".to_string(),
        },
    );

    table
}
