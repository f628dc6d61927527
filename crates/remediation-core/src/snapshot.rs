//! Snapshot Store (C5): invocation-scoped capture of pre-action resource state, used for a
//! best-effort rollback if the executor reaches a terminal failure after a mutating primary
//! action already succeeded.

use std::time::Duration;

use chrono::Utc;
use remediation_common::{AdapterError, Snapshot};
use serde_json::json;

use crate::adapter::PlatformAdapter;

/// Captures the state of the resource a playbook is about to mutate. Never shared across
/// invocations: the caller owns the returned `Snapshot` for the lifetime of one `Execute` call.
pub async fn capture(
    adapter: &dyn PlatformAdapter,
    resource_kind: &str,
    resource_id: &str,
    deadline: Duration,
) -> Result<Snapshot, AdapterError> {
    let state = match resource_kind {
        "cluster" => {
            let state = adapter.get_cluster_state(resource_id, deadline).await?;
            json!({ "worker_count": state.worker_count })
        }
        _ => json!({}),
    };

    Ok(Snapshot {
        resource_kind: resource_kind.to_string(),
        resource_id: resource_id.to_string(),
        captured_at: Utc::now(),
        state,
    })
}

/// Best-effort rollback from a previously captured snapshot. Failures here are logged by the
/// caller and attached to the original result as an annotation — they never mask the primary
/// outcome (spec §4.5 / §9).
pub async fn rollback(
    adapter: &dyn PlatformAdapter,
    snapshot: &Snapshot,
    deadline: Duration,
) -> Result<(), AdapterError> {
    match snapshot.resource_kind.as_str() {
        "cluster" => {
            let target_workers = snapshot
                .state
                .get("worker_count")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0) as u32;
            adapter
                .scale_cluster(&snapshot.resource_id, 0, target_workers, deadline)
                .await?;
            Ok(())
        }
        _ => Ok(()),
    }
}
