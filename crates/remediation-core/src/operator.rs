//! Operator Surface (C7): read-only inspection of breakers and the registry, plus breaker
//! reset. Never mutates in-flight executions.

use remediation_common::{CircuitBreakerStatus, PlaybookPublicView};

use crate::executor::PlaybookExecutor;

/// Thin read/reset facade over the executor's breaker fabric and registry, handed to the
/// gateway crate for the HTTP operator endpoints.
pub struct OperatorSurface<'a> {
    executor: &'a PlaybookExecutor,
}

impl<'a> OperatorSurface<'a> {
    pub fn new(executor: &'a PlaybookExecutor) -> Self {
        Self { executor }
    }

    pub async fn list_breakers(&self) -> Vec<CircuitBreakerStatus> {
        self.executor.breaker().snapshot_all().await
    }

    /// Idempotent: resetting an already-closed breaker is a no-op observable result.
    pub async fn reset_breaker(&self, key: &str) {
        self.executor.breaker().reset(key).await;
    }

    pub fn list_playbooks(&self) -> Vec<PlaybookPublicView> {
        self.executor.registry().public_views()
    }
}
