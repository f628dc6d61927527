//! Circuit Breaker Fabric (C3): per-`(error_type, resource_id)` breakers with
//! CLOSED/OPEN/HALF_OPEN states and a TTL-bound transition back to HALF_OPEN.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use remediation_common::{BreakerState, CircuitBreakerStatus, PlaybookConfig};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone)]
struct BreakerEntry {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
    last_outcome_at: Option<DateTime<Utc>>,
    /// Set while a HALF_OPEN probe is outstanding, so a second concurrent caller for the
    /// same key is not also admitted as a probe.
    probe_in_flight: bool,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            last_outcome_at: None,
            probe_in_flight: false,
        }
    }
}

/// Thread-safe, per-key circuit breaker map. Breakers are created lazily on first reference and
/// are never destroyed except by explicit operator reset.
#[derive(Debug, Default)]
pub struct CircuitBreakerFabric {
    breakers: RwLock<HashMap<String, BreakerEntry>>,
}

/// Derive the circuit-breaker key for a request: `(error_type, resource_id)`, degrading to
/// `(error_type, "global")` when the expected resource id is absent from the request metadata.
pub fn derive_breaker_key(error_type: &str, resource_id: Option<&str>) -> String {
    format!("{error_type}:{}", resource_id.unwrap_or("global"))
}

impl CircuitBreakerFabric {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether a call for `key` is currently allowed, and the state it was evaluated under.
    /// A rejected call must never invoke the action adapter and must never record an outcome.
    pub async fn allow(&self, key: &str, config: &PlaybookConfig) -> (bool, BreakerState) {
        let mut breakers = self.breakers.write().await;
        let entry = breakers.entry(key.to_string()).or_default();

        match entry.state {
            BreakerState::Closed => (true, BreakerState::Closed),
            BreakerState::Open => {
                let elapsed = entry
                    .opened_at
                    .map(|opened| Utc::now().signed_duration_since(opened))
                    .unwrap_or_default();
                let timeout_elapsed = elapsed.num_seconds() >= config.circuit_breaker_timeout as i64;

                if timeout_elapsed && !entry.probe_in_flight {
                    info!(breaker_key = key, "circuit breaker transitioning to half-open");
                    entry.state = BreakerState::HalfOpen;
                    entry.probe_in_flight = true;
                    (true, BreakerState::HalfOpen)
                } else {
                    (false, BreakerState::Open)
                }
            }
            BreakerState::HalfOpen => {
                // Only the caller that already claimed the probe slot may proceed; this should
                // not be reachable for a second concurrent caller because `allow` claims the
                // slot atomically under the write lock, but is handled defensively.
                (!entry.probe_in_flight, BreakerState::HalfOpen)
            }
        }
    }

    pub async fn record_success(&self, key: &str) {
        let mut breakers = self.breakers.write().await;
        let entry = breakers.entry(key.to_string()).or_default();
        if entry.state != BreakerState::Closed {
            info!(breaker_key = key, "circuit breaker closing after success");
        }
        entry.state = BreakerState::Closed;
        entry.consecutive_failures = 0;
        entry.opened_at = None;
        entry.probe_in_flight = false;
        entry.last_outcome_at = Some(Utc::now());
    }

    pub async fn record_failure(&self, key: &str, config: &PlaybookConfig) {
        let mut breakers = self.breakers.write().await;
        let entry = breakers.entry(key.to_string()).or_default();

        entry.consecutive_failures += 1;
        entry.last_outcome_at = Some(Utc::now());
        entry.probe_in_flight = false;

        if entry.state == BreakerState::HalfOpen
            || entry.consecutive_failures >= config.circuit_breaker_threshold
        {
            warn!(
                breaker_key = key,
                failures = entry.consecutive_failures,
                "circuit breaker opening"
            );
            entry.state = BreakerState::Open;
            entry.opened_at = Some(Utc::now());
        }
    }

    /// Idempotent: any number of resets has the same effect as one.
    pub async fn reset(&self, key: &str) {
        let mut breakers = self.breakers.write().await;
        info!(breaker_key = key, "circuit breaker reset by operator");
        breakers.insert(key.to_string(), BreakerEntry::default());
    }

    pub async fn snapshot(&self, key: &str) -> CircuitBreakerStatus {
        let breakers = self.breakers.read().await;
        let entry = breakers.get(key).cloned().unwrap_or_default();
        to_status(key, &entry)
    }

    pub async fn snapshot_all(&self) -> Vec<CircuitBreakerStatus> {
        let breakers = self.breakers.read().await;
        breakers
            .iter()
            .map(|(key, entry)| to_status(key, entry))
            .collect()
    }
}

fn to_status(key: &str, entry: &BreakerEntry) -> CircuitBreakerStatus {
    CircuitBreakerStatus {
        key: key.to_string(),
        state: entry.state,
        consecutive_failures: entry.consecutive_failures,
        opened_at: entry.opened_at,
        last_outcome_at: entry.last_outcome_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remediation_common::ActionKind;
    use std::collections::HashMap;

    fn config(threshold: u32, timeout_seconds: u64) -> PlaybookConfig {
        PlaybookConfig {
            action: ActionKind::Noop,
            max_retries: 0,
            timeout_seconds: 1,
            fallback_action: None,
            chained_playbook: None,
            verify_health: false,
            health_check_timeout: 0,
            snapshot_before: false,
            circuit_breaker_threshold: threshold,
            circuit_breaker_timeout: timeout_seconds,
            action_params: HashMap::new(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn closed_allows_calls_and_resets_on_success() {
        let fabric = CircuitBreakerFabric::new();
        let cfg = config(2, 60);
        let (allowed, state) = fabric.allow("k", &cfg).await;
        assert!(allowed);
        assert_eq!(state, BreakerState::Closed);
        fabric.record_success("k").await;
        let status = fabric.snapshot("k").await;
        assert_eq!(status.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let fabric = CircuitBreakerFabric::new();
        let cfg = config(2, 60);
        fabric.record_failure("k", &cfg).await;
        let (allowed, _) = fabric.allow("k", &cfg).await;
        assert!(allowed);
        fabric.record_failure("k", &cfg).await;

        let (allowed, state) = fabric.allow("k", &cfg).await;
        assert!(!allowed);
        assert_eq!(state, BreakerState::Open);
    }

    #[tokio::test]
    async fn half_open_probe_closes_on_success() {
        let fabric = CircuitBreakerFabric::new();
        let cfg = config(1, 0); // zero timeout: immediately eligible for half-open
        fabric.record_failure("k", &cfg).await;

        let (allowed, state) = fabric.allow("k", &cfg).await;
        assert!(allowed);
        assert_eq!(state, BreakerState::HalfOpen);

        fabric.record_success("k").await;
        let status = fabric.snapshot("k").await;
        assert_eq!(status.state, BreakerState::Closed);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let fabric = CircuitBreakerFabric::new();
        let cfg = config(1, 60);
        fabric.record_failure("k", &cfg).await;
        fabric.reset("k").await;
        fabric.reset("k").await;
        let status = fabric.snapshot("k").await;
        assert_eq!(status.state, BreakerState::Closed);
        assert_eq!(status.consecutive_failures, 0);
    }
}
