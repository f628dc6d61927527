//! Playbook Executor (C6): the engine. Orchestrates breaker check -> snapshot -> action ->
//! retry -> health -> fallback -> chain, exactly as described in the component design.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use remediation_common::{
    AdapterError, ActionKind, BackoffPolicy, BreakerState, Error, PlaybookConfig,
    PlaybookExecutionResult, RecoveryRequest, RemediationConfig,
};
use serde_json::json;
use tracing::{info, info_span, warn, Instrument};

use crate::adapter::PlatformAdapter;
use crate::breaker::{derive_breaker_key, CircuitBreakerFabric};
use crate::health::{self, HealthTarget};
use crate::registry::PlaybookRegistry;
use crate::snapshot;

/// Maximum chained-playbook recursion depth (spec §9).
const MAX_CHAIN_DEPTH: usize = 3;

pub struct PlaybookExecutor {
    registry: Arc<PlaybookRegistry>,
    breaker: Arc<CircuitBreakerFabric>,
    adapters: HashMap<&'static str, Arc<dyn PlatformAdapter>>,
    config: RemediationConfig,
}

impl PlaybookExecutor {
    pub fn new(
        registry: Arc<PlaybookRegistry>,
        breaker: Arc<CircuitBreakerFabric>,
        adapters: HashMap<&'static str, Arc<dyn PlatformAdapter>>,
        config: RemediationConfig,
    ) -> Self {
        Self {
            registry,
            breaker,
            adapters,
            config,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreakerFabric> {
        &self.breaker
    }

    pub fn registry(&self) -> &Arc<PlaybookRegistry> {
        &self.registry
    }

    /// Execute a recovery request end to end.
    pub async fn execute(&self, request: &RecoveryRequest) -> PlaybookExecutionResult {
        if !self.config.auto_remediation_enabled {
            let mut result = PlaybookExecutionResult::failure("auto-remediation disabled");
            result.metadata.insert("skipped".to_string(), json!(true));
            return result;
        }

        let span = info_span!(
            "execute_playbook",
            ticket_id = %request.ticket_id,
            error_type = %request.error_type
        );
        let mut visited = HashSet::new();
        self.execute_inner(request, &mut visited, 0)
            .instrument(span)
            .await
    }

    fn execute_inner<'a>(
        &'a self,
        request: &'a RecoveryRequest,
        visited: &'a mut HashSet<String>,
        depth: usize,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = PlaybookExecutionResult> + Send + 'a>>
    {
        Box::pin(async move {
            let start = Instant::now();

            let Some(config) = self.registry.get(&request.error_type).cloned() else {
                return failure_from(Error::PlaybookNotFound(request.error_type.clone()));
            };

            if depth >= MAX_CHAIN_DEPTH || !visited.insert(request.error_type.clone()) {
                warn!(
                    error_type = %request.error_type,
                    depth,
                    "chain depth exceeded or cycle detected"
                );
                return PlaybookExecutionResult::failure(
                    "chained playbook depth exceeded or cycle detected",
                );
            }

            let resource_id = request.primary_resource_id(config.action).map(str::to_string);
            let key = derive_breaker_key(&request.error_type, resource_id.as_deref());

            let (allowed, state) = if self.config.circuit_breaker.enabled {
                self.breaker.allow(&key, &config).await
            } else {
                (true, BreakerState::Closed)
            };
            if !allowed {
                let mut result = failure_from(Error::CircuitOpen { key: key.clone() });
                result.circuit_breaker_status = Some(self.breaker.snapshot(&key).await);
                info!(breaker_key = %key, ?state, "request blocked by open circuit breaker");
                return result;
            }

            if !self.action_enabled(&config) {
                // Operator decision, not a system outcome: no breaker failure is recorded.
                let mut result = failure_from(Error::ActionDisabled {
                    action: config.action.identifier().to_string(),
                });
                result.circuit_breaker_status = Some(self.breaker.snapshot(&key).await);
                result.execution_time_seconds = start.elapsed().as_secs_f64();
                return result;
            }

            let snapshot = if config.snapshot_before {
                match self.capture_snapshot(&config, request, resource_id.as_deref()).await {
                    Ok(snap) => Some(snap),
                    Err(err) => {
                        warn!(error = %err, "failed to capture pre-action snapshot, proceeding without rollback capability");
                        None
                    }
                }
            } else {
                None
            };

            let mut result = self
                .run_primary_with_fallback(&config, request, resource_id.as_deref())
                .await;

            if result.success {
                if self.config.circuit_breaker.enabled {
                    self.breaker.record_success(&key).await;
                }

                if let Some(chained_error_type) = &config.chained_playbook {
                    let chained_request = RecoveryRequest {
                        error_type: chained_error_type.clone(),
                        ticket_id: request.ticket_id.clone(),
                        metadata: request.metadata.clone(),
                    };
                    let chained = self
                        .execute_inner(&chained_request, visited, depth + 1)
                        .await;
                    result.success = result.success && chained.success;
                    result.chained_result = Some(Box::new(chained));
                }
            } else {
                if self.config.circuit_breaker.enabled {
                    self.breaker.record_failure(&key, &config).await;
                }

                if let (Some(snap), Some(resource_id)) = (&snapshot, resource_id.as_deref()) {
                    if let Some(adapter) = self.adapter_for(config.action) {
                        let deadline = Duration::from_secs(config.timeout_seconds);
                        if let Err(err) = snapshot::rollback(adapter.as_ref(), snap, deadline).await {
                            let wrapped = Error::RollbackFailed {
                                resource_id: resource_id.to_string(),
                                reason: err.to_string(),
                            };
                            warn!(resource_id, error = %wrapped, "rollback failed");
                            result
                                .metadata
                                .insert("rollback_error".to_string(), json!(wrapped.to_string()));
                            result
                                .metadata
                                .insert("rollback_error_category".to_string(), json!(wrapped.category()));
                        }
                    }
                }
            }

            result.circuit_breaker_status = Some(self.breaker.snapshot(&key).await);
            result.execution_time_seconds = start.elapsed().as_secs_f64();
            result
        })
    }

    /// Whether `config.action` may run at all: the per-action operator flag, ANDed with the
    /// coarser global scaling/restart toggles that gate those two action kinds specifically.
    fn action_enabled(&self, config: &PlaybookConfig) -> bool {
        if !self.config.action_flags.is_enabled(config.action) {
            return false;
        }
        match config.action {
            ActionKind::ScaleCluster => self.config.scaling.auto_scale_enabled,
            ActionKind::RestartCluster => self.config.restart.auto_restart_enabled,
            _ => true,
        }
    }

    async fn capture_snapshot(
        &self,
        config: &PlaybookConfig,
        _request: &RecoveryRequest,
        resource_id: Option<&str>,
    ) -> Result<remediation_common::Snapshot, AdapterError> {
        let resource_id = resource_id.ok_or_else(|| AdapterError::permanent("missing resource id for snapshot"))?;
        let adapter = self
            .adapter_for(config.action)
            .ok_or_else(|| AdapterError::permanent("no adapter registered for action"))?;
        let kind = resource_kind_for(config.action);
        let deadline = Duration::from_secs(config.timeout_seconds);
        snapshot::capture(adapter.as_ref(), kind, resource_id, deadline).await
    }

    /// Runs the primary attempt loop, then (on exhaustion) the single fallback attempt.
    async fn run_primary_with_fallback(
        &self,
        config: &PlaybookConfig,
        request: &RecoveryRequest,
        resource_id: Option<&str>,
    ) -> PlaybookExecutionResult {
        let backoff = BackoffPolicy::new(
            Duration::from_secs(self.config.retry.base_delay_seconds),
            Duration::from_secs(self.config.retry.max_delay_seconds),
        );
        let verify_health = config.verify_health && self.config.health_check.enabled;
        let max_retries = config.max_retries.min(self.config.default_max_retries);

        let mut actions_taken = Vec::new();
        let mut attempts = 0u32;
        let mut health_check_passed = false;
        let mut metadata = HashMap::new();
        let mut last_error: Option<Error> = None;
        let mut primary_success = false;

        for attempt in 1..=(max_retries + 1) {
            attempts = attempt;
            actions_taken.push(config.action.identifier().to_string());

            match self
                .try_action(config, request, config.action, resource_id)
                .await
            {
                Ok((new_resource_id, attempt_metadata)) => {
                    let expected_worker_count = new_worker_count(&attempt_metadata);
                    metadata.extend(attempt_metadata);
                    if verify_health {
                        let outcome = self
                            .verify(
                                config.action,
                                new_resource_id.as_deref(),
                                expected_worker_count,
                                config.health_check_timeout,
                            )
                            .await;
                        if outcome.healthy {
                            health_check_passed = true;
                            primary_success = true;
                            break;
                        }
                        last_error = Some(health_error(
                            new_resource_id.as_deref(),
                            config.health_check_timeout,
                            &outcome,
                        ));
                    } else {
                        health_check_passed = false;
                        primary_success = true;
                        break;
                    }
                }
                Err(err) => {
                    let wrapped = Error::Adapter(err);
                    let retryable = wrapped.is_retryable();
                    last_error = Some(wrapped);
                    if !retryable {
                        break;
                    }
                }
            }

            if attempt <= max_retries {
                tokio::time::sleep(backoff.delay_for_attempt(attempt)).await;
            }
        }

        if primary_success {
            return PlaybookExecutionResult {
                success: true,
                message: "primary action succeeded".to_string(),
                actions_taken,
                attempts,
                health_check_passed,
                fallback_invoked: false,
                chained_result: None,
                circuit_breaker_status: None,
                execution_time_seconds: 0.0,
                metadata,
            };
        }

        let primary_failure = finalize_error(config.action, last_error);

        let Some(fallback_action) = config.fallback_action else {
            let message = primary_failure
                .as_ref()
                .map(Error::to_string)
                .unwrap_or_else(|| "primary action failed".to_string());
            let mut result = PlaybookExecutionResult {
                success: false,
                message,
                actions_taken,
                attempts,
                health_check_passed: false,
                fallback_invoked: false,
                chained_result: None,
                circuit_breaker_status: None,
                execution_time_seconds: 0.0,
                metadata,
            };
            if let Some(err) = &primary_failure {
                result
                    .metadata
                    .insert("error_category".to_string(), json!(err.category()));
            }
            return result;
        };

        actions_taken.push(fallback_action.identifier().to_string());

        match self
            .try_action(config, request, fallback_action, resource_id)
            .await
        {
            Ok((new_resource_id, attempt_metadata)) => {
                let expected_worker_count = new_worker_count(&attempt_metadata);
                metadata.extend(attempt_metadata);
                let fallback_health = if verify_health {
                    self.verify(
                        fallback_action,
                        new_resource_id.as_deref(),
                        expected_worker_count,
                        config.health_check_timeout,
                    )
                    .await
                } else {
                    health::HealthOutcome {
                        healthy: true,
                        reason: "health check disabled".to_string(),
                    }
                };

                let mut result = if fallback_health.healthy {
                    PlaybookExecutionResult {
                        success: true,
                        message: "fallback action succeeded".to_string(),
                        actions_taken,
                        attempts,
                        health_check_passed: true,
                        fallback_invoked: true,
                        chained_result: None,
                        circuit_breaker_status: None,
                        execution_time_seconds: 0.0,
                        metadata,
                    }
                } else {
                    let err = health_error(
                        new_resource_id.as_deref(),
                        config.health_check_timeout,
                        &fallback_health,
                    );
                    let message = err.to_string();
                    let mut result = PlaybookExecutionResult {
                        success: false,
                        message,
                        actions_taken,
                        attempts,
                        health_check_passed: false,
                        fallback_invoked: true,
                        chained_result: None,
                        circuit_breaker_status: None,
                        execution_time_seconds: 0.0,
                        metadata,
                    };
                    result
                        .metadata
                        .insert("error_category".to_string(), json!(err.category()));
                    result
                };
                result
            }
            Err(err) => {
                let wrapped = Error::ActionFailed {
                    action: fallback_action.identifier().to_string(),
                    kind: err.kind,
                };
                let mut result = PlaybookExecutionResult {
                    success: false,
                    message: wrapped.to_string(),
                    actions_taken,
                    attempts,
                    health_check_passed: false,
                    fallback_invoked: true,
                    chained_result: None,
                    circuit_breaker_status: None,
                    execution_time_seconds: 0.0,
                    metadata,
                };
                result
                    .metadata
                    .insert("error_category".to_string(), json!(wrapped.category()));
                result
            }
        }
    }

    async fn verify(
        &self,
        action: ActionKind,
        resource_id: Option<&str>,
        expected_worker_count: Option<u32>,
        timeout_seconds: u64,
    ) -> health::HealthOutcome {
        let Some(adapter) = self.adapter_for(action) else {
            return health::HealthOutcome {
                healthy: false,
                reason: "no adapter registered for action".to_string(),
            };
        };
        let Some(target) = self.health_target(action, resource_id, expected_worker_count) else {
            return health::HealthOutcome {
                healthy: true,
                reason: "no health-checkable resource for this action".to_string(),
            };
        };

        let timeout = timeout_seconds.min(self.health_timeout_cap(action));
        health::verify_health(
            adapter.as_ref(),
            target,
            Duration::from_secs(timeout),
            Duration::from_secs(self.config.health_check.poll_interval_seconds),
        )
        .await
    }

    /// The global cap on health-check duration for `action`'s resource kind: job/pipeline runs
    /// are capped by `job_completion_timeout_seconds`, cluster-oriented actions by
    /// `timeout_seconds`.
    fn health_timeout_cap(&self, action: ActionKind) -> u64 {
        match action {
            ActionKind::RetryJob | ActionKind::RerunPipeline => {
                self.config.health_check.job_completion_timeout_seconds
            }
            _ => self.config.health_check.timeout_seconds,
        }
    }

    fn health_target<'a>(
        &self,
        action: ActionKind,
        resource_id: Option<&'a str>,
        expected_worker_count: Option<u32>,
    ) -> Option<HealthTarget<'a>> {
        let resource_id = resource_id?;
        Some(match action {
            ActionKind::RestartCluster => HealthTarget::Cluster {
                cluster_id: resource_id,
                expected_worker_count: None,
            },
            ActionKind::ScaleCluster => HealthTarget::Cluster {
                cluster_id: resource_id,
                expected_worker_count,
            },
            ActionKind::RetryJob => HealthTarget::JobRun { run_id: resource_id },
            ActionKind::RerunPipeline => HealthTarget::PipelineRun { run_id: resource_id },
            ActionKind::LibraryFallback | ActionKind::RollbackConfig | ActionKind::Noop => return None,
        })
    }

    async fn try_action(
        &self,
        config: &PlaybookConfig,
        request: &RecoveryRequest,
        action: ActionKind,
        resource_id: Option<&str>,
    ) -> Result<(Option<String>, HashMap<String, serde_json::Value>), AdapterError> {
        let Some(adapter) = self.adapter_for(action) else {
            return Err(AdapterError::permanent("no adapter registered for action"));
        };
        let deadline = Duration::from_secs(config.timeout_seconds);
        let mut metadata = HashMap::new();

        match action {
            ActionKind::RetryJob => {
                let job_id = request
                    .metadata
                    .get("job_id")
                    .ok_or_else(|| AdapterError::permanent("missing job_id"))?;
                let run_id = request
                    .metadata
                    .get("run_id")
                    .ok_or_else(|| AdapterError::permanent("missing run_id"))?;
                let new_run_id = adapter.retry_job(job_id, run_id, deadline).await?;
                metadata.insert("new_run_id".to_string(), json!(new_run_id.clone()));
                Ok((Some(new_run_id), metadata))
            }
            ActionKind::RestartCluster => {
                let cluster_id = resource_id.ok_or_else(|| AdapterError::permanent("missing cluster_id"))?;
                let deadline = deadline.min(Duration::from_secs(
                    self.config.restart.restart_timeout_minutes * 60,
                ));
                adapter.restart_cluster(cluster_id, deadline).await?;
                Ok((Some(cluster_id.to_string()), metadata))
            }
            ActionKind::ScaleCluster => {
                let cluster_id = resource_id.ok_or_else(|| AdapterError::permanent("missing cluster_id"))?;
                let delta_percent = crate::adapter::param_u32(
                    &config.action_params,
                    "delta_percent",
                    self.config.scaling.scale_up_percentage,
                );
                let cap = crate::adapter::param_u32(
                    &config.action_params,
                    "cap",
                    self.config.scaling.max_cluster_workers,
                );
                let new_count = adapter.scale_cluster(cluster_id, delta_percent, cap, deadline).await?;
                metadata.insert("new_worker_count".to_string(), json!(new_count));
                Ok((Some(cluster_id.to_string()), metadata))
            }
            ActionKind::LibraryFallback => {
                let cluster_id = resource_id.ok_or_else(|| AdapterError::permanent("missing cluster_id"))?;
                let library_name = request
                    .metadata
                    .get("library_name")
                    .ok_or_else(|| AdapterError::permanent("missing library_name"))?;
                let candidates = crate::adapter::param_str_vec(&config.action_params, "candidate_versions");
                let installed = adapter
                    .library_fallback(cluster_id, library_name, &candidates, deadline)
                    .await?;
                metadata.insert("installed_version".to_string(), json!(installed));
                Ok((Some(cluster_id.to_string()), metadata))
            }
            ActionKind::RerunPipeline => {
                let pipeline_name = resource_id.ok_or_else(|| AdapterError::permanent("missing pipeline_name"))?;
                let factory_name = request
                    .metadata
                    .get("factory_name")
                    .ok_or_else(|| AdapterError::permanent("missing factory_name"))?;
                let resource_group = request
                    .metadata
                    .get("resource_group")
                    .ok_or_else(|| AdapterError::permanent("missing resource_group"))?;
                let new_run_id = adapter
                    .rerun_pipeline(pipeline_name, factory_name, resource_group, deadline)
                    .await?;
                metadata.insert("new_run_id".to_string(), json!(new_run_id.clone()));
                Ok((Some(new_run_id), metadata))
            }
            ActionKind::RollbackConfig | ActionKind::Noop => Ok((None, metadata)),
        }
    }

    fn adapter_for(&self, action: ActionKind) -> Option<Arc<dyn PlatformAdapter>> {
        let platform = match action {
            ActionKind::RerunPipeline => "adf",
            _ => "databricks",
        };
        self.adapters.get(platform).cloned()
    }
}

/// Pulls the `new_worker_count` a `scale_cluster` attempt reported, so the subsequent health
/// check can wait for the cluster to actually reach it instead of just "running".
fn new_worker_count(attempt_metadata: &HashMap<String, serde_json::Value>) -> Option<u32> {
    attempt_metadata
        .get("new_worker_count")
        .and_then(serde_json::Value::as_u64)
        .map(|v| v as u32)
}

fn health_error(resource_id: Option<&str>, timeout_seconds: u64, outcome: &health::HealthOutcome) -> Error {
    let resource_id = resource_id.unwrap_or("unknown").to_string();
    if outcome.reason == "timeout" {
        Error::HealthCheckTimeout {
            resource_id,
            elapsed_seconds: timeout_seconds,
        }
    } else {
        Error::HealthCheckFailed {
            resource_id,
            reason: outcome.reason.clone(),
        }
    }
}

/// Narrows a generic `Error::Adapter` down to the more specific `ActionFailed` once the primary
/// loop has given up for good (as opposed to a single retryable attempt within the loop).
fn finalize_error(action: ActionKind, err: Option<Error>) -> Option<Error> {
    err.map(|e| match e {
        Error::Adapter(ae) => Error::ActionFailed {
            action: action.identifier().to_string(),
            kind: ae.kind,
        },
        other => other,
    })
}

fn failure_from(err: Error) -> PlaybookExecutionResult {
    let mut result = PlaybookExecutionResult::failure(err.to_string());
    result
        .metadata
        .insert("error_category".to_string(), json!(err.category()));
    result
}

fn resource_kind_for(action: ActionKind) -> &'static str {
    match action {
        ActionKind::RestartCluster | ActionKind::ScaleCluster | ActionKind::LibraryFallback => "cluster",
        ActionKind::RetryJob => "job_run",
        ActionKind::RerunPipeline => "pipeline_run",
        ActionKind::RollbackConfig | ActionKind::Noop => "none",
    }
}
