//! Startup configuration for the recovery orchestrator.
//!
//! Read once at process start: defaults embedded here, overridden by an optional TOML file,
//! overridden in turn by environment variables (see the knob table in the external interfaces
//! section of the specification). The resulting value is handed to the executor as a typed
//! service value, never consulted as an ambient singleton.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level remediation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationConfig {
    pub auto_remediation_enabled: bool,
    pub default_max_retries: u32,
    pub retry: RetryConfig,
    pub scaling: ScalingConfig,
    pub restart: RestartConfig,
    pub circuit_breaker: CircuitBreakerDefaults,
    pub health_check: HealthCheckConfig,
    pub action_flags: ActionFlags,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub base_delay_seconds: u64,
    pub max_delay_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    pub auto_scale_enabled: bool,
    pub max_cluster_workers: u32,
    pub scale_up_percentage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    pub auto_restart_enabled: bool,
    pub restart_timeout_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerDefaults {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    pub timeout_seconds: u64,
    pub job_completion_timeout_seconds: u64,
    pub poll_interval_seconds: u64,
}

/// Per-action feature flags (spec §6 / §9 open question 4): a disabled action short-circuits
/// to an immediate terminal failure without touching the circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionFlags {
    pub job_retry: bool,
    pub cluster_restart: bool,
    pub cluster_scaling: bool,
    pub library_fallback: bool,
    pub config_rollback: bool,
}

impl ActionFlags {
    pub fn is_enabled(&self, action: crate::types::ActionKind) -> bool {
        use crate::types::ActionKind::*;
        match action {
            RetryJob => self.job_retry,
            RestartCluster => self.cluster_restart,
            ScaleCluster => self.cluster_scaling,
            LibraryFallback => self.library_fallback,
            RollbackConfig => self.config_rollback,
            RerunPipeline | Noop => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            auto_remediation_enabled: true,
            default_max_retries: 3,
            retry: RetryConfig {
                base_delay_seconds: 2,
                max_delay_seconds: 60,
            },
            scaling: ScalingConfig {
                auto_scale_enabled: true,
                max_cluster_workers: 16,
                scale_up_percentage: 50,
            },
            restart: RestartConfig {
                auto_restart_enabled: true,
                restart_timeout_minutes: 10,
            },
            circuit_breaker: CircuitBreakerDefaults {
                enabled: true,
                failure_threshold: 3,
                timeout_seconds: 300,
            },
            health_check: HealthCheckConfig {
                enabled: true,
                timeout_seconds: 120,
                job_completion_timeout_seconds: 1800,
                poll_interval_seconds: 5,
            },
            action_flags: ActionFlags {
                job_retry: true,
                cluster_restart: true,
                cluster_scaling: true,
                library_fallback: true,
                config_rollback: true,
            },
            gateway: GatewayConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
            },
        }
    }
}

impl RemediationConfig {
    /// Load configuration from (in ascending priority) built-in defaults, an optional TOML
    /// file at `path`, and environment variables prefixed `REMEDIATION_` (double-underscore
    /// separated for nesting, e.g. `REMEDIATION_CIRCUIT_BREAKER__FAILURE_THRESHOLD`).
    ///
    /// The legacy flat knob names from the external-interfaces table (`AUTO_REMEDIATION_ENABLED`,
    /// `CIRCUIT_BREAKER_FAILURE_THRESHOLD`, ...) are also recognized as a convenience overlay so
    /// operators can carry existing environment setup forward unchanged.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&defaults).map_err(|e| Error::Configuration(e.to_string()))?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("REMEDIATION")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: RemediationConfig = builder
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        cfg.apply_legacy_env_overlay();
        Ok(cfg)
    }

    /// Applies the flat `AUTO_REMEDIATION_*`/`CIRCUIT_BREAKER_*`/`ENABLE_*` style environment
    /// knobs on top of whatever layered config produced, matching the naming the specification's
    /// configuration table uses verbatim.
    fn apply_legacy_env_overlay(&mut self) {
        use std::env;

        let bool_env = |key: &str| env::var(key).ok().map(|v| v == "true" || v == "1");
        let u32_env = |key: &str| env::var(key).ok().and_then(|v| v.parse::<u32>().ok());
        let u64_env = |key: &str| env::var(key).ok().and_then(|v| v.parse::<u64>().ok());

        if let Some(v) = bool_env("AUTO_REMEDIATION_ENABLED") {
            self.auto_remediation_enabled = v;
        }
        if let Some(v) = u32_env("AUTO_REMEDIATION_MAX_RETRIES") {
            self.default_max_retries = v;
        }
        if let Some(v) = u64_env("RETRY_BASE_DELAY_SECONDS") {
            self.retry.base_delay_seconds = v;
        }
        if let Some(v) = u64_env("RETRY_MAX_DELAY_SECONDS") {
            self.retry.max_delay_seconds = v;
        }
        if let Some(v) = bool_env("AUTO_SCALE_ENABLED") {
            self.scaling.auto_scale_enabled = v;
        }
        if let Some(v) = u32_env("MAX_CLUSTER_WORKERS") {
            self.scaling.max_cluster_workers = v;
        }
        if let Some(v) = u32_env("SCALE_UP_PERCENTAGE") {
            self.scaling.scale_up_percentage = v;
        }
        if let Some(v) = bool_env("AUTO_RESTART_ENABLED") {
            self.restart.auto_restart_enabled = v;
        }
        if let Some(v) = u64_env("RESTART_TIMEOUT_MINUTES") {
            self.restart.restart_timeout_minutes = v;
        }
        if let Some(v) = u32_env("CIRCUIT_BREAKER_FAILURE_THRESHOLD") {
            self.circuit_breaker.failure_threshold = v;
        }
        if let Some(v) = u64_env("CIRCUIT_BREAKER_TIMEOUT_SECONDS") {
            self.circuit_breaker.timeout_seconds = v;
        }
        if let Some(v) = bool_env("CIRCUIT_BREAKER_ENABLED") {
            self.circuit_breaker.enabled = v;
        }
        if let Some(v) = bool_env("HEALTH_CHECK_ENABLED") {
            self.health_check.enabled = v;
        }
        if let Some(v) = u64_env("HEALTH_CHECK_TIMEOUT_SECONDS") {
            self.health_check.timeout_seconds = v;
        }
        if let Some(v) = u64_env("JOB_COMPLETION_TIMEOUT_SECONDS") {
            self.health_check.job_completion_timeout_seconds = v;
        }
        if let Some(v) = bool_env("ENABLE_JOB_RETRY") {
            self.action_flags.job_retry = v;
        }
        if let Some(v) = bool_env("ENABLE_CLUSTER_RESTART") {
            self.action_flags.cluster_restart = v;
        }
        if let Some(v) = bool_env("ENABLE_CLUSTER_SCALING") {
            self.action_flags.cluster_scaling = v;
        }
        if let Some(v) = bool_env("ENABLE_LIBRARY_FALLBACK") {
            self.action_flags.library_fallback = v;
        }
        if let Some(v) = bool_env("ENABLE_CONFIG_ROLLBACK") {
            self.action_flags.config_rollback = v;
        }
    }
}
