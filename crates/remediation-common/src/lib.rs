//! Shared types, error taxonomy, configuration and retry primitives for the
//! pipeline auto-remediation engine.

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::{
    ActionFlags, CircuitBreakerDefaults, GatewayConfig, HealthCheckConfig, RemediationConfig,
    RestartConfig, RetryConfig, ScalingConfig,
};
pub use error::{AdapterError, AdapterErrorKind, Error, Result};
pub use retry::BackoffPolicy;
pub use types::{
    ActionKind, BreakerState, CircuitBreakerStatus, PlaybookConfig, PlaybookExecutionResult,
    PlaybookPublicView, RecoveryRequest, Snapshot,
};
