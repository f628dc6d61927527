//! Error taxonomy for the recovery orchestrator

use thiserror::Error;

/// Result type alias for remediation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can propagate out of the orchestrator.
///
/// Per the error handling design, most failure modes never reach here: they are folded into
/// a `PlaybookExecutionResult{success: false, ...}` by the executor. Only configuration faults
/// and adapter wiring mistakes are expected to surface as `Err(Error)`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no playbook registered for error_type '{0}'")]
    PlaybookNotFound(String),

    #[error("circuit breaker open for key {key}")]
    CircuitOpen { key: String },

    #[error("action '{action}' is disabled by configuration")]
    ActionDisabled { action: String },

    #[error("action '{action}' failed: {kind}")]
    ActionFailed { action: String, kind: AdapterErrorKind },

    #[error("health check for {resource_id} timed out after {elapsed_seconds}s")]
    HealthCheckTimeout {
        resource_id: String,
        elapsed_seconds: u64,
    },

    #[error("health check for {resource_id} failed: {reason}")]
    HealthCheckFailed { resource_id: String, reason: String },

    #[error("rollback of {resource_id} failed: {reason}")]
    RollbackFailed { resource_id: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether a failure of this kind is worth retrying at the orchestrator level.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Adapter(AdapterError {
                kind: AdapterErrorKind::Transient | AdapterErrorKind::Throttled,
                ..
            })
        )
    }

    /// Category label used in logs and operator-surface summaries.
    pub fn category(&self) -> &'static str {
        match self {
            Error::PlaybookNotFound(_) => "playbook_not_found",
            Error::CircuitOpen { .. } => "circuit_open",
            Error::ActionDisabled { .. } => "action_disabled",
            Error::ActionFailed { .. } => "action_failed",
            Error::HealthCheckTimeout { .. } => "health_check_timeout",
            Error::HealthCheckFailed { .. } => "health_check_failed",
            Error::RollbackFailed { .. } => "rollback_failed",
            Error::Configuration(_) => "configuration",
            Error::Adapter(_) => "adapter",
            Error::Serialization(_) => "serialization",
        }
    }
}

/// The kinds of failure a platform adapter call can report (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    /// Caller may retry; covered by the primary-attempt backoff loop.
    Transient,
    /// Caller must escalate; retrying will not help.
    Permanent,
    /// Referenced resource does not exist on the platform.
    NotFound,
    /// Credentials rejected or expired.
    AuthFailure,
    /// Platform asked the caller to slow down.
    Throttled,
}

impl std::fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AdapterErrorKind::Transient => "transient",
            AdapterErrorKind::Permanent => "permanent",
            AdapterErrorKind::NotFound => "not_found",
            AdapterErrorKind::AuthFailure => "auth_failure",
            AdapterErrorKind::Throttled => "throttled",
        };
        write!(f, "{label}")
    }
}

/// Error returned by a `PlatformAdapter` call.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
    /// Present only for `Throttled`; seconds the caller should wait before retrying.
    pub retry_after_seconds: Option<u64>,
}

impl AdapterError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Transient,
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Permanent,
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::NotFound,
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    pub fn throttled(message: impl Into<String>, retry_after_seconds: u64) -> Self {
        Self {
            kind: AdapterErrorKind::Throttled,
            message: message.into(),
            retry_after_seconds: Some(retry_after_seconds),
        }
    }

    /// Whether the primary-attempt loop should keep retrying after this error, or stop early.
    pub fn should_retry(&self) -> bool {
        matches!(
            self.kind,
            AdapterErrorKind::Transient | AdapterErrorKind::Throttled
        )
    }
}
