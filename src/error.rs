//! Error handling module for devforge
//!
//! Provides centralized error handling with proper error types using thiserror.
//! All errors in the application should use these types for consistency.
//!
//! The taxonomy distinguishes cooperative cancellation from timeouts, and
//! timeouts from plain script failure, because each propagates differently:
//! cancellation is never persisted as a failure, timeouts are surfaced to the
//! user, and script failures are classified per pipeline stage.

use std::time::Duration;
use thiserror::Error;

/// Which deadline fired. Timeouts at different scopes are not retried at the
/// same scope, so the scope travels with the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutScope {
    /// Check probe (30 s budget)
    Probe,
    /// Single pipeline stage (default 5 min)
    Stage,
    /// Whole pipeline run (30 min)
    Pipeline,
    /// Diagnostics detector script (30 s)
    Detector,
    /// Single fix command (60 s)
    Fix,
}

impl std::fmt::Display for TimeoutScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Probe => "probe",
            Self::Stage => "stage",
            Self::Pipeline => "pipeline",
            Self::Detector => "detector",
            Self::Fix => "fix",
        };
        write!(f, "{}", s)
    }
}

/// Main error type for devforge
#[derive(Error, Debug)]
pub enum DevforgeError {
    /// Cooperative cancellation. Never retried, never persisted as failure.
    #[error("operation cancelled")]
    Cancelled,

    /// A deadline fired at the given scope.
    #[error("{scope} timed out after {timeout:?}")]
    Timeout {
        scope: TimeoutScope,
        timeout: Duration,
    },

    /// Child exited non-zero. Severity is derived by the stage classifier.
    #[error("script exited with code {code}")]
    ScriptExit { code: i32 },

    /// Privilege probe failed non-interactively before any stage ran.
    /// The orchestrator must obtain credentials and retry.
    #[error("sudo credentials not cached - authentication required before pipeline execution")]
    AuthRequired,

    /// Structured input (probe output, checkpoint JSON, detector line) was
    /// malformed. Recovered locally by falling back to Unknown/skipping.
    #[error("parse error in {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    /// Executor lifecycle misuse: cancel with nothing running.
    #[error("pipeline not running")]
    NotRunning,

    /// Executor lifecycle misuse: execute while a run is in flight.
    #[error("pipeline already running")]
    AlreadyRunning,

    /// Script/stage failure wrapping the offending stage name for display.
    #[error("stage {stage} failed: {source}")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: Box<DevforgeError>,
    },

    /// State errors (mutex poisoning, invalid state)
    #[error("state error: {0}")]
    State(String),

    /// IO errors (file operations, terminal, process spawn)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for devforge operations
pub type Result<T> = std::result::Result<T, DevforgeError>;

impl DevforgeError {
    /// Create a timeout error for a scope.
    pub fn timeout(scope: TimeoutScope, timeout: Duration) -> Self {
        Self::Timeout { scope, timeout }
    }

    /// Create a parse error.
    pub fn parse(what: &'static str, detail: impl Into<String>) -> Self {
        Self::Parse {
            what,
            detail: detail.into(),
        }
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Wrap an error with the stage it occurred in.
    pub fn at_stage(self, stage: &'static str) -> Self {
        Self::StageFailed {
            stage,
            source: Box::new(self),
        }
    }

    /// True for cooperative cancellation (including when wrapped in a stage).
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::StageFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// True when a deadline fired (including when wrapped in a stage).
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::StageFailed { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DevforgeError::ScriptExit { code: 2 };
        assert_eq!(err.to_string(), "script exited with code 2");

        let err = DevforgeError::timeout(TimeoutScope::Stage, Duration::from_secs(300));
        assert!(err.to_string().contains("stage timed out"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DevforgeError = io_err.into();
        assert!(matches!(err, DevforgeError::Io(_)));
    }

    #[test]
    fn test_cancelled_survives_stage_wrapping() {
        let err = DevforgeError::Cancelled.at_stage("Building and installing");
        assert!(err.is_cancelled());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_survives_stage_wrapping() {
        let err = DevforgeError::timeout(TimeoutScope::Stage, Duration::from_secs(1))
            .at_stage("Checking installation");
        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
    }
}
