//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra` or `crate::application`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator; callers classify them again with `downcast_ref`.

use std::time::Duration;

use thiserror::Error;

// ── Cloud service errors ──────────────────────────────────────────────────────

/// Error codes the runner reacts to. Anything else is unexpected.
pub mod codes {
    /// Object storage: the bucket does not exist.
    pub const NO_SUCH_BUCKET: &str = "NoSuchBucket";
    /// Container, log and identity services: the named resource does not exist.
    pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
    /// Network service: the security group does not exist.
    pub const SECURITY_GROUP_NOT_FOUND: &str = "InvalidGroup.NotFound";
}

/// Failure reported by a cloud service, carrying the service's error code.
///
/// Cloud adapters return this wrapped in `anyhow::Error` so services can tell
/// idempotent-absence errors apart from real failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct CloudError {
    pub code: String,
    pub message: String,
}

impl CloudError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether any error in the chain of `err` is a `CloudError` with `code`.
    #[must_use]
    pub fn has_code(err: &anyhow::Error, code: &str) -> bool {
        err.chain()
            .filter_map(|e| e.downcast_ref::<CloudError>())
            .any(|e| e.code == code)
    }
}

// ── Execution errors ──────────────────────────────────────────────────────────

/// Failures of the provisioning and run pipeline that are not plain cloud API
/// rejections.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Infrastructure never reached the expected state in time.
    #[error("timed out after {}s waiting for {subject} to reach {target}", waited.as_secs())]
    Timeout {
        subject: String,
        target: &'static str,
        waited: Duration,
    },

    #[error("task {0} is unknown to the container service")]
    TaskNotFound(String),

    #[error("task definition {family} has no '{container}' container")]
    MissingContainerDefinition { family: String, container: String },

    #[error("task {task_arn} does not belong to cluster {cluster}")]
    ForeignTaskArn { task_arn: String, cluster: String },
}

impl ExecutionError {
    /// Whether `err` was caused by a wait that ran out of time.
    #[must_use]
    pub fn is_timeout(err: &anyhow::Error) -> bool {
        err.chain()
            .filter_map(|e| e.downcast_ref::<ExecutionError>())
            .any(|e| matches!(e, ExecutionError::Timeout { .. }))
    }
}

// ── Settings errors ───────────────────────────────────────────────────────────

/// Settings rejected before any resource is created.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid execution id '{id}': {reason}")]
    InvalidExecutionId { id: String, reason: &'static str },

    #[error("Polling interval must be at least one second.")]
    ZeroPollingInterval,

    #[error("Invalid sync pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

// ── Teardown errors ───────────────────────────────────────────────────────────

/// Raised once every teardown action has finished and at least one failed.
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("{} teardown action(s) failed:\n  {}", failures.len(), failures.join("\n  "))]
    Failed { failures: Vec<String> },
}
