use ephemeral_common::naming::{self, tags};
use ephemeral_common::{Cluster, Container, ExecutionSettings, Tags, Task, TaskDefinition};

use crate::domain::error::SettingsError;

/// Outcome of one successful execution.
///
/// A non-zero `exit_code` is a normal result: only infrastructure failures
/// are reported as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// `0` iff every container of the stopped task exited with `0`.
    pub exit_code: i32,
    pub cluster: Cluster,
    /// Final snapshot of the stopped task.
    pub task: Task,
    pub task_definition: TaskDefinition,
    pub bucket_name: String,
}

/// Aggregate exit code of a stopped task: `0` iff every container reported
/// exit code `0`, else `1`. A container without an exit code never ran to
/// completion and counts as failed. A task without containers yields `0`.
#[must_use]
pub fn aggregate_exit_code(containers: &[Container]) -> i32 {
    i32::from(!containers.iter().all(|c| c.exit_code == Some(0)))
}

/// Tags stamped on every created resource: the caller's tags plus the
/// ownership and execution-id markers, which take precedence.
#[must_use]
pub fn execution_tags(settings: &ExecutionSettings) -> Tags {
    let mut merged = settings.tags.clone();
    merged.insert(
        tags::MANAGED_BY.to_string(),
        tags::MANAGED_BY_VALUE.to_string(),
    );
    merged.insert(
        tags::EXECUTION_ID.to_string(),
        settings.unique_execution_id.clone(),
    );
    merged
}

/// Reject settings that would fail half-way through provisioning.
///
/// # Errors
///
/// Returns [`SettingsError`] when the execution id cannot name every derived
/// resource or the polling interval is zero.
pub fn validate_settings(settings: &ExecutionSettings) -> Result<(), SettingsError> {
    naming::validate_execution_id(&settings.unique_execution_id).map_err(|reason| {
        SettingsError::InvalidExecutionId {
            id: settings.unique_execution_id.clone(),
            reason,
        }
    })?;
    if settings.polling_interval == 0 {
        return Err(SettingsError::ZeroPollingInterval);
    }
    Ok(())
}
