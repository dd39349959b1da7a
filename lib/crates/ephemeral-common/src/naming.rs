//! Resource naming contract.
//!
//! Every cloud resource an execution creates is named from the execution id.
//! The teardown path re-derives these names in a separate process, so the
//! derivations below must stay stable across releases: a changed format means
//! orphaned resources that nothing will ever find again.

/// Container names inside the generated task definition.
pub mod containers {
    /// Runs the user script. Depends on `SETUP` completing.
    pub const MAIN: &str = "main-container";

    /// Downloads the workspace bucket into the shared volume before `MAIN`.
    pub const SETUP: &str = "workspace-setup";

    /// Uploads the shared volume back into the bucket once `MAIN` completes.
    /// Essential: its failure fails the task.
    pub const TEARDOWN: &str = "workspace-teardown";

    /// Transient volume shared by all three containers.
    pub const WORKSPACE_VOLUME: &str = "runner-workspace";
}

/// Tag keys stamped on every created resource.
pub mod tags {
    /// Marks resources as owned by this tool.
    pub const MANAGED_BY: &str = "managedBy";
    /// Value written under `MANAGED_BY`.
    pub const MANAGED_BY_VALUE: &str = "ephemeral-runner";
    /// Carries the execution id; used to find the task of an execution.
    pub const EXECUTION_ID: &str = "executionId";
}

/// Task definitions are registered once per execution, so teardown always
/// targets the first revision of the family.
pub const TEARDOWN_REVISION: u32 = 1;

/// Workspace bucket name for an execution.
pub fn bucket_name(execution_id: &str) -> String {
    execution_id.to_string()
}

/// Task definition family for an execution.
pub fn task_definition_family(execution_id: &str) -> String {
    execution_id.to_string()
}

/// Name of the security group created when the caller supplied none.
pub fn security_group_name(execution_id: &str) -> String {
    execution_id.to_string()
}

/// `family:revision` identifier accepted by the container service.
pub fn task_definition_revision(family: &str, revision: u32) -> String {
    format!("{family}:{revision}")
}

/// Log stream written by the log driver for one container of one task.
/// Format: {prefix}/{container}/{task_id}
pub fn log_stream_name(prefix: &str, container: &str, task_id: &str) -> String {
    format!("{prefix}/{container}/{task_id}")
}

/// Extract the trailing task id from a task ARN, using the cluster name as
/// delimiter (`...:task/{cluster}/{task_id}`).
///
/// Returns `None` when the ARN does not belong to `cluster`.
pub fn extract_task_id<'a>(cluster: &str, task_arn: &'a str) -> Option<&'a str> {
    let delimiter = format!(":task/{cluster}/");
    task_arn
        .split_once(delimiter.as_str())
        .map(|(_, id)| id)
        .filter(|id| !id.is_empty())
}

/// Validate that an execution id can name every derived resource.
///
/// The bucket is the strictest consumer: 3–63 characters, lowercase letters,
/// digits, `-` and `.`, starting and ending with a letter or digit.
pub fn validate_execution_id(execution_id: &str) -> Result<(), &'static str> {
    if execution_id.len() < 3 || execution_id.len() > 63 {
        return Err("execution id must be between 3 and 63 characters");
    }
    if !execution_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err("execution id may only contain [a-z0-9.-]");
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edge_ok(execution_id.chars().next()) || !edge_ok(execution_id.chars().last()) {
        return Err("execution id must start and end with a letter or digit");
    }
    if execution_id.contains("..") {
        return Err("execution id must not contain consecutive dots");
    }
    Ok(())
}
