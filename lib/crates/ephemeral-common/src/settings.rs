use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Resource tags, ordered so that generated requests are deterministic.
pub type Tags = BTreeMap<String, String>;

/// Key under which the settings of an execution are persisted for the
/// post-job teardown process.
pub const SETTINGS_STATE_KEY: &str = "ephemeral-run-settings";

/// Immutable input of one execution.
///
/// This record is the only state crossing the execute/teardown process
/// boundary, so it is serialized verbatim with camelCase field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSettings {
    /// Globally unique per run; names every created resource.
    pub unique_execution_id: String,
    /// Container image running the script.
    pub image: String,
    /// Shell used as entry point, e.g. `"bash"`.
    pub shell: String,
    /// Script to run; lines are chained with `&&`.
    pub run: String,
    /// Task CPU units, e.g. `"256"`.
    pub cpu: String,
    /// Task memory in MiB, e.g. `"512"`.
    pub memory: String,
    /// Compute cluster, reused if it exists. Also the log group name.
    pub cluster_name: String,
    pub vpc_id: String,
    /// Empty means "every subnet of `vpc_id`".
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    /// Empty means "create one for this execution".
    #[serde(default)]
    pub security_group_id: String,
    pub execution_role_arn: String,
    /// Role of the running task; also granted access to the workspace bucket.
    pub task_role_arn: String,
    #[serde(default)]
    pub tags: Tags,
    /// Seconds between log polling cycles.
    pub polling_interval: u64,
    /// Extra polling cycles after the task stopped, to drain delivery lag.
    #[serde(default)]
    pub post_complete_log_cycles: u32,
    #[serde(default)]
    pub upload_includes: Vec<String>,
    #[serde(default)]
    pub upload_excludes: Vec<String>,
    #[serde(default)]
    pub download_includes: Vec<String>,
    #[serde(default)]
    pub download_excludes: Vec<String>,
    /// Local directory mirrored to and from the remote workspace.
    pub runner_workspace_folder: PathBuf,
    /// Region handed to the container log driver.
    #[serde(default)]
    pub region: String,
    /// Extra environment for the main container.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

impl ExecutionSettings {
    /// Log polling interval as a `Duration`.
    #[must_use]
    pub fn poll_every(&self) -> Duration {
        Duration::from_secs(self.polling_interval)
    }

    /// Whether the execution creates (and therefore owns) its security group.
    #[must_use]
    pub fn owns_security_group(&self) -> bool {
        self.security_group_id.is_empty()
    }
}
