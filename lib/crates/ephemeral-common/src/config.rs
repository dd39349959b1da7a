use std::time::Duration;

use serde::Deserialize;

/// Tunables of the runner that are not part of an execution's settings.
///
/// Every field has a default so that partial sources (environment variables,
/// files) only need to name what they override.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunnerConfig {
    /// Seconds between container status checks while waiting for RUNNING.
    #[serde(default = "default_container_poll_secs")]
    pub container_poll_secs: u64,

    /// Seconds to wait for the main container to reach RUNNING or STOPPED.
    #[serde(default = "default_container_start_timeout_secs")]
    pub container_start_timeout_secs: u64,

    /// Seconds to wait for a force-stopped task to report STOPPED.
    #[serde(default = "default_task_stop_timeout_secs")]
    pub task_stop_timeout_secs: u64,

    /// Prefix of every log stream written by the log driver.
    #[serde(default = "default_log_stream_prefix")]
    pub log_stream_prefix: String,

    /// Image of the setup and teardown sidecars (must ship the storage CLI).
    #[serde(default = "default_sidecar_image")]
    pub sidecar_image: String,

    /// Mount path of the shared workspace volume inside every container.
    #[serde(default = "default_workspace_mount_path")]
    pub workspace_mount_path: String,

    /// `startedBy` marker on launched tasks.
    #[serde(default = "default_started_by")]
    pub started_by: String,

    /// Reason recorded when teardown force-stops a task.
    #[serde(default = "default_stop_reason")]
    pub stop_reason: String,

    /// Session name used when assuming the deployment role.
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Lifetime of the assumed-role session, in seconds.
    #[serde(default = "default_session_duration_secs")]
    pub session_duration_secs: u64,
}

impl RunnerConfig {
    #[must_use]
    pub fn container_poll(&self) -> Duration {
        Duration::from_secs(self.container_poll_secs)
    }

    #[must_use]
    pub fn container_start_timeout(&self) -> Duration {
        Duration::from_secs(self.container_start_timeout_secs)
    }

    #[must_use]
    pub fn task_stop_timeout(&self) -> Duration {
        Duration::from_secs(self.task_stop_timeout_secs)
    }
}

fn default_container_poll_secs() -> u64 {
    2
}

fn default_container_start_timeout_secs() -> u64 {
    600
}

fn default_task_stop_timeout_secs() -> u64 {
    600
}

fn default_log_stream_prefix() -> String {
    "ephemeral-run-logs".to_string()
}

fn default_sidecar_image() -> String {
    "amazon/aws-cli:2.13.1".to_string()
}

fn default_workspace_mount_path() -> String {
    "/workspace".to_string()
}

fn default_started_by() -> String {
    "ephemeral-runner".to_string()
}

fn default_stop_reason() -> String {
    "ephemeral-runner aborted".to_string()
}

fn default_session_name() -> String {
    "EphemeralRunner".to_string()
}

fn default_session_duration_secs() -> u64 {
    3600
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            container_poll_secs: default_container_poll_secs(),
            container_start_timeout_secs: default_container_start_timeout_secs(),
            task_stop_timeout_secs: default_task_stop_timeout_secs(),
            log_stream_prefix: default_log_stream_prefix(),
            sidecar_image: default_sidecar_image(),
            workspace_mount_path: default_workspace_mount_path(),
            started_by: default_started_by(),
            stop_reason: default_stop_reason(),
            session_name: default_session_name(),
            session_duration_secs: default_session_duration_secs(),
        }
    }
}
