use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::naming;
use crate::settings::Tags;

/// Lifecycle status of a task or of one of its containers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Provisioning,
    Pending,
    Running,
    Stopping,
    Stopped,
}

impl TaskStatus {
    #[must_use]
    pub fn is_stopped(self) -> bool {
        self == TaskStatus::Stopped
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Provisioning => "PROVISIONING",
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Stopping => "STOPPING",
            TaskStatus::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised by adapters translating a wire status the runner does not know.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown task status '{0}'")]
pub struct UnknownTaskStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownTaskStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROVISIONING" => Ok(TaskStatus::Provisioning),
            // Transitional states collapse onto their nearest neighbour.
            "PENDING" | "ACTIVATING" => Ok(TaskStatus::Pending),
            "RUNNING" => Ok(TaskStatus::Running),
            "DEACTIVATING" | "STOPPING" | "DEPROVISIONING" => Ok(TaskStatus::Stopping),
            "STOPPED" => Ok(TaskStatus::Stopped),
            other => Err(UnknownTaskStatus(other.to_string())),
        }
    }
}

/// Named compute pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub name: String,
    pub arn: String,
}

/// Snapshot of one container of a running or stopped task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    pub last_status: TaskStatus,
    /// Set once the container stopped.
    pub exit_code: Option<i32>,
}

/// Snapshot of one running instance of a task definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub task_arn: String,
    pub last_status: TaskStatus,
    pub stopped_reason: Option<String>,
    pub containers: Vec<Container>,
    /// Only populated when tags were requested on describe.
    pub tags: Tags,
}

impl Task {
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.get(key).is_some_and(|v| v == value)
    }
}

/// Condition a container waits for before starting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DependencyCondition {
    Start,
    Complete,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDependency {
    pub container_name: String,
    pub condition: DependencyCondition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub container_path: String,
    pub source_volume: String,
}

/// Log driver configuration of one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfiguration {
    pub group: String,
    pub region: String,
    pub stream_prefix: String,
    pub create_group: bool,
}

impl LogConfiguration {
    /// Stream this configuration produces for `container` of `task_id`.
    #[must_use]
    pub fn stream_name(&self, container: &str, task_id: &str) -> String {
        naming::log_stream_name(&self.stream_prefix, container, task_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    /// When `true`, this container stopping stops the whole task.
    pub essential: bool,
    pub entry_point: Vec<String>,
    pub command: Vec<String>,
    pub working_directory: String,
    pub environment: BTreeMap<String, String>,
    pub depends_on: Vec<ContainerDependency>,
    pub mount_points: Vec<MountPoint>,
    pub log_configuration: LogConfiguration,
}

/// Registration request for a new task definition revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionRequest {
    pub family: String,
    pub cpu: String,
    pub memory: String,
    pub execution_role_arn: String,
    pub task_role_arn: String,
    /// Transient (host-less) volumes shared between containers.
    pub volumes: Vec<String>,
    pub containers: Vec<ContainerDefinition>,
    pub tags: Tags,
}

/// A registered task definition revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    pub family: String,
    pub revision: u32,
    pub containers: Vec<ContainerDefinition>,
}

impl TaskDefinition {
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// `family:revision` of this definition.
    #[must_use]
    pub fn revision_id(&self) -> String {
        naming::task_definition_revision(&self.family, self.revision)
    }
}

/// Launch request for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTaskRequest {
    pub cluster: String,
    pub task_definition: String,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub assign_public_ip: bool,
    pub started_by: String,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupRequest {
    pub name: String,
    pub description: String,
    pub vpc_id: String,
    pub tags: Tags,
}

/// One page of an object listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListPage {
    pub keys: Vec<String>,
    /// Present when more objects remain.
    pub next_continuation_token: Option<String>,
}

/// One page of log events, read forward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEventsPage {
    pub messages: Vec<String>,
    pub next_forward_token: Option<String>,
}

/// Short-lived credentials obtained from the identity service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}
