//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared types crate,
//! never from `crate::infra`.
//!
//! Cloud ports report service failures as [`crate::domain::CloudError`]
//! wrapped in `anyhow::Error`, so services can recognise absence codes.

use std::path::Path;

use anyhow::Result;
use ephemeral_common::{
    Cluster, Credentials, ExecutionSettings, LogEventsPage, ObjectListPage, RunTaskRequest,
    SecurityGroupRequest, Tags, Task, TaskDefinition, TaskDefinitionRequest, TaskStatus,
};

// ── Cloud Port Traits ─────────────────────────────────────────────────────────

/// Cluster and container scheduling primitives.
#[allow(async_fn_in_trait)]
pub trait ContainerApi {
    /// Describe clusters by name. Unknown names are simply absent.
    async fn describe_clusters(&self, names: &[String]) -> Result<Vec<Cluster>>;
    async fn create_cluster(&self, name: &str, tags: &Tags) -> Result<Cluster>;
    async fn register_task_definition(
        &self,
        request: &TaskDefinitionRequest,
    ) -> Result<TaskDefinition>;
    /// Deregister `family:revision`. Unknown revisions are reported with
    /// code `ResourceNotFoundException`.
    async fn deregister_task_definition(&self, revision: &str) -> Result<TaskDefinition>;
    /// Permanently delete an inactive `family:revision`.
    async fn delete_task_definition(&self, revision: &str) -> Result<Option<TaskDefinition>>;
    /// Launch one task. Returns the freshly created task snapshot.
    async fn run_task(&self, request: &RunTaskRequest) -> Result<Task>;
    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
        include_tags: bool,
    ) -> Result<Vec<Task>>;
    /// List task ARNs of `cluster` with the given desired status.
    async fn list_tasks(&self, cluster: &str, desired_status: TaskStatus) -> Result<Vec<String>>;
    /// Ask the scheduler to stop a task. Returns immediately.
    async fn stop_task(&self, cluster: &str, task: &str, reason: &str) -> Result<Task>;
}

/// Object storage primitives.
#[allow(async_fn_in_trait)]
pub trait ObjectStorageApi {
    /// Create a private bucket.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;
    async fn put_bucket_tagging(&self, bucket: &str, tags: &Tags) -> Result<()>;
    /// Attach a JSON policy document to the bucket.
    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()>;
    /// One page of keys; pass the previous page's token to continue.
    async fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListPage>;
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
    /// Delete an empty bucket.
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;
}

/// Virtual network primitives.
#[allow(async_fn_in_trait)]
pub trait NetworkApi {
    /// Ids of every subnet of `vpc_id`.
    async fn describe_subnets(&self, vpc_id: &str) -> Result<Vec<String>>;
    /// Create a security group, returning its id.
    async fn create_security_group(&self, request: &SecurityGroupRequest) -> Result<String>;
    /// Ids of the security groups named `name`.
    async fn describe_security_groups(&self, name: &str) -> Result<Vec<String>>;
    async fn delete_security_group(&self, group_id: &str) -> Result<()>;
}

/// Log service primitives.
#[allow(async_fn_in_trait)]
pub trait LogApi {
    /// Read forward from `next_token` (from the start when `None`).
    async fn get_log_events(
        &self,
        group: &str,
        stream: &str,
        next_token: Option<&str>,
    ) -> Result<LogEventsPage>;
    async fn delete_log_stream(&self, group: &str, stream: &str) -> Result<()>;
}

/// The four cloud clients an orchestrator works with.
pub struct CloudClients<C, S, N, L> {
    pub containers: C,
    pub storage: S,
    pub network: N,
    pub logs: L,
}

// ── Session Port Traits ───────────────────────────────────────────────────────

/// Input of a web-identity role assumption.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub region: String,
    pub role_arn: String,
    pub web_identity_token: String,
}

/// Exchanges an identity token for short-lived credentials.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider {
    async fn assume_role_with_web_identity(
        &self,
        role_arn: &str,
        session_name: &str,
        web_identity_token: &str,
        duration_secs: u64,
    ) -> Result<Credentials>;
}

/// Clients produced by connector `X`.
pub type ConnectedClients<X> = CloudClients<
    <X as CloudConnector>::Containers,
    <X as CloudConnector>::Storage,
    <X as CloudConnector>::Network,
    <X as CloudConnector>::Logs,
>;

/// Builds cloud clients bound to one region and set of credentials.
pub trait CloudConnector {
    type Containers: ContainerApi;
    type Storage: ObjectStorageApi;
    type Network: NetworkApi;
    type Logs: LogApi;

    /// # Errors
    ///
    /// Returns an error if a client cannot be configured.
    fn connect(
        &self,
        region: &str,
        credentials: &Credentials,
    ) -> Result<CloudClients<Self::Containers, Self::Storage, Self::Network, Self::Logs>>;
}

// ── Local Port Traits ─────────────────────────────────────────────────────────

/// Destination of the remote container's log lines.
pub trait LogSink {
    fn line(&self, line: &str);
}

/// Local workspace directory access.
#[allow(async_fn_in_trait)]
pub trait WorkspaceFs {
    /// Whether `path` is an existing directory (symlinks are not followed).
    async fn is_dir(&self, path: &Path) -> bool;
    /// Every regular file below `root`, as `/`-separated relative keys.
    async fn list_files(&self, root: &Path) -> Result<Vec<String>>;
    async fn read(&self, root: &Path, key: &str) -> Result<Vec<u8>>;
    /// Write a file, creating missing parent directories.
    async fn write(&self, root: &Path, key: &str, contents: &[u8]) -> Result<()>;
}

/// Persists execution settings across the execute/teardown process boundary.
#[allow(async_fn_in_trait)]
pub trait SettingsStore {
    async fn save(&self, key: &str, settings: &ExecutionSettings) -> Result<()>;
    /// `Ok(None)` when nothing is stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<ExecutionSettings>>;
    /// Remove `key`. Removing an absent key succeeds.
    async fn clear(&self, key: &str) -> Result<()>;
}
