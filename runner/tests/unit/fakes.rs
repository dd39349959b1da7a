//! In-memory fake cloud and local fakes for service tests.
//!
//! `FakeCloud` implements every cloud port over one shared state so a test
//! can hand the same cloud to the execution and the teardown orchestrators,
//! script how the task progresses, inject failures, and inspect the calls.

#![allow(clippy::expect_used, dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use ephemeral_common::{
    Cluster, Container, Credentials, ExecutionSettings, LogEventsPage, ObjectListPage,
    RunTaskRequest, SecurityGroupRequest, Tags, Task, TaskDefinition, TaskDefinitionRequest,
    TaskStatus,
};
use ephemeral_runner::application::ports::{
    CloudClients, CloudConnector, ContainerApi, IdentityProvider, LogApi, LogSink, NetworkApi,
    ObjectStorageApi, SettingsStore, WorkspaceFs,
};
use ephemeral_runner::domain::CloudError;
use ephemeral_runner::domain::error::codes;

pub const REGION: &str = "eu-west-1";
pub const ACCOUNT: &str = "123456789012";

// ── Fake cloud state ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct CloudState {
    /// Every call, as `"operation argument"`.
    pub calls: Vec<String>,
    /// Operation name → error returned by its next calls.
    pub failures: BTreeMap<String, CloudError>,

    pub clusters: Vec<Cluster>,

    /// Bucket → key → body.
    pub buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    pub bucket_tags: BTreeMap<String, Tags>,
    pub bucket_policies: BTreeMap<String, String>,
    /// Keys per listing page; `0` lists everything at once.
    pub page_size: usize,

    /// `family:revision` → definition.
    pub task_definitions: BTreeMap<String, TaskDefinition>,
    pub inactive_definitions: BTreeSet<String>,
    pub tasks: Vec<Task>,
    pub next_task: u32,
    /// Statuses applied to the task by successive (untagged) describe calls.
    pub status_script: VecDeque<TaskStatus>,
    /// Container name → exit code once stopped. Missing means `0`.
    pub exit_codes: BTreeMap<String, i32>,
    pub stop_requests: Vec<(String, String)>,
    /// Objects the workspace-teardown sidecar uploads into every bucket once
    /// the task stops.
    pub task_outputs: BTreeMap<String, Vec<u8>>,

    /// VPC → subnet ids.
    pub subnets: BTreeMap<String, Vec<String>>,
    /// Security group id → request it was created from.
    pub security_groups: BTreeMap<String, SecurityGroupRequest>,
    pub next_group: u32,

    /// Existing `(group, stream)` pairs.
    pub log_streams: BTreeSet<(String, String)>,
    /// Lines returned by successive `get_log_events` calls.
    pub log_script: VecDeque<Vec<String>>,
    pub log_reads: u32,
}

#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
}

fn not_found(code: &str, what: &str) -> anyhow::Error {
    CloudError::new(code, format!("{what} does not exist")).into()
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().expect("cloud state poisoned")
    }

    pub fn clients(&self) -> CloudClients<FakeCloud, FakeCloud, FakeCloud, FakeCloud> {
        CloudClients {
            containers: self.clone(),
            storage: self.clone(),
            network: self.clone(),
            logs: self.clone(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Calls whose operation name is `op`.
    pub fn calls_to(&self, op: &str) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(op))
            .cloned()
            .collect()
    }

    pub fn fail(&self, op: &str, code: &str) {
        self.state()
            .failures
            .insert(op.to_string(), CloudError::new(code, format!("{op} failed")));
    }

    pub fn with_subnets(&self, vpc: &str, ids: &[&str]) {
        self.state().subnets.insert(
            vpc.to_string(),
            ids.iter().map(|s| (*s).to_string()).collect(),
        );
    }

    pub fn script_statuses(&self, statuses: &[TaskStatus]) {
        self.state().status_script.extend(statuses.iter().copied());
    }

    pub fn script_logs(&self, pages: &[&[&str]]) {
        self.state().log_script.extend(
            pages
                .iter()
                .map(|lines| lines.iter().map(|l| (*l).to_string()).collect()),
        );
    }

    pub fn put_objects(&self, bucket: &str, keys: &[&str]) {
        let mut state = self.state();
        let objects = state.buckets.entry(bucket.to_string()).or_default();
        for key in keys {
            objects.insert((*key).to_string(), key.as_bytes().to_vec());
        }
    }

    pub fn task_arn(cluster: &str, id: u32) -> String {
        format!("arn:aws:ecs:{REGION}:{ACCOUNT}:task/{cluster}/task{id}")
    }

    /// Insert a task directly, as if launched by an earlier process.
    pub fn seed_task(&self, cluster: &str, execution_id: &str, status: TaskStatus) -> String {
        let mut state = self.state();
        state.next_task += 1;
        let arn = Self::task_arn(cluster, state.next_task);
        state.tasks.push(Task {
            task_arn: arn.clone(),
            last_status: status,
            stopped_reason: None,
            containers: Vec::new(),
            tags: Tags::from([("executionId".to_string(), execution_id.to_string())]),
        });
        arn
    }

    fn record(&self, op: &str, arg: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("{op} {arg}"));
        match state.failures.get(op) {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }
}

fn apply_status(task: &mut Task, status: TaskStatus, exit_codes: &BTreeMap<String, i32>) {
    task.last_status = status;
    for container in &mut task.containers {
        container.last_status = status;
        if status.is_stopped() {
            container.exit_code = Some(exit_codes.get(&container.name).copied().unwrap_or(0));
        }
    }
    if status.is_stopped() && task.stopped_reason.is_none() {
        task.stopped_reason = Some("Essential container in task exited".to_string());
    }
}

// ── ContainerApi ──────────────────────────────────────────────────────────────

impl ContainerApi for FakeCloud {
    async fn describe_clusters(&self, names: &[String]) -> Result<Vec<Cluster>> {
        self.record("describe_clusters", &names.join(","))?;
        Ok(self
            .state()
            .clusters
            .iter()
            .filter(|c| names.contains(&c.name))
            .cloned()
            .collect())
    }

    async fn create_cluster(&self, name: &str, _tags: &Tags) -> Result<Cluster> {
        self.record("create_cluster", name)?;
        let cluster = Cluster {
            name: name.to_string(),
            arn: format!("arn:aws:ecs:{REGION}:{ACCOUNT}:cluster/{name}"),
        };
        self.state().clusters.push(cluster.clone());
        Ok(cluster)
    }

    async fn register_task_definition(
        &self,
        request: &TaskDefinitionRequest,
    ) -> Result<TaskDefinition> {
        self.record("register_task_definition", &request.family)?;
        let mut state = self.state();
        let revision = state
            .task_definitions
            .values()
            .filter(|d| d.family == request.family)
            .count() as u32
            + 1;
        let definition = TaskDefinition {
            family: request.family.clone(),
            revision,
            containers: request.containers.clone(),
        };
        state
            .task_definitions
            .insert(definition.revision_id(), definition.clone());
        Ok(definition)
    }

    async fn deregister_task_definition(&self, revision: &str) -> Result<TaskDefinition> {
        self.record("deregister_task_definition", revision)?;
        let mut state = self.state();
        let definition = state
            .task_definitions
            .get(revision)
            .cloned()
            .ok_or_else(|| not_found(codes::RESOURCE_NOT_FOUND, revision))?;
        state.inactive_definitions.insert(revision.to_string());
        Ok(definition)
    }

    async fn delete_task_definition(&self, revision: &str) -> Result<Option<TaskDefinition>> {
        self.record("delete_task_definition", revision)?;
        let mut state = self.state();
        if !state.inactive_definitions.remove(revision) {
            return Err(not_found(codes::RESOURCE_NOT_FOUND, revision));
        }
        Ok(state.task_definitions.remove(revision))
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<Task> {
        self.record("run_task", &request.task_definition)?;
        let mut state = self.state();
        let definition = state
            .task_definitions
            .get(&request.task_definition)
            .cloned()
            .ok_or_else(|| not_found(codes::RESOURCE_NOT_FOUND, &request.task_definition))?;
        state.next_task += 1;
        let task_arn = Self::task_arn(&request.cluster, state.next_task);
        let task_id = format!("task{}", state.next_task);
        for container in &definition.containers {
            let config = &container.log_configuration;
            state.log_streams.insert((
                config.group.clone(),
                config.stream_name(&container.name, &task_id),
            ));
        }
        let task = Task {
            task_arn,
            last_status: TaskStatus::Provisioning,
            stopped_reason: None,
            containers: definition
                .containers
                .iter()
                .map(|c| Container {
                    name: c.name.clone(),
                    last_status: TaskStatus::Pending,
                    exit_code: None,
                })
                .collect(),
            tags: request.tags.clone(),
        };
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
        include_tags: bool,
    ) -> Result<Vec<Task>> {
        self.record("describe_tasks", &task_arns.join(","))?;
        let mut state = self.state();
        let state = &mut *state;
        let prefix = format!(":task/{cluster}/");
        let mut found = Vec::new();
        for task in &mut state.tasks {
            if !task_arns.contains(&task.task_arn) || !task.task_arn.contains(&prefix) {
                continue;
            }
            if !include_tags {
                if let Some(status) = state.status_script.pop_front() {
                    apply_status(task, status, &state.exit_codes);
                    if status.is_stopped() {
                        for objects in state.buckets.values_mut() {
                            objects.extend(state.task_outputs.clone());
                        }
                    }
                }
            }
            let mut snapshot = task.clone();
            if !include_tags {
                snapshot.tags.clear();
            }
            found.push(snapshot);
        }
        Ok(found)
    }

    async fn list_tasks(&self, cluster: &str, desired_status: TaskStatus) -> Result<Vec<String>> {
        self.record("list_tasks", desired_status.as_str())?;
        let prefix = format!(":task/{cluster}/");
        Ok(self
            .state()
            .tasks
            .iter()
            .filter(|t| t.task_arn.contains(&prefix))
            .filter(|t| t.last_status.is_stopped() == desired_status.is_stopped())
            .map(|t| t.task_arn.clone())
            .collect())
    }

    async fn stop_task(&self, _cluster: &str, task: &str, reason: &str) -> Result<Task> {
        self.record("stop_task", task)?;
        let mut state = self.state();
        state
            .stop_requests
            .push((task.to_string(), reason.to_string()));
        state.status_script = VecDeque::from([TaskStatus::Stopping, TaskStatus::Stopped]);
        state
            .tasks
            .iter()
            .find(|t| t.task_arn == task)
            .cloned()
            .ok_or_else(|| not_found(codes::RESOURCE_NOT_FOUND, task))
    }
}

// ── ObjectStorageApi ──────────────────────────────────────────────────────────

impl ObjectStorageApi for FakeCloud {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.record("create_bucket", bucket)?;
        self.state().buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn put_bucket_tagging(&self, bucket: &str, tags: &Tags) -> Result<()> {
        self.record("put_bucket_tagging", bucket)?;
        self.state()
            .bucket_tags
            .insert(bucket.to_string(), tags.clone());
        Ok(())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        self.record("put_bucket_policy", bucket)?;
        self.state()
            .bucket_policies
            .insert(bucket.to_string(), policy.to_string());
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListPage> {
        self.record(
            "list_objects",
            &format!("{bucket} {}", continuation_token.unwrap_or("-")),
        )?;
        let state = self.state();
        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| not_found(codes::NO_SUCH_BUCKET, bucket))?;
        let keys: Vec<String> = objects.keys().cloned().collect();
        let start: usize = continuation_token.map_or(0, |t| t.parse().expect("numeric token"));
        let size = if state.page_size == 0 {
            keys.len().max(1)
        } else {
            state.page_size
        };
        let end = (start + size).min(keys.len());
        Ok(ObjectListPage {
            keys: keys[start.min(end)..end].to_vec(),
            next_continuation_token: (end < keys.len()).then(|| end.to_string()),
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.record("put_object", key)?;
        self.state()
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| not_found(codes::NO_SUCH_BUCKET, bucket))?
            .insert(key.to_string(), body);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.record("get_object", key)?;
        self.state()
            .buckets
            .get(bucket)
            .ok_or_else(|| not_found(codes::NO_SUCH_BUCKET, bucket))?
            .get(key)
            .cloned()
            .ok_or_else(|| not_found("NoSuchKey", key))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.record("delete_object", key)?;
        self.state()
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| not_found(codes::NO_SUCH_BUCKET, bucket))?
            .remove(key);
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.record("delete_bucket", bucket)?;
        let mut state = self.state();
        match state.buckets.get(bucket) {
            None => Err(not_found(codes::NO_SUCH_BUCKET, bucket)),
            Some(objects) if !objects.is_empty() => {
                Err(CloudError::new("BucketNotEmpty", bucket).into())
            }
            Some(_) => {
                state.buckets.remove(bucket);
                Ok(())
            }
        }
    }
}

// ── NetworkApi ────────────────────────────────────────────────────────────────

impl NetworkApi for FakeCloud {
    async fn describe_subnets(&self, vpc_id: &str) -> Result<Vec<String>> {
        self.record("describe_subnets", vpc_id)?;
        Ok(self
            .state()
            .subnets
            .get(vpc_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_security_group(&self, request: &SecurityGroupRequest) -> Result<String> {
        self.record("create_security_group", &request.name)?;
        let mut state = self.state();
        state.next_group += 1;
        let id = format!("sg-{:04}", state.next_group);
        state.security_groups.insert(id.clone(), request.clone());
        Ok(id)
    }

    async fn describe_security_groups(&self, name: &str) -> Result<Vec<String>> {
        self.record("describe_security_groups", name)?;
        Ok(self
            .state()
            .security_groups
            .iter()
            .filter(|(_, request)| request.name == name)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<()> {
        self.record("delete_security_group", group_id)?;
        self.state()
            .security_groups
            .remove(group_id)
            .map(|_| ())
            .ok_or_else(|| not_found(codes::SECURITY_GROUP_NOT_FOUND, group_id))
    }
}

// ── LogApi ────────────────────────────────────────────────────────────────────

impl LogApi for FakeCloud {
    async fn get_log_events(
        &self,
        group: &str,
        stream: &str,
        next_token: Option<&str>,
    ) -> Result<LogEventsPage> {
        self.record(
            "get_log_events",
            &format!("{group}/{stream} {}", next_token.unwrap_or("-")),
        )?;
        let mut state = self.state();
        if !state
            .log_streams
            .contains(&(group.to_string(), stream.to_string()))
        {
            return Err(not_found(codes::RESOURCE_NOT_FOUND, stream));
        }
        state.log_reads += 1;
        let messages = state.log_script.pop_front().unwrap_or_default();
        Ok(LogEventsPage {
            messages,
            next_forward_token: Some(format!("f/{}", state.log_reads)),
        })
    }

    async fn delete_log_stream(&self, group: &str, stream: &str) -> Result<()> {
        self.record("delete_log_stream", &format!("{group}/{stream}"))?;
        if self
            .state()
            .log_streams
            .remove(&(group.to_string(), stream.to_string()))
        {
            Ok(())
        } else {
            Err(not_found(codes::RESOURCE_NOT_FOUND, stream))
        }
    }
}

// ── Session fakes ─────────────────────────────────────────────────────────────

/// Identity provider handing out fixed credentials and recording requests.
#[derive(Default)]
pub struct FakeIdentity {
    pub requests: Mutex<Vec<(String, String, u64)>>,
    pub reject: bool,
}

impl IdentityProvider for FakeIdentity {
    async fn assume_role_with_web_identity(
        &self,
        role_arn: &str,
        session_name: &str,
        _web_identity_token: &str,
        duration_secs: u64,
    ) -> Result<Credentials> {
        self.requests.lock().expect("poisoned").push((
            role_arn.to_string(),
            session_name.to_string(),
            duration_secs,
        ));
        if self.reject {
            return Err(CloudError::new("AccessDenied", "not authorized").into());
        }
        Ok(Credentials {
            access_key_id: "AKIAFAKE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
        })
    }
}

/// Connector handing out clients of one shared fake cloud.
pub struct FakeConnector {
    pub cloud: FakeCloud,
    pub regions: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(cloud: &FakeCloud) -> Self {
        Self {
            cloud: cloud.clone(),
            regions: Mutex::new(Vec::new()),
        }
    }
}

impl CloudConnector for FakeConnector {
    type Containers = FakeCloud;
    type Storage = FakeCloud;
    type Network = FakeCloud;
    type Logs = FakeCloud;

    fn connect(
        &self,
        region: &str,
        _credentials: &Credentials,
    ) -> Result<CloudClients<FakeCloud, FakeCloud, FakeCloud, FakeCloud>> {
        self.regions
            .lock()
            .expect("poisoned")
            .push(region.to_string());
        Ok(self.cloud.clients())
    }
}

// ── Local fakes ───────────────────────────────────────────────────────────────

/// Log sink remembering every forwarded line. Clones share the lines.
#[derive(Clone, Default)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("poisoned").clone()
    }
}

impl LogSink for RecordingSink {
    fn line(&self, line: &str) {
        self.lines.lock().expect("poisoned").push(line.to_string());
    }
}

/// Workspace held in memory. Directories are implied by file keys. Clones
/// share the files.
#[derive(Clone, Default)]
pub struct MemoryWorkspace {
    pub root: PathBuf,
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryWorkspace {
    pub fn with_files(root: &str, keys: &[&str]) -> Self {
        Self {
            root: PathBuf::from(root),
            files: Arc::new(Mutex::new(
                keys.iter()
                    .map(|k| ((*k).to_string(), k.as_bytes().to_vec()))
                    .collect(),
            )),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.files.lock().expect("poisoned").keys().cloned().collect()
    }

    pub fn contents(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().expect("poisoned").get(key).cloned()
    }
}

impl WorkspaceFs for MemoryWorkspace {
    async fn is_dir(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let prefix = format!("{}/", relative.to_string_lossy().trim_end_matches('/'));
        self.files
            .lock()
            .expect("poisoned")
            .keys()
            .any(|k| k.starts_with(&prefix))
    }

    async fn list_files(&self, _root: &Path) -> Result<Vec<String>> {
        Ok(self.keys())
    }

    async fn read(&self, _root: &Path, key: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .expect("poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such file {key}"))
    }

    async fn write(&self, _root: &Path, key: &str, contents: &[u8]) -> Result<()> {
        self.files
            .lock()
            .expect("poisoned")
            .insert(key.to_string(), contents.to_vec());
        Ok(())
    }
}

/// Settings store held in memory.
#[derive(Default)]
pub struct MemorySettingsStore {
    pub entries: Mutex<BTreeMap<String, ExecutionSettings>>,
}

impl SettingsStore for MemorySettingsStore {
    async fn save(&self, key: &str, settings: &ExecutionSettings) -> Result<()> {
        self.entries
            .lock()
            .expect("poisoned")
            .insert(key.to_string(), settings.clone());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<ExecutionSettings>> {
        Ok(self.entries.lock().expect("poisoned").get(key).cloned())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.entries.lock().expect("poisoned").remove(key);
        Ok(())
    }
}

// ── Builders ──────────────────────────────────────────────────────────────────

/// Settings of execution `run-42` on cluster `builds` in `vpc-1`.
pub fn settings() -> ExecutionSettings {
    ExecutionSettings {
        unique_execution_id: "run-42".to_string(),
        image: "node:20".to_string(),
        shell: "bash".to_string(),
        run: "npm ci\nnpm test".to_string(),
        cpu: "256".to_string(),
        memory: "512".to_string(),
        cluster_name: "builds".to_string(),
        vpc_id: "vpc-1".to_string(),
        subnet_ids: Vec::new(),
        security_group_id: String::new(),
        execution_role_arn: format!("arn:aws:iam::{ACCOUNT}:role/exec"),
        task_role_arn: format!("arn:aws:iam::{ACCOUNT}:role/task"),
        tags: Tags::from([("team".to_string(), "infra".to_string())]),
        polling_interval: 1,
        post_complete_log_cycles: 0,
        upload_includes: Vec::new(),
        upload_excludes: Vec::new(),
        download_includes: Vec::new(),
        download_excludes: Vec::new(),
        runner_workspace_folder: PathBuf::from("/ws"),
        region: REGION.to_string(),
        environment: BTreeMap::new(),
    }
}
