//! Execution orchestrator: provision → run → collect, with a teardown queue.
//!
//! ```text
//! cluster ─▶ bucket ─▶ sync up ─▶ task definition ─▶ subnets ─▶ security group
//!              │                        │                          │
//!              ▼                        ▼                          ▼
//!          [teardown]               [teardown]                [teardown]
//!
//! ─▶ run task ─▶ stream logs ─▶ sync down ─▶ exit code
//!                    │
//!                    ▼
//!                [teardown]
//! ```
//!
//! Stages run strictly in order. A resource's teardown action is queued as
//! soon as the resource exists, so a failure at any later stage still leaves
//! everything created so far to [`ExecutionOrchestrator::tear_down`].

use anyhow::{Context, Result};
use ephemeral_common::naming;
use ephemeral_common::{ExecutionSettings, RunnerConfig};
use tracing::info;

use crate::application::ports::{
    CloudClients, CloudConnector, ContainerApi, IdentityProvider, LogApi, LogSink, NetworkApi,
    ObjectStorageApi, SessionRequest, WorkspaceFs,
};
use crate::application::services::cluster_manager::get_or_create_cluster;
use crate::application::services::container_scheduler::{
    LaunchRequest, create_task_definition, run_task_and_wait_until_running,
};
use crate::application::services::deferred;
use crate::application::services::log_streamer::{StreamRequest, stream_logs_until_stopped};
use crate::application::services::network_resolver::{
    get_or_create_security_group, resolve_subnet_ids,
};
use crate::application::services::run_code::RemoteEnvironment;
use crate::application::services::session;
use crate::application::services::workspace_store::{
    SyncRequest, create_bucket, sync_down, sync_up,
};
use crate::domain::execution::{
    ExecutionResult, aggregate_exit_code, execution_tags, validate_settings,
};
use crate::domain::task_definition::build_task_definition;
use crate::domain::teardown::{TeardownAction, TeardownQueue};

/// Runs one execution end to end and remembers what it created.
pub struct ExecutionOrchestrator<C, S, N, L, W, K> {
    clients: CloudClients<C, S, N, L>,
    workspace: W,
    sink: K,
    config: RunnerConfig,
    teardown: TeardownQueue,
}

impl<C, S, N, L, W, K> ExecutionOrchestrator<C, S, N, L, W, K>
where
    C: ContainerApi,
    S: ObjectStorageApi,
    N: NetworkApi,
    L: LogApi,
    W: WorkspaceFs,
    K: LogSink,
{
    pub fn new(
        clients: CloudClients<C, S, N, L>,
        workspace: W,
        sink: K,
        config: RunnerConfig,
    ) -> Self {
        Self {
            clients,
            workspace,
            sink,
            config,
            teardown: TeardownQueue::new(),
        }
    }

    /// Build an orchestrator from identity material only.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be established.
    pub async fn connect<X>(
        identity: &impl IdentityProvider,
        connector: &X,
        request: &SessionRequest,
        workspace: W,
        sink: K,
        config: RunnerConfig,
    ) -> Result<Self>
    where
        X: CloudConnector<Containers = C, Storage = S, Network = N, Logs = L>,
    {
        let clients = session::establish(identity, connector, request, &config).await?;
        Ok(Self::new(clients, workspace, sink, config))
    }

    /// Teardown actions queued so far, in creation order.
    #[must_use]
    pub fn pending_teardown(&self) -> &[TeardownAction] {
        self.teardown.pending()
    }

    /// Provision the environment, run the script and collect the workspace.
    ///
    /// # Errors
    ///
    /// Returns an error when settings are invalid, a cloud call fails, or the
    /// task never comes up (`ExecutionError::Timeout`). A failing script is
    /// not an error: it yields a non-zero `exit_code`.
    #[tracing::instrument(skip_all, fields(execution_id = %settings.unique_execution_id))]
    pub async fn execute(&mut self, settings: &ExecutionSettings) -> Result<ExecutionResult> {
        validate_settings(settings)?;
        let tags = execution_tags(settings);
        let execution_id = settings.unique_execution_id.as_str();
        let clients = &self.clients;

        let cluster = get_or_create_cluster(&clients.containers, &settings.cluster_name, &tags)
            .await
            .context("provisioning cluster")?;

        let bucket = create_bucket(
            &clients.storage,
            &naming::bucket_name(execution_id),
            &settings.task_role_arn,
            &tags,
        )
        .await
        .context("creating workspace bucket")?;
        self.teardown.register(bucket.teardown);

        let uploaded = sync_up(
            &clients.storage,
            &self.workspace,
            SyncRequest {
                local_path: &settings.runner_workspace_folder,
                bucket: &bucket.name,
                includes: &settings.upload_includes,
                excludes: &settings.upload_excludes,
            },
        )
        .await
        .context("uploading workspace")?;
        info!(files = uploaded, "workspace staged");

        let request = build_task_definition(settings, &bucket.name, &tags, &self.config);
        let definition = create_task_definition(&clients.containers, &request)
            .await
            .context("registering task definition")?;
        self.teardown.register(definition.teardown);
        let task_definition = definition.task_definition;

        let subnet_ids =
            resolve_subnet_ids(&clients.network, &settings.vpc_id, &settings.subnet_ids)
                .await
                .context("resolving subnets")?;
        let security_group = get_or_create_security_group(
            &clients.network,
            &settings.security_group_id,
            &naming::security_group_name(execution_id),
            &settings.vpc_id,
            &tags,
        )
        .await
        .context("resolving security group")?;
        if let Some(action) = security_group.teardown {
            self.teardown.register(action);
        }

        let task = run_task_and_wait_until_running(
            &clients.containers,
            LaunchRequest {
                cluster: &cluster.name,
                task_definition: &task_definition.revision_id(),
                subnet_ids: &subnet_ids,
                security_group_id: &security_group.group_id,
                tags: &tags,
            },
            &self.config,
        )
        .await
        .context("starting task")?;

        let finished = stream_logs_until_stopped(
            &clients.containers,
            &clients.logs,
            &self.sink,
            StreamRequest {
                cluster: &cluster.name,
                task_arn: &task.task_arn,
                task_definition: &task_definition,
                polling_interval: settings.poll_every(),
                post_complete_log_cycles: settings.post_complete_log_cycles,
            },
        )
        .await
        .context("streaming task logs")?;
        self.teardown.register(finished.teardown);
        let task = finished.task;

        let downloaded = sync_down(
            &clients.storage,
            &self.workspace,
            SyncRequest {
                local_path: &settings.runner_workspace_folder,
                bucket: &bucket.name,
                includes: &settings.download_includes,
                excludes: &settings.download_excludes,
            },
        )
        .await
        .context("downloading workspace")?;

        let exit_code = aggregate_exit_code(&task.containers);
        info!(
            exit_code,
            files = downloaded,
            stopped_reason = task.stopped_reason.as_deref().unwrap_or("unknown"),
            "execution finished"
        );

        Ok(ExecutionResult {
            exit_code,
            cluster,
            task,
            task_definition,
            bucket_name: bucket.name,
        })
    }

    /// Run every queued teardown action concurrently and wait for all of
    /// them. Completed actions leave the queue; failed ones are queued again
    /// so a later call retries exactly those.
    ///
    /// # Errors
    ///
    /// Returns `TeardownError::Failed` if any action failed.
    #[tracing::instrument(skip_all)]
    pub async fn tear_down(&mut self) -> Result<()> {
        let actions = self.teardown.drain();
        info!(actions = actions.len(), "tearing down execution resources");
        let clients = &self.clients;
        let mut unfinished = deferred::run_all(
            &clients.containers,
            &clients.storage,
            &clients.network,
            &clients.logs,
            actions,
        )
        .await;
        for action in std::mem::take(&mut unfinished.actions) {
            self.teardown.register(action);
        }
        unfinished.into_result()
    }
}

impl<C, S, N, L, W, K> RemoteEnvironment for ExecutionOrchestrator<C, S, N, L, W, K>
where
    C: ContainerApi,
    S: ObjectStorageApi,
    N: NetworkApi,
    L: LogApi,
    W: WorkspaceFs,
    K: LogSink,
{
    async fn execute(&mut self, settings: &ExecutionSettings) -> Result<ExecutionResult> {
        ExecutionOrchestrator::execute(self, settings).await
    }

    async fn tear_down(&mut self) -> Result<()> {
        ExecutionOrchestrator::tear_down(self).await
    }
}
