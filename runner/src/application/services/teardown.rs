//! Teardown orchestrator: removes every resource of one execution, knowing
//! nothing but its settings.
//!
//! Resources are rediscovered from the naming contract and the execution-id
//! tag, so this can run in a different process than the execution, against
//! an environment that is partially provisioned, still running, or already
//! gone.
//!
//! ```text
//! ┌─ delete bucket ─────────────────────────────────────────────┐
//! │                                                             ├─▶ report
//! └─ find task ─▶ stop task ─┬─ delete security group (owned) ──┤
//!                            └─ delete task definition ─▶ logs ─┘
//! ```

use anyhow::Result;
use ephemeral_common::naming;
use ephemeral_common::{ExecutionSettings, RunnerConfig, Task};
use tracing::{info, warn};

use crate::application::ports::{
    CloudClients, CloudConnector, ContainerApi, IdentityProvider, LogApi, NetworkApi,
    ObjectStorageApi, SessionRequest,
};
use crate::application::services::container_scheduler::{
    delete_task_definition, get_task_by_execution_id, stop_task,
};
use crate::application::services::log_streamer::{delete_log_streams, log_streams};
use crate::application::services::network_resolver::{
    delete_security_group, find_security_group_id,
};
use crate::application::services::session;
use crate::application::services::workspace_store::delete_bucket_if_exists;
use crate::domain::error::TeardownError;

/// Cross-process teardown of one execution.
pub struct TeardownOrchestrator<C, S, N, L> {
    clients: CloudClients<C, S, N, L>,
    config: RunnerConfig,
}

impl<C, S, N, L> TeardownOrchestrator<C, S, N, L>
where
    C: ContainerApi,
    S: ObjectStorageApi,
    N: NetworkApi,
    L: LogApi,
{
    pub fn new(clients: CloudClients<C, S, N, L>, config: RunnerConfig) -> Self {
        Self { clients, config }
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
        config: RunnerConfig,
    ) -> Result<Self>
    where
        X: CloudConnector<Containers = C, Storage = S, Network = N, Logs = L>,
    {
        let clients = session::establish(identity, connector, request, &config).await?;
        Ok(Self::new(clients, config))
    }

    /// Remove every resource of the execution named by `settings`.
    ///
    /// Safe to call repeatedly: resources that do not exist are skipped.
    /// Independent branches keep running when a sibling fails.
    ///
    /// # Errors
    ///
    /// Returns [`TeardownError::Failed`] listing every failed step.
    #[tracing::instrument(skip_all, fields(execution_id = %settings.unique_execution_id))]
    pub async fn tear_down(&self, settings: &ExecutionSettings) -> Result<()> {
        let bucket = naming::bucket_name(&settings.unique_execution_id);
        let (bucket_result, mut failures) = tokio::join!(
            delete_bucket_if_exists(&self.clients.storage, &bucket),
            self.tear_down_task(settings),
        );
        if let Err(err) = bucket_result {
            failures.insert(0, format!("delete bucket {bucket}: {err:#}"));
        }

        if failures.is_empty() {
            info!("teardown complete");
            Ok(())
        } else {
            for failure in &failures {
                warn!(failure = %failure, "teardown step failed");
            }
            Err(TeardownError::Failed { failures }.into())
        }
    }

    /// Find and stop the task, then remove what depends on it being stopped.
    /// Returns the failures.
    async fn tear_down_task(&self, settings: &ExecutionSettings) -> Vec<String> {
        let containers = &self.clients.containers;
        let cluster = settings.cluster_name.as_str();
        let execution_id = settings.unique_execution_id.as_str();

        let task = match get_task_by_execution_id(containers, cluster, execution_id).await {
            Ok(task) => task,
            Err(err) => return vec![format!("find task of {execution_id}: {err:#}")],
        };

        let task = match task {
            Some(task) if !task.last_status.is_stopped() => {
                info!(task_arn = %task.task_arn, status = %task.last_status, "stopping task");
                match stop_task(
                    containers,
                    cluster,
                    &task.task_arn,
                    &self.config.stop_reason,
                    &self.config,
                )
                .await
                {
                    Ok(stopped) => Some(stopped),
                    Err(err) => return vec![format!("stop task {}: {err:#}", task.task_arn)],
                }
            }
            Some(task) => Some(task),
            None => {
                info!("no task found for execution");
                None
            }
        };

        let (group_result, definition_result) = tokio::join!(
            self.delete_owned_security_group(settings),
            self.delete_definition_and_logs(settings, task.as_ref()),
        );
        [group_result, definition_result]
            .into_iter()
            .filter_map(Result::err)
            .collect()
    }

    async fn delete_owned_security_group(
        &self,
        settings: &ExecutionSettings,
    ) -> Result<(), String> {
        if !settings.owns_security_group() {
            info!(
                group_id = %settings.security_group_id,
                "security group supplied by caller, keeping it"
            );
            return Ok(());
        }
        let name = naming::security_group_name(&settings.unique_execution_id);
        let network = &self.clients.network;
        let group_id = find_security_group_id(network, &name)
            .await
            .map_err(|err| format!("find security group {name}: {err:#}"))?;
        match group_id {
            Some(group_id) => delete_security_group(network, &group_id)
                .await
                .map_err(|err| format!("delete security group {group_id}: {err:#}")),
            None => {
                info!(name = %name, "no security group found");
                Ok(())
            }
        }
    }

    async fn delete_definition_and_logs(
        &self,
        settings: &ExecutionSettings,
        task: Option<&Task>,
    ) -> Result<(), String> {
        let family = naming::task_definition_family(&settings.unique_execution_id);
        let definition =
            delete_task_definition(&self.clients.containers, &family, naming::TEARDOWN_REVISION)
                .await
                .map_err(|err| format!("delete task definition {family}: {err:#}"))?;

        let (Some(definition), Some(task)) = (definition, task) else {
            return Ok(());
        };
        let Some(task_id) = naming::extract_task_id(&settings.cluster_name, &task.task_arn) else {
            warn!(
                task_arn = %task.task_arn,
                "task does not belong to cluster, keeping log streams"
            );
            return Ok(());
        };
        delete_log_streams(&self.clients.logs, &log_streams(&definition, task_id))
            .await
            .map_err(|err| format!("delete log streams of {}: {err:#}", task.task_arn))
    }
}
