//! Runs queued teardown actions.

use anyhow::Result;
use futures_util::future::join_all;
use tracing::{error, info};

use crate::application::ports::{ContainerApi, LogApi, NetworkApi, ObjectStorageApi};
use crate::application::services::container_scheduler::delete_task_definition;
use crate::application::services::log_streamer::delete_log_streams;
use crate::application::services::network_resolver::delete_security_group;
use crate::application::services::workspace_store::delete_bucket_if_exists;
use crate::domain::error::TeardownError;
use crate::domain::teardown::TeardownAction;

/// Run one action. Absent resources count as already cleaned up.
///
/// # Errors
///
/// Returns an error for any failure other than the resource not existing.
pub async fn run_action(
    containers: &impl ContainerApi,
    storage: &impl ObjectStorageApi,
    network: &impl NetworkApi,
    logs: &impl LogApi,
    action: &TeardownAction,
) -> Result<()> {
    match action {
        TeardownAction::DeleteBucket { bucket } => delete_bucket_if_exists(storage, bucket).await,
        TeardownAction::DeleteTaskDefinition { family, revision } => {
            delete_task_definition(containers, family, *revision)
                .await
                .map(|_| ())
        }
        TeardownAction::DeleteSecurityGroup { group_id } => {
            delete_security_group(network, group_id).await
        }
        TeardownAction::DeleteLogStreams { streams } => delete_log_streams(logs, streams).await,
    }
}

/// Actions [`run_all`] could not complete, with one report per failure.
#[derive(Debug, Default)]
pub struct Unfinished {
    pub actions: Vec<TeardownAction>,
    pub failures: Vec<String>,
}

impl Unfinished {
    /// Whether every action completed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// # Errors
    ///
    /// Returns [`TeardownError::Failed`] listing every failed action.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(TeardownError::Failed {
                failures: self.failures,
            }
            .into())
        }
    }
}

/// Run every action concurrently and wait for all of them.
///
/// A failing action does not cancel its siblings. Failed actions are handed
/// back so the caller can retry them.
pub async fn run_all(
    containers: &impl ContainerApi,
    storage: &impl ObjectStorageApi,
    network: &impl NetworkApi,
    logs: &impl LogApi,
    actions: Vec<TeardownAction>,
) -> Unfinished {
    let total = actions.len();
    let results = join_all(actions.into_iter().map(|action| async move {
        let outcome = run_action(containers, storage, network, logs, &action).await;
        (action, outcome)
    }))
    .await;

    let mut unfinished = Unfinished::default();
    for (action, outcome) in results {
        if let Err(err) = outcome {
            error!(action = %action, error = %format!("{err:#}"), "teardown action failed");
            unfinished.failures.push(format!("{action}: {err:#}"));
            unfinished.actions.push(action);
        }
    }

    if unfinished.is_empty() {
        info!(actions = total, "teardown complete");
    }
    unfinished
}
