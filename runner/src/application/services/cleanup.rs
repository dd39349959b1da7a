//! Post-job cleanup: tear down an execution from its persisted settings.

use anyhow::{Context, Result};
use ephemeral_common::{RunnerConfig, SETTINGS_STATE_KEY};
use tracing::info;

use crate::application::ports::{CloudConnector, IdentityProvider, SessionRequest, SettingsStore};
use crate::application::services::teardown::TeardownOrchestrator;

/// What the cleanup found to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// No settings were persisted: the run never started.
    NothingToCleanUp,
    /// Every resource of this execution is gone.
    CleanedUp { execution_id: String },
}

/// Load the persisted settings, connect, tear the execution down and forget
/// the settings. The persisted key survives a failed teardown so the cleanup
/// can be retried.
///
/// # Errors
///
/// Returns an error if the settings cannot be read, the session cannot be
/// established, or the teardown fails.
pub async fn run_cleanup<X: CloudConnector>(
    store: &impl SettingsStore,
    identity: &impl IdentityProvider,
    connector: &X,
    request: &SessionRequest,
    config: RunnerConfig,
) -> Result<CleanupOutcome> {
    let Some(settings) = store
        .load(SETTINGS_STATE_KEY)
        .await
        .context("failed to read persisted execution settings")?
    else {
        info!("no persisted execution settings, nothing to clean up");
        return Ok(CleanupOutcome::NothingToCleanUp);
    };

    info!(execution_id = %settings.unique_execution_id, "cleaning up execution resources");
    let orchestrator = TeardownOrchestrator::connect(identity, connector, request, config).await?;
    orchestrator.tear_down(&settings).await?;

    store
        .clear(SETTINGS_STATE_KEY)
        .await
        .context("failed to clear persisted execution settings")?;
    info!(execution_id = %settings.unique_execution_id, "cleanup complete");
    Ok(CleanupOutcome::CleanedUp {
        execution_id: settings.unique_execution_id,
    })
}
