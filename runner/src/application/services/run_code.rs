//! Run-code use case: execute in a remote environment, always tear down.

use anyhow::{Context, Result};
use ephemeral_common::{ExecutionSettings, SETTINGS_STATE_KEY};
use tracing::{error, info};

use crate::application::ports::SettingsStore;
use crate::domain::execution::ExecutionResult;

/// A provider of throwaway execution environments.
#[allow(async_fn_in_trait)]
pub trait RemoteEnvironment {
    /// Provision, run and collect.
    async fn execute(&mut self, settings: &ExecutionSettings) -> Result<ExecutionResult>;
    /// Remove everything `execute` created, including after a failed run.
    async fn tear_down(&mut self) -> Result<()>;
}

/// Persist `settings` for the post-job cleanup, execute, then tear down
/// whatever the execution created, whether it succeeded or not.
///
/// # Errors
///
/// Returns the execution error when the execution failed; the teardown
/// error only when the execution itself succeeded. Both are logged.
pub async fn run_code(
    env: &mut impl RemoteEnvironment,
    store: &impl SettingsStore,
    settings: &ExecutionSettings,
) -> Result<ExecutionResult> {
    store
        .save(SETTINGS_STATE_KEY, settings)
        .await
        .context("failed to persist execution settings")?;

    let executed = env.execute(settings).await;
    if let Err(err) = &executed {
        error!(error = %format!("{err:#}"), "execution failed");
    }

    let torn_down = env.tear_down().await;
    if let Err(err) = &torn_down {
        error!(error = %format!("{err:#}"), "teardown failed");
    }

    let result = executed?;
    torn_down?;
    info!(exit_code = result.exit_code, "run complete");
    Ok(result)
}
