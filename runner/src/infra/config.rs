//! Runner configuration from `EPHEMERAL_RUNNER_*` environment variables.

use anyhow::{Context, Result};
use ephemeral_common::RunnerConfig;

/// Prefix of every configuration variable, e.g. `EPHEMERAL_RUNNER_SIDECAR_IMAGE`.
pub const ENV_PREFIX: &str = "EPHEMERAL_RUNNER_";

/// Load the runner configuration from the process environment. Unset
/// variables keep their defaults.
///
/// # Errors
///
/// Returns an error if a variable is set to a value of the wrong type.
pub fn load_runner_config() -> Result<RunnerConfig> {
    envy::prefixed(ENV_PREFIX)
        .from_env()
        .context("invalid EPHEMERAL_RUNNER_* configuration")
}

/// Same as [`load_runner_config`], from explicit `(name, value)` pairs.
///
/// # Errors
///
/// Returns an error if a variable is set to a value of the wrong type.
pub fn load_runner_config_from<I>(vars: I) -> Result<RunnerConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    envy::prefixed(ENV_PREFIX)
        .from_iter(vars)
        .context("invalid EPHEMERAL_RUNNER_* configuration")
}
