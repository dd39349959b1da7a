//! Session establishment: identity token → credentials → cloud clients.

use anyhow::{Context, Result};
use ephemeral_common::RunnerConfig;
use tracing::info;

use crate::application::ports::{CloudConnector, ConnectedClients, IdentityProvider, SessionRequest};

/// Assume the deployment role and connect every cloud client to the region.
///
/// # Errors
///
/// Returns an error if the role cannot be assumed or a client cannot be built.
pub async fn establish<X: CloudConnector>(
    identity: &impl IdentityProvider,
    connector: &X,
    request: &SessionRequest,
    config: &RunnerConfig,
) -> Result<ConnectedClients<X>> {
    let credentials = identity
        .assume_role_with_web_identity(
            &request.role_arn,
            &config.session_name,
            &request.web_identity_token,
            config.session_duration_secs,
        )
        .await
        .with_context(|| format!("failed to assume role {}", request.role_arn))?;
    info!(region = %request.region, role_arn = %request.role_arn, "session established");
    connector
        .connect(&request.region, &credentials)
        .with_context(|| format!("failed to connect cloud clients in {}", request.region))
}
