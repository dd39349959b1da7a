//! Cluster manager: the shared compute cluster. Clusters are never deleted.

use anyhow::{Context, Result};
use ephemeral_common::{Cluster, Tags};
use tracing::{debug, info};

use crate::application::ports::ContainerApi;

/// Reuse the cluster called `name` when exactly one matches, else create it.
///
/// # Errors
///
/// Returns an error if the cluster cannot be described or created.
pub async fn get_or_create_cluster(
    containers: &impl ContainerApi,
    name: &str,
    tags: &Tags,
) -> Result<Cluster> {
    let existing = containers
        .describe_clusters(&[name.to_string()])
        .await
        .with_context(|| format!("failed to describe cluster {name}"))?;
    if let [cluster] = existing.as_slice() {
        debug!(cluster = %cluster.name, "reusing cluster");
        return Ok(cluster.clone());
    }
    let cluster = containers
        .create_cluster(name, tags)
        .await
        .with_context(|| format!("failed to create cluster {name}"))?;
    info!(cluster = %cluster.name, arn = %cluster.arn, "created cluster");
    Ok(cluster)
}
