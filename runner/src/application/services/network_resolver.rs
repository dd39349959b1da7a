//! Network resolver: subnets and the execution's security group.

use anyhow::{Context, Result};
use ephemeral_common::{SecurityGroupRequest, Tags};
use tracing::{debug, info, warn};

use crate::application::ports::NetworkApi;
use crate::domain::error::{CloudError, codes};
use crate::domain::teardown::TeardownAction;

pub const SECURITY_GROUP_DESCRIPTION: &str =
    "Temporary security group for ephemeral-runner container";

/// Security group used by the task. `teardown` is `None` for caller-supplied
/// groups, which are never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupResource {
    pub group_id: String,
    pub teardown: Option<TeardownAction>,
}

/// `subnet_ids` when non-empty, else every subnet of `vpc_id`.
///
/// # Errors
///
/// Returns an error if the subnets cannot be described.
pub async fn resolve_subnet_ids(
    network: &impl NetworkApi,
    vpc_id: &str,
    subnet_ids: &[String],
) -> Result<Vec<String>> {
    if !subnet_ids.is_empty() {
        return Ok(subnet_ids.to_vec());
    }
    let resolved = network
        .describe_subnets(vpc_id)
        .await
        .with_context(|| format!("failed to describe subnets of {vpc_id}"))?;
    debug!(vpc_id = %vpc_id, subnets = ?resolved, "resolved subnets");
    Ok(resolved)
}

/// Use `security_group_id` when non-empty, else create a group called `name`.
///
/// # Errors
///
/// Returns an error if the group cannot be created.
pub async fn get_or_create_security_group(
    network: &impl NetworkApi,
    security_group_id: &str,
    name: &str,
    vpc_id: &str,
    tags: &Tags,
) -> Result<SecurityGroupResource> {
    if !security_group_id.is_empty() {
        return Ok(SecurityGroupResource {
            group_id: security_group_id.to_string(),
            teardown: None,
        });
    }
    let request = SecurityGroupRequest {
        name: name.to_string(),
        description: SECURITY_GROUP_DESCRIPTION.to_string(),
        vpc_id: vpc_id.to_string(),
        tags: tags.clone(),
    };
    let group_id = network
        .create_security_group(&request)
        .await
        .with_context(|| format!("failed to create security group {name}"))?;
    info!(group_id = %group_id, name = %name, "created security group");
    Ok(SecurityGroupResource {
        teardown: Some(TeardownAction::DeleteSecurityGroup {
            group_id: group_id.clone(),
        }),
        group_id,
    })
}

/// Id of the first security group called `name`, if any.
///
/// # Errors
///
/// Returns an error if the groups cannot be described.
pub async fn find_security_group_id(
    network: &impl NetworkApi,
    name: &str,
) -> Result<Option<String>> {
    let ids = network
        .describe_security_groups(name)
        .await
        .with_context(|| format!("failed to describe security group {name}"))?;
    Ok(ids.into_iter().next())
}

/// Delete a security group, treating a missing group as already deleted.
///
/// # Errors
///
/// Returns an error for any failure other than the group not existing.
pub async fn delete_security_group(network: &impl NetworkApi, group_id: &str) -> Result<()> {
    match network.delete_security_group(group_id).await {
        Ok(()) => {
            info!(group_id = %group_id, "deleted security group");
            Ok(())
        }
        Err(err) if CloudError::has_code(&err, codes::SECURITY_GROUP_NOT_FOUND) => {
            warn!(group_id = %group_id, "security group does not exist, nothing to delete");
            Ok(())
        }
        Err(err) => Err(err.context(format!("failed to delete security group {group_id}"))),
    }
}
