//! Container scheduler: task definitions, task launch and the bounded waits
//! on task and container status.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use ephemeral_common::naming::{self, containers as names, tags};
use ephemeral_common::{
    RunTaskRequest, RunnerConfig, Tags, Task, TaskDefinition, TaskDefinitionRequest, TaskStatus,
};
use tracing::{debug, info, warn};

use crate::application::ports::ContainerApi;
use crate::application::services::poller::poll_until;
use crate::domain::PollState;
use crate::domain::error::{CloudError, ExecutionError, codes};
use crate::domain::teardown::TeardownAction;

/// A registered task definition and the action that removes it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionResource {
    pub task_definition: TaskDefinition,
    pub teardown: TeardownAction,
}

/// Where and how to launch the execution's task.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub cluster: &'a str,
    /// `family:revision` to launch.
    pub task_definition: &'a str,
    pub subnet_ids: &'a [String],
    pub security_group_id: &'a str,
    pub tags: &'a Tags,
}

/// Register `request`. Teardown always targets the first revision of the
/// family, which is what a separate teardown process derives as well.
///
/// # Errors
///
/// Returns an error if registration fails.
pub async fn create_task_definition(
    containers: &impl ContainerApi,
    request: &TaskDefinitionRequest,
) -> Result<TaskDefinitionResource> {
    let task_definition = containers
        .register_task_definition(request)
        .await
        .with_context(|| format!("failed to register task definition {}", request.family))?;
    info!(task_definition = %task_definition.revision_id(), "registered task definition");
    Ok(TaskDefinitionResource {
        teardown: TeardownAction::DeleteTaskDefinition {
            family: task_definition.family.clone(),
            revision: naming::TEARDOWN_REVISION,
        },
        task_definition,
    })
}

/// Deregister and delete `family:revision`.
///
/// Returns `Ok(None)` when the revision does not exist.
///
/// # Errors
///
/// Returns an error for any failure other than the revision not existing.
pub async fn delete_task_definition(
    containers: &impl ContainerApi,
    family: &str,
    revision: u32,
) -> Result<Option<TaskDefinition>> {
    let revision_id = naming::task_definition_revision(family, revision);
    let deleted = async {
        containers.deregister_task_definition(&revision_id).await?;
        containers.delete_task_definition(&revision_id).await
    }
    .await;
    match deleted {
        Ok(definition) => {
            info!(task_definition = %revision_id, "deleted task definition");
            Ok(definition)
        }
        Err(err) if CloudError::has_code(&err, codes::RESOURCE_NOT_FOUND) => {
            warn!(
                task_definition = %revision_id,
                "task definition does not exist, nothing to delete"
            );
            Ok(None)
        }
        Err(err) => Err(err.context(format!("failed to delete task definition {revision_id}"))),
    }
}

/// Current snapshot of one task.
///
/// # Errors
///
/// Returns [`ExecutionError::TaskNotFound`] if the scheduler does not know
/// the task, or the describe call's error.
pub async fn describe_task(
    containers: &impl ContainerApi,
    cluster: &str,
    task_arn: &str,
) -> Result<Task> {
    containers
        .describe_tasks(cluster, &[task_arn.to_string()], false)
        .await
        .with_context(|| format!("failed to describe task {task_arn}"))?
        .into_iter()
        .find(|task| task.task_arn == task_arn)
        .ok_or_else(|| ExecutionError::TaskNotFound(task_arn.to_string()).into())
}

/// Launch the task and wait until its main container reports RUNNING, or
/// STOPPED when it finished (or crashed) before it was first observed.
///
/// # Errors
///
/// Returns an error if the launch fails, or [`ExecutionError::Timeout`] if
/// the main container does not get there within the configured bound.
pub async fn run_task_and_wait_until_running(
    containers: &impl ContainerApi,
    launch: LaunchRequest<'_>,
    config: &RunnerConfig,
) -> Result<Task> {
    let request = RunTaskRequest {
        cluster: launch.cluster.to_string(),
        task_definition: launch.task_definition.to_string(),
        subnet_ids: launch.subnet_ids.to_vec(),
        security_group_ids: vec![launch.security_group_id.to_string()],
        assign_public_ip: true,
        started_by: config.started_by.clone(),
        tags: launch.tags.clone(),
    };
    let task = containers
        .run_task(&request)
        .await
        .with_context(|| format!("failed to run task {}", launch.task_definition))?;
    info!(task_arn = %task.task_arn, "launched task, waiting for it to run");

    wait_for_container(
        containers,
        launch.cluster,
        &task.task_arn,
        names::MAIN,
        config.container_poll(),
        config.container_start_timeout(),
    )
    .await
}

/// Poll the task until container `name` reports RUNNING or STOPPED.
///
/// # Errors
///
/// Returns [`ExecutionError::Timeout`] when `limit` elapses first, or the
/// error of a failed describe call.
pub async fn wait_for_container(
    containers: &impl ContainerApi,
    cluster: &str,
    task_arn: &str,
    name: &str,
    every: Duration,
    limit: Duration,
) -> Result<Task> {
    let state = poll_until(every, Some(limit), move || async move {
        let task = describe_task(containers, cluster, task_arn).await?;
        let Some(status) = task.container(name).map(|c| c.last_status) else {
            debug!(task_arn = %task_arn, container = %name, "container not reported yet");
            return Ok(PollState::Waiting);
        };
        debug!(task_arn = %task_arn, container = %name, status = %status, "container status");
        anyhow::Ok(match status {
            TaskStatus::Running | TaskStatus::Stopped => PollState::Satisfied(task),
            _ => PollState::Waiting,
        })
    })
    .await?;

    match state {
        PollState::Satisfied(task) => Ok(task),
        PollState::TimedOut => Err(ExecutionError::Timeout {
            subject: format!("container {name} of task {task_arn}"),
            target: "RUNNING or STOPPED",
            waited: limit,
        }
        .into()),
        PollState::Waiting => bail!("poll loop for container {name} ended without a result"),
    }
}

/// Force-stop a task and wait until the scheduler reports it STOPPED.
///
/// # Errors
///
/// Returns an error if the stop request fails, or [`ExecutionError::Timeout`]
/// if the task does not stop within `config`'s bound.
pub async fn stop_task(
    containers: &impl ContainerApi,
    cluster: &str,
    task_arn: &str,
    reason: &str,
    config: &RunnerConfig,
) -> Result<Task> {
    containers
        .stop_task(cluster, task_arn, reason)
        .await
        .with_context(|| format!("failed to stop task {task_arn}"))?;
    info!(task_arn = %task_arn, "stop requested, waiting for task to stop");

    let limit = config.task_stop_timeout();
    let state = poll_until(config.container_poll(), Some(limit), move || async move {
        let task = describe_task(containers, cluster, task_arn).await?;
        anyhow::Ok(if task.last_status.is_stopped() {
            PollState::Satisfied(task)
        } else {
            PollState::Waiting
        })
    })
    .await?;

    match state {
        PollState::Satisfied(task) => Ok(task),
        PollState::TimedOut => Err(ExecutionError::Timeout {
            subject: format!("task {task_arn}"),
            target: "STOPPED",
            waited: limit,
        }
        .into()),
        PollState::Waiting => bail!("poll loop for task {task_arn} ended without a result"),
    }
}

/// Find the task tagged with `execution_id` among the cluster's running and
/// stopped tasks. `Ok(None)` when there is none.
///
/// # Errors
///
/// Returns an error if tasks cannot be listed or described.
pub async fn get_task_by_execution_id(
    containers: &impl ContainerApi,
    cluster: &str,
    execution_id: &str,
) -> Result<Option<Task>> {
    let (stopped, running) = tokio::try_join!(
        containers.list_tasks(cluster, TaskStatus::Stopped),
        containers.list_tasks(cluster, TaskStatus::Running),
    )
    .with_context(|| format!("failed to list tasks of cluster {cluster}"))?;

    let arns: Vec<String> = stopped.into_iter().chain(running).collect();
    if arns.is_empty() {
        debug!(cluster = %cluster, "no running or stopped tasks");
        return Ok(None);
    }

    let task = containers
        .describe_tasks(cluster, &arns, true)
        .await
        .with_context(|| format!("failed to describe tasks of cluster {cluster}"))?
        .into_iter()
        .find(|task| task.has_tag(tags::EXECUTION_ID, execution_id));
    debug!(
        execution_id = %execution_id,
        task_arn = task.as_ref().map_or("none", |t| t.task_arn.as_str()),
        "task lookup by execution id"
    );
    Ok(task)
}
