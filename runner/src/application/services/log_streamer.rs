//! Log streamer: forwards the main container's log lines while the task runs.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use ephemeral_common::naming::{self, containers as names};
use ephemeral_common::{LogEventsPage, Task, TaskDefinition};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::application::ports::{ContainerApi, LogApi, LogSink};
use crate::application::services::container_scheduler::describe_task;
use crate::application::services::poller::poll_until;
use crate::domain::PollState;
use crate::domain::error::{CloudError, ExecutionError, TeardownError, codes};
use crate::domain::teardown::{LogStream, TeardownAction};

/// Input of [`stream_logs_until_stopped`].
#[derive(Debug, Clone, Copy)]
pub struct StreamRequest<'a> {
    pub cluster: &'a str,
    pub task_arn: &'a str,
    pub task_definition: &'a TaskDefinition,
    pub polling_interval: Duration,
    /// Extra cycles after STOPPED was first observed.
    pub post_complete_log_cycles: u32,
}

/// The stopped task and the action deleting its log streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedTask {
    pub task: Task,
    pub teardown: TeardownAction,
}

/// Log streams written by every container of `task_definition` for `task_id`.
#[must_use]
pub fn log_streams(task_definition: &TaskDefinition, task_id: &str) -> Vec<LogStream> {
    task_definition
        .containers
        .iter()
        .map(|container| LogStream {
            group: container.log_configuration.group.clone(),
            name: container
                .log_configuration
                .stream_name(&container.name, task_id),
        })
        .collect()
}

/// Poll the main container's log stream and the task status on a fixed
/// interval, forwarding every new line to `sink`.
///
/// There is no time limit: the loop runs as long as the task does. Once the
/// task is STOPPED the loop runs `post_complete_log_cycles` more cycles to
/// pick up late log deliveries, then resolves with the final task snapshot.
///
/// # Errors
///
/// Returns an error if the task ARN does not belong to the cluster, the task
/// definition has no main container, or a log or describe call fails.
pub async fn stream_logs_until_stopped(
    containers: &impl ContainerApi,
    logs: &impl LogApi,
    sink: &impl LogSink,
    request: StreamRequest<'_>,
) -> Result<FinishedTask> {
    let StreamRequest {
        cluster,
        task_arn,
        task_definition,
        polling_interval,
        post_complete_log_cycles,
    } = request;

    let task_id =
        naming::extract_task_id(cluster, task_arn).ok_or_else(|| ExecutionError::ForeignTaskArn {
            task_arn: task_arn.to_string(),
            cluster: cluster.to_string(),
        })?;
    let main = task_definition.container(names::MAIN).ok_or_else(|| {
        ExecutionError::MissingContainerDefinition {
            family: task_definition.family.clone(),
            container: names::MAIN.to_string(),
        }
    })?;
    let group = main.log_configuration.group.as_str();
    let stream = main.log_configuration.stream_name(names::MAIN, task_id);
    let stream = stream.as_str();

    let cursor: RefCell<Option<String>> = RefCell::new(None);
    let remaining = Cell::new(post_complete_log_cycles);
    let (cursor, remaining) = (&cursor, &remaining);

    info!(task_arn = %task_arn, stream = %stream, "streaming logs");
    let state = poll_until(polling_interval, None, move || async move {
        let token = cursor.borrow().clone();
        let page = fetch_page(logs, group, stream, token.as_deref()).await?;
        for message in &page.messages {
            sink.line(message);
        }
        if let Some(next) = page.next_forward_token {
            *cursor.borrow_mut() = Some(next);
        }

        let task = describe_task(containers, cluster, task_arn).await?;
        if task.last_status.is_stopped() {
            if remaining.get() == 0 {
                return anyhow::Ok(PollState::Satisfied(task));
            }
            remaining.set(remaining.get() - 1);
        }
        debug!(
            status = %task.last_status,
            remaining_cycles = remaining.get(),
            "log poll cycle"
        );
        Ok(PollState::Waiting)
    })
    .await?;

    let PollState::Satisfied(task) = state else {
        bail!("log stream of task {task_arn} ended without a result");
    };
    info!(
        task_arn = %task_arn,
        stopped_reason = task.stopped_reason.as_deref().unwrap_or("unknown"),
        "task stopped"
    );
    Ok(FinishedTask {
        teardown: TeardownAction::DeleteLogStreams {
            streams: log_streams(task_definition, task_id),
        },
        task,
    })
}

/// One page of events. A stream the log driver has not created yet reads as
/// an empty page.
async fn fetch_page(
    logs: &impl LogApi,
    group: &str,
    stream: &str,
    token: Option<&str>,
) -> Result<LogEventsPage> {
    match logs.get_log_events(group, stream, token).await {
        Ok(page) => Ok(page),
        Err(err) if CloudError::has_code(&err, codes::RESOURCE_NOT_FOUND) => {
            debug!(group = %group, stream = %stream, "log stream not created yet");
            Ok(LogEventsPage {
                messages: Vec::new(),
                next_forward_token: token.map(str::to_string),
            })
        }
        Err(err) => Err(err.context(format!("failed to read log stream {group}/{stream}"))),
    }
}

/// Delete every stream concurrently. Missing streams count as deleted.
///
/// # Errors
///
/// Returns [`TeardownError::Failed`] after all deletions finished if any of
/// them failed.
pub async fn delete_log_streams(logs: &impl LogApi, streams: &[LogStream]) -> Result<()> {
    let results = join_all(streams.iter().map(|stream| async move {
        match logs.delete_log_stream(&stream.group, &stream.name).await {
            Ok(()) => {
                debug!(group = %stream.group, stream = %stream.name, "deleted log stream");
                Ok(())
            }
            Err(err) if CloudError::has_code(&err, codes::RESOURCE_NOT_FOUND) => {
                warn!(group = %stream.group, stream = %stream.name, "log stream does not exist");
                Ok(())
            }
            Err(err) => Err(format!("{}/{}: {err:#}", stream.group, stream.name)),
        }
    }))
    .await;

    let failures: Vec<String> = results.into_iter().filter_map(Result::err).collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(TeardownError::Failed { failures }).context("failed to delete log streams")
    }
}
