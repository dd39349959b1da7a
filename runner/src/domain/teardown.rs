//! Deferred cleanup operations.
//!
//! Every resource an execution creates registers one [`TeardownAction`] at
//! creation time. Actions are plain data so the queue can be inspected and
//! the same actions can be rebuilt from naming conventions in another process.

use std::fmt;

/// Log stream identified by group and stream name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStream {
    pub group: String,
    pub name: String,
}

/// One idempotent cleanup operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownAction {
    /// Empty and delete the workspace bucket.
    DeleteBucket { bucket: String },
    /// Deregister and delete a task definition revision.
    DeleteTaskDefinition { family: String, revision: u32 },
    /// Delete an owned security group.
    DeleteSecurityGroup { group_id: String },
    /// Delete the log stream of every container of a task.
    DeleteLogStreams { streams: Vec<LogStream> },
}

impl TeardownAction {
    /// Short human-readable label used in logs and failure reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            TeardownAction::DeleteBucket { bucket } => format!("delete bucket {bucket}"),
            TeardownAction::DeleteTaskDefinition { family, revision } => {
                format!("delete task definition {family}:{revision}")
            }
            TeardownAction::DeleteSecurityGroup { group_id } => {
                format!("delete security group {group_id}")
            }
            TeardownAction::DeleteLogStreams { streams } => {
                format!("delete {} log stream(s)", streams.len())
            }
        }
    }
}

impl fmt::Display for TeardownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Ordered list of pending cleanup operations, in registration order.
///
/// Only the owning orchestrator appends to it: after a resource was
/// successfully created, or when its teardown failed and must be retried.
#[derive(Debug, Default)]
pub struct TeardownQueue {
    actions: Vec<TeardownAction>,
}

impl TeardownQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: TeardownAction) {
        self.actions.push(action);
    }

    #[must_use]
    pub fn pending(&self) -> &[TeardownAction] {
        &self.actions
    }

    /// Take every pending action, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<TeardownAction> {
        std::mem::take(&mut self.actions)
    }
}
