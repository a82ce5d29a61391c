//! Error types for release domain validation and parsing.

use super::{BatchKey, TaskKey, TaskStatus};
use thiserror::Error;

/// Errors returned by domain operations and reducers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The requested status change is not an edge of the workflow graph.
    #[error("invalid state transition for task {task_key}: {from} -> {to}")]
    InvalidStateTransition {
        /// Task being transitioned.
        task_key: TaskKey,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// Deploy order can only be edited while a task is pending.
    #[error("task {task_key} is {status}, deploy order can only be edited while pending")]
    TaskNotPending {
        /// Task being edited.
        task_key: TaskKey,
        /// Current status.
        status: TaskStatus,
    },

    /// Deploy order can only be edited on a selected task.
    #[error("task {0} is not selected, deploy order can only be edited on selected tasks")]
    TaskNotSelected(TaskKey),

    /// The deploy order input is not a positive integer.
    #[error("invalid deploy order '{0}', expected a positive integer")]
    InvalidDeployOrder(String),

    /// No selected task is pending, sequenced and ungrouped.
    #[error("no eligible tasks for batch assignment")]
    NoEligibleTasks,

    /// The task key does not exist in the collection.
    #[error("task not found: {0}")]
    TaskNotFound(TaskKey),

    /// The task already belongs to a release batch.
    #[error("task {task_key} already belongs to batch {batch_key}")]
    AlreadyBatched {
        /// Task being stamped.
        task_key: TaskKey,
        /// Existing batch membership.
        batch_key: BatchKey,
    },
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing operation kinds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown operation kind: {0}")]
pub struct ParseOperationKindError(pub String);
