//! The task collection and its pure reducer.
//!
//! Every mutation of the collection is expressed as a [`TaskCommand`] and
//! applied by [`reduce`]. Commands addressed to a key that no longer exists
//! are no-ops, so late completions can never resurrect a removed task.

use super::{BatchKey, DeploymentTask, TaskDomainError, TaskKey, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered collection of tasks with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DeploymentTask>", into = "Vec<DeploymentTask>")]
pub struct TaskCollection {
    tasks: Vec<DeploymentTask>,
}

impl TaskCollection {
    /// Creates a collection, keeping the first task for any repeated key.
    #[must_use]
    pub fn new(tasks: Vec<DeploymentTask>) -> Self {
        let mut seen = HashSet::new();
        Self {
            tasks: tasks
                .into_iter()
                .filter(|task| seen.insert(task.key().clone()))
                .collect(),
        }
    }

    /// Returns the task with `key`.
    #[must_use]
    pub fn get(&self, key: &TaskKey) -> Option<&DeploymentTask> {
        self.tasks.iter().find(|task| task.key() == key)
    }

    /// Returns `true` when a task with `key` exists.
    #[must_use]
    pub fn contains(&self, key: &TaskKey) -> bool {
        self.get(key).is_some()
    }

    /// Iterates tasks in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &DeploymentTask> {
        self.tasks.iter()
    }

    /// Returns the tasks as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[DeploymentTask] {
        &self.tasks
    }

    /// Returns the number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` when the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Consumes the collection into its tasks.
    #[must_use]
    pub fn into_vec(self) -> Vec<DeploymentTask> {
        self.tasks
    }

    pub(crate) fn get_mut(&mut self, key: &TaskKey) -> Option<&mut DeploymentTask> {
        self.tasks.iter_mut().find(|task| task.key() == key)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut DeploymentTask> {
        self.tasks.iter_mut()
    }
}

impl From<Vec<DeploymentTask>> for TaskCollection {
    fn from(tasks: Vec<DeploymentTask>) -> Self {
        Self::new(tasks)
    }
}

impl From<TaskCollection> for Vec<DeploymentTask> {
    fn from(collection: TaskCollection) -> Self {
        collection.tasks
    }
}

impl FromIterator<DeploymentTask> for TaskCollection {
    fn from_iter<I: IntoIterator<Item = DeploymentTask>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A single mutation of the task collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    /// Replaces the task with the same key in place, or appends it.
    Upsert(DeploymentTask),
    /// Removes a task.
    Delete(TaskKey),
    /// Moves a task along a workflow edge.
    Transition {
        /// Task to move.
        key: TaskKey,
        /// Target status.
        status: TaskStatus,
        /// Time of the transition.
        at: DateTime<Utc>,
    },
    /// Marks a task failed with a message.
    RecordFailure {
        /// Task that failed.
        key: TaskKey,
        /// Failure description.
        message: String,
        /// Time of the failure.
        at: DateTime<Utc>,
    },
    /// Reverts a task to a snapshot taken before an aborted operation,
    /// provided it still holds the status the operation moved it to.
    RestoreStatus {
        /// Status the task must currently hold.
        expected: TaskStatus,
        /// Snapshot taken before the operation started.
        previous: DeploymentTask,
    },
    /// Stamps tasks with a shared batch key and creation time.
    AssignBatch {
        /// Member tasks.
        keys: Vec<TaskKey>,
        /// Batch identifier.
        batch_key: BatchKey,
        /// Shared creation time.
        created_at: DateTime<Utc>,
    },
}

/// Applies `command` to `collection`.
///
/// # Errors
///
/// Returns the domain error raised by the addressed task; the input
/// collection is consumed and no partial result is returned.
pub fn reduce(
    mut collection: TaskCollection,
    command: TaskCommand,
) -> Result<TaskCollection, TaskDomainError> {
    match command {
        TaskCommand::Upsert(task) => match collection.get_mut(task.key()) {
            Some(existing) => *existing = task,
            None => collection.tasks.push(task),
        },
        TaskCommand::Delete(key) => collection.tasks.retain(|task| task.key() != &key),
        TaskCommand::Transition { key, status, at } => {
            if let Some(task) = collection.get_mut(&key) {
                task.transition_to(status, at)?;
            }
        }
        TaskCommand::RecordFailure { key, message, at } => {
            if let Some(task) = collection.get_mut(&key) {
                task.record_failure(message, at)?;
            }
        }
        TaskCommand::RestoreStatus { expected, previous } => {
            if let Some(task) = collection
                .get_mut(previous.key())
                .filter(|task| task.status() == expected)
            {
                task.restore_status(&previous);
            }
        }
        TaskCommand::AssignBatch {
            keys,
            batch_key,
            created_at,
        } => {
            for key in &keys {
                if let Some(task) = collection.get_mut(key) {
                    task.join_batch(batch_key.clone(), created_at)?;
                }
            }
        }
    }
    Ok(collection)
}
