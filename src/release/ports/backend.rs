//! Deployment backend port.
//!
//! The core depends only on these two calls, so a simulated backend can be
//! swapped for a real API without changing executor control flow.

use crate::release::domain::{DeploymentTask, OperationKind, TaskKey, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Resolution of a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The task reached `status`.
    Transitioned(TaskStatus),
    /// The deploy failed with a descriptive message.
    Failed {
        /// Failure description.
        message: String,
    },
}

/// Remote task store and operation executor.
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Fetches every known task snapshot.
    async fn fetch_all_tasks(&self) -> BackendResult<Vec<DeploymentTask>>;

    /// Submits `operation` for a task and waits for its resolution.
    async fn submit_operation(
        &self,
        task_key: &TaskKey,
        operation: OperationKind,
    ) -> BackendResult<OperationOutcome>;
}

/// Errors returned by backend implementations.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend does not handle this operation.
    #[error("operation {operation} is not handled by the backend for task {task_key}")]
    Unsupported {
        /// Task addressed.
        task_key: TaskKey,
        /// Rejected operation.
        operation: OperationKind,
    },

    /// Transport or remote failure.
    #[error("backend unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl BackendError {
    /// Wraps a transport error.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
