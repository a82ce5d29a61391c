//! Operation executor driving single-task state transitions.
//!
//! Execution runs in two phases. The prelude validates the operation against
//! the [`StatusRegistry`] and applies the in-progress status synchronously;
//! the resolution awaits the [`DeploymentBackend`] and applies its outcome.
//! Silent execution suppresses operator notifications but never a mutation.

use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use super::store::{TaskStore, TaskStoreError};
use crate::release::{
    domain::{DeploymentTask, OperationKind, StatusRegistry, TaskKey, TaskStatus},
    ports::{
        BackendError, DeploymentBackend, KeyValueStore, Notification, NotificationLevel, Notifier,
        OperationOutcome,
    },
};

/// Callback told when an operation starts (`true`) and stops (`false`)
/// being in flight.
pub type LoadingSink = Arc<dyn Fn(bool) + Send + Sync>;

/// Result of executing one operation on one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The task reached `status`.
    Completed(TaskStatus),
    /// The deploy failed; the task now carries `message`.
    Failed {
        /// Failure description.
        message: String,
    },
    /// The task was removed.
    Deleted,
    /// The operation is not offered for the task's status; nothing changed.
    NotApplicable {
        /// Status at the time of the request.
        status: TaskStatus,
    },
    /// The task disappeared before the operation resolved.
    Vanished,
}

impl ExecutionOutcome {
    /// Returns `true` when the operation ran to a resolution on a live task.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::Failed { .. } | Self::Deleted
        )
    }
}

/// Errors raised while executing an operation.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The task key is unknown.
    #[error("task not found: {0}")]
    TaskNotFound(TaskKey),
    /// Applying the mutation failed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Resets the loading sink on every exit path.
struct LoadingGuard(Option<LoadingSink>);

impl LoadingGuard {
    fn engage(sink: Option<LoadingSink>) -> Self {
        if let Some(sink) = &sink {
            sink(true);
        }
        Self(sink)
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if let Some(sink) = &self.0 {
            sink(false);
        }
    }
}

enum Prelude {
    Done(ExecutionOutcome),
    Resolve(InFlight),
}

/// An operation whose in-progress status has been applied.
struct InFlight {
    task: DeploymentTask,
    operation: OperationKind,
    intermediate: Option<TaskStatus>,
    _loading: LoadingGuard,
}

/// Executes operations against individual tasks.
pub struct OperationExecutor<S, C, B, N>
where
    S: KeyValueStore + 'static,
    C: Clock + Send + Sync,
    B: DeploymentBackend,
    N: Notifier,
{
    store: Arc<TaskStore<S, C>>,
    backend: Arc<B>,
    notifier: Arc<N>,
}

impl<S, C, B, N> OperationExecutor<S, C, B, N>
where
    S: KeyValueStore + 'static,
    C: Clock + Send + Sync,
    B: DeploymentBackend,
    N: Notifier,
{
    /// Creates an executor over an injected store, backend and notifier.
    #[must_use]
    pub const fn new(store: Arc<TaskStore<S, C>>, backend: Arc<B>, notifier: Arc<N>) -> Self {
        Self {
            store,
            backend,
            notifier,
        }
    }

    /// Returns the task store.
    #[must_use]
    pub const fn store(&self) -> &Arc<TaskStore<S, C>> {
        &self.store
    }

    /// Executes `operation` on the task with `task_key` and waits for it to
    /// resolve.
    ///
    /// Unless `silent`, the operator is told about the outcome; failures are
    /// reported exactly once here and then returned.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::TaskNotFound`] for an unknown key,
    /// [`ExecutorError::Backend`] when the backend call fails (the task is
    /// put back in its previous status) and [`ExecutorError::Store`] when a
    /// mutation cannot be applied.
    #[tracing::instrument(skip(self, task_key, on_loading), fields(task_key = %task_key))]
    pub async fn execute(
        &self,
        operation: OperationKind,
        task_key: &TaskKey,
        silent: bool,
        on_loading: Option<LoadingSink>,
    ) -> ExecutorResult<ExecutionOutcome> {
        match self.prelude(operation, task_key, silent, on_loading)? {
            Prelude::Done(outcome) => Ok(outcome),
            Prelude::Resolve(flight) => self.finish(flight, silent).await,
        }
    }

    /// Starts `operation` and resolves it on a background task.
    ///
    /// The in-progress status is applied before this returns, so callers may
    /// change the selection straight away without racing the task out of
    /// its pending order.
    #[must_use = "the handle reports the operation's outcome"]
    pub fn spawn(
        self: &Arc<Self>,
        operation: OperationKind,
        task_key: TaskKey,
        silent: bool,
    ) -> JoinHandle<ExecutorResult<ExecutionOutcome>>
    where
        C: 'static,
        B: 'static,
        N: 'static,
    {
        match self.prelude(operation, &task_key, silent, None) {
            Ok(Prelude::Resolve(flight)) => {
                let executor = Arc::clone(self);
                tokio::spawn(async move { executor.finish(flight, silent).await })
            }
            Ok(Prelude::Done(outcome)) => tokio::spawn(async move { Ok(outcome) }),
            Err(err) => tokio::spawn(async move { Err(err) }),
        }
    }

    fn prelude(
        &self,
        operation: OperationKind,
        task_key: &TaskKey,
        silent: bool,
        on_loading: Option<LoadingSink>,
    ) -> ExecutorResult<Prelude> {
        let task = match self.store.task(task_key) {
            Ok(Some(task)) => task,
            Ok(None) => {
                return Err(self.report_error(
                    ExecutorError::TaskNotFound(task_key.clone()),
                    operation,
                    silent,
                ));
            }
            Err(err) => return Err(self.report_error(err.into(), operation, silent)),
        };

        let status = task.status();
        if !StatusRegistry::is_applicable(status, operation) {
            tracing::debug!(%status, %operation, "operation not applicable");
            if !silent {
                self.notifier.notify(Notification::warning(format!(
                    "Cannot run {} for {}: task is {}",
                    operation.label(),
                    describe(&task),
                    status.label()
                )));
            }
            return Ok(Prelude::Done(ExecutionOutcome::NotApplicable { status }));
        }

        let loading = LoadingGuard::engage(on_loading);
        if operation == OperationKind::Delete {
            let outcome = match self.store.delete(task.key()) {
                Ok(true) => ExecutionOutcome::Deleted,
                Ok(false) => ExecutionOutcome::Vanished,
                Err(err) => return Err(self.report_error(err.into(), operation, silent)),
            };
            self.settle(&task, operation, &outcome, silent);
            return Ok(Prelude::Done(outcome));
        }

        let intermediate = operation.intermediate_status();
        if let Some(next) = intermediate {
            match self.store.transition(task.key(), next) {
                Ok(Some(_)) => tracing::debug!(status = %next, "operation in progress"),
                Ok(None) => {
                    let outcome = ExecutionOutcome::Vanished;
                    self.settle(&task, operation, &outcome, silent);
                    return Ok(Prelude::Done(outcome));
                }
                Err(err) => return Err(self.report_error(err.into(), operation, silent)),
            }
        }

        Ok(Prelude::Resolve(InFlight {
            task,
            operation,
            intermediate,
            _loading: loading,
        }))
    }

    async fn finish(&self, flight: InFlight, silent: bool) -> ExecutorResult<ExecutionOutcome> {
        let key = flight.task.key();
        let result = self.resolve(key, flight.operation).await;
        match result {
            Ok(outcome) => {
                self.settle(&flight.task, flight.operation, &outcome, silent);
                Ok(outcome)
            }
            Err(err) => {
                if let Some(intermediate) = flight.intermediate {
                    self.revert(&flight.task, intermediate);
                }
                Err(self.report_error(err, flight.operation, silent))
            }
        }
    }

    async fn resolve(
        &self,
        key: &TaskKey,
        operation: OperationKind,
    ) -> ExecutorResult<ExecutionOutcome> {
        let outcome = self.backend.submit_operation(key, operation).await?;
        let applied = match outcome {
            OperationOutcome::Transitioned(target) => self
                .store
                .transition(key, target)?
                .map(|_| ExecutionOutcome::Completed(target)),
            OperationOutcome::Failed { message } => self
                .store
                .record_failure(key, message.clone())?
                .map(|_| ExecutionOutcome::Failed { message }),
        };
        Ok(applied.unwrap_or(ExecutionOutcome::Vanished))
    }

    fn revert(&self, previous: &DeploymentTask, intermediate: TaskStatus) {
        match self.store.restore_status(previous, intermediate) {
            Ok(_) => tracing::debug!(
                status = %previous.status(),
                "restored status after aborted operation"
            ),
            Err(err) => {
                tracing::warn!(error = %err, "failed to restore status after aborted operation");
            }
        }
    }

    fn settle(
        &self,
        task: &DeploymentTask,
        operation: OperationKind,
        outcome: &ExecutionOutcome,
        silent: bool,
    ) {
        tracing::info!(?outcome, %operation, "operation resolved");
        if silent {
            return;
        }
        let subject = describe(task);
        let notification = match outcome {
            ExecutionOutcome::Completed(status) => Notification::success(format!(
                "{subject}: {} finished, task is {}",
                operation.label(),
                status.label()
            )),
            ExecutionOutcome::Failed { message } => {
                Notification::error(format!("{subject}: deployment failed: {message}"))
            }
            ExecutionOutcome::Deleted => Notification::success(format!("{subject} deleted")),
            ExecutionOutcome::Vanished => Notification::new(
                NotificationLevel::Info,
                format!("{subject} was removed before {} finished", operation.label()),
            ),
            ExecutionOutcome::NotApplicable { .. } => return,
        };
        self.notifier.notify(notification);
    }

    fn report_error(
        &self,
        err: ExecutorError,
        operation: OperationKind,
        silent: bool,
    ) -> ExecutorError {
        tracing::error!(error = %err, %operation, "operation failed");
        if !silent {
            self.notifier.notify(Notification::error(format!(
                "{} failed: {err}",
                capitalize(operation.label())
            )));
        }
        err
    }
}

fn describe(task: &DeploymentTask) -> String {
    format!("{} {}", task.app_name(), task.version())
}

pub(super) fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
