//! Batch operation coordinator.
//!
//! Fans one operator action out over the selection through the
//! [`OperationExecutor`] in silent mode and reports a single aggregate
//! notification per action.

use futures::future::join_all;
use mockable::Clock;
use std::cmp::Reverse;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use super::executor::{ExecutionOutcome, ExecutorResult, OperationExecutor, capitalize};
use super::store::{TaskStore, TaskStoreError};
use crate::release::{
    domain::{BatchKey, DeploymentTask, OperationKind, StatusRegistry, TaskDomainError, TaskKey},
    ports::{DeploymentBackend, KeyValueStore, Notification, Notifier},
};

/// Errors raised when a batch action cannot be dispatched.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No selected task accepts the operation.
    #[error("{operation} is not applicable to any of the {inapplicable} selected tasks")]
    NothingApplicable {
        /// Requested operation.
        operation: OperationKind,
        /// Number of selected tasks that rejected it.
        inapplicable: usize,
    },
    /// No selected task is pending with a deploy order and outside a batch.
    #[error("no selected task is eligible for a batch deploy")]
    NoEligibleTasks,
    /// Reading or updating the store failed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Completion state of a dispatched batch action.
#[derive(Debug)]
pub enum BatchCompletion {
    /// Fire-and-forget executions in dispatch order; await the handles to
    /// observe them.
    InFlight(Vec<JoinHandle<ExecutorResult<ExecutionOutcome>>>),
    /// Every execution has finished.
    Settled {
        /// Executions that resolved without error.
        succeeded: usize,
        /// Executions that returned an error.
        failed: usize,
    },
}

/// Summary of one dispatched batch action.
#[derive(Debug)]
pub struct BatchDispatch {
    /// Dispatched operation.
    pub operation: OperationKind,
    /// Tasks the operation was started for, in selection order.
    pub dispatched: Vec<TaskKey>,
    /// Selected tasks skipped because the operation did not apply.
    pub inapplicable: usize,
    /// Batch created for a batch deploy.
    pub batch_key: Option<BatchKey>,
    /// Completion state.
    pub completion: BatchCompletion,
}

/// Runs operator actions over the current selection.
pub struct BatchOperationCoordinator<S, C, B, N>
where
    S: KeyValueStore + 'static,
    C: Clock + Send + Sync + 'static,
    B: DeploymentBackend + 'static,
    N: Notifier + 'static,
{
    store: Arc<TaskStore<S, C>>,
    executor: Arc<OperationExecutor<S, C, B, N>>,
    notifier: Arc<N>,
}

impl<S, C, B, N> BatchOperationCoordinator<S, C, B, N>
where
    S: KeyValueStore + 'static,
    C: Clock + Send + Sync + 'static,
    B: DeploymentBackend + 'static,
    N: Notifier + 'static,
{
    /// Creates a coordinator sharing the executor's store.
    #[must_use]
    pub fn new(executor: Arc<OperationExecutor<S, C, B, N>>, notifier: Arc<N>) -> Self {
        Self {
            store: Arc::clone(executor.store()),
            executor,
            notifier,
        }
    }

    /// Returns the executor used for individual tasks.
    #[must_use]
    pub const fn executor(&self) -> &Arc<OperationExecutor<S, C, B, N>> {
        &self.executor
    }

    /// Runs `operation` on every selected task that accepts it.
    ///
    /// Deploys are dispatched without waiting and reported immediately;
    /// every other operation is awaited and reported once as a whole. The
    /// selection is cleared after dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NothingApplicable`] when no selected task
    /// accepts the operation; nothing is mutated.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, operation: OperationKind) -> CoordinatorResult<BatchDispatch> {
        let (applicable, inapplicable) = self.partition(operation)?;
        if applicable.is_empty() {
            let err = CoordinatorError::NothingApplicable {
                operation,
                inapplicable,
            };
            tracing::warn!(error = %err, "batch action aborted");
            self.notifier.notify(Notification::warning(format!(
                "{} is not available for the {inapplicable} selected tasks",
                capitalize(operation.label())
            )));
            return Err(err);
        }

        if operation == OperationKind::Deploy {
            let handles = self.dispatch(operation, &applicable)?;
            self.notifier.notify(Notification::success(format!(
                "Deployment started for {} tasks{}",
                applicable.len(),
                skipped_suffix(inapplicable)
            )));
            self.store.clear_selection()?;
            return Ok(BatchDispatch {
                operation,
                dispatched: applicable,
                inapplicable,
                batch_key: None,
                completion: BatchCompletion::InFlight(handles),
            });
        }

        let results = join_all(
            applicable
                .iter()
                .map(|key| self.executor.execute(operation, key, true, None)),
        )
        .await;
        let failed = results.iter().filter(|result| result.is_err()).count();
        let succeeded = results.len() - failed;
        tracing::info!(succeeded, failed, %operation, "batch action settled");
        if failed == 0 {
            self.notifier.notify(Notification::success(format!(
                "{} finished for {succeeded} tasks{}",
                capitalize(operation.label()),
                skipped_suffix(inapplicable)
            )));
        } else {
            self.notifier.notify(Notification::error(format!(
                "{} failed for {failed} of {} tasks",
                capitalize(operation.label()),
                results.len()
            )));
        }
        self.store.clear_selection()?;
        Ok(BatchDispatch {
            operation,
            dispatched: applicable,
            inapplicable,
            batch_key: None,
            completion: BatchCompletion::Settled { succeeded, failed },
        })
    }

    /// Groups the eligible selection into a new batch and deploys it.
    ///
    /// Members are started in selection order without waiting for them to
    /// resolve.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NoEligibleTasks`] when no selected task
    /// is pending with a deploy order and outside every batch; nothing is
    /// mutated.
    #[tracing::instrument(skip(self))]
    pub fn submit_batch_deploy(&self) -> CoordinatorResult<BatchDispatch> {
        let assignment = match self.store.assign_batch() {
            Ok(assignment) => assignment,
            Err(TaskStoreError::Domain(TaskDomainError::NoEligibleTasks)) => {
                tracing::warn!("batch deploy aborted, nothing eligible");
                self.notifier.notify(Notification::warning(
                    "Select pending tasks with a deploy order before submitting a batch",
                ));
                return Err(CoordinatorError::NoEligibleTasks);
            }
            Err(err) => return Err(err.into()),
        };

        let handles = self.dispatch(OperationKind::Deploy, &assignment.members)?;
        self.notifier.notify(Notification::success(format!(
            "Batch {} submitted with {} tasks",
            assignment.batch_key,
            assignment.members.len()
        )));
        self.store.clear_selection()?;
        Ok(BatchDispatch {
            operation: OperationKind::Deploy,
            dispatched: assignment.members,
            inapplicable: 0,
            batch_key: Some(assignment.batch_key),
            completion: BatchCompletion::InFlight(handles),
        })
    }

    fn partition(&self, operation: OperationKind) -> CoordinatorResult<(Vec<TaskKey>, usize)> {
        let selected = self.store.selected_tasks()?;
        let total = selected.len();
        let applicable: Vec<TaskKey> = selected
            .into_iter()
            .filter(|task| StatusRegistry::is_applicable(task.status(), operation))
            .map(|task| task.key().clone())
            .collect();
        let inapplicable = total - applicable.len();
        Ok((applicable, inapplicable))
    }

    /// Starts `operation` for every key, highest deploy order first.
    ///
    /// Each start moves a selected task out of pending and reallocates the
    /// remaining orders; taking the highest first leaves the orders of the
    /// tasks still waiting untouched.
    fn dispatch(
        &self,
        operation: OperationKind,
        keys: &[TaskKey],
    ) -> CoordinatorResult<Vec<JoinHandle<ExecutorResult<ExecutionOutcome>>>> {
        let tasks = self.store.tasks()?;
        let mut sequence: Vec<&TaskKey> = keys.iter().collect();
        sequence.sort_by_key(|key| {
            Reverse(tasks.get(key).and_then(DeploymentTask::deploy_order))
        });
        Ok(sequence
            .into_iter()
            .map(|key| self.executor.spawn(operation, key.clone(), true))
            .collect())
    }
}

fn skipped_suffix(inapplicable: usize) -> String {
    if inapplicable == 0 {
        String::new()
    } else {
        format!(", {inapplicable} skipped")
    }
}
