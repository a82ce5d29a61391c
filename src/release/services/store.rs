//! Authoritative task state container.
//!
//! The store owns the task collection, the operator selection and the batch
//! expansion state. Every mutation runs under one write lock and schedules a
//! debounced write of the whole state, so bursts of mutations persist only
//! their final result. Deploy orders are reallocated whenever the selection
//! changes or a selected task changes status.

use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use super::persistence::PersistenceAdapter;
use crate::config::PersistenceConfig;
use crate::release::{
    domain::{
        AvailableOperations, BatchAssignment, BatchKey, BatchView, DeploymentTask, Selection,
        StatusRegistry, TaskCollection, TaskCommand, TaskDomainError, TaskKey, TaskStatus,
        assign_batch, derive_batches, edit_deploy_order, eligible_for_batch_count,
        normalize_legacy_batches, reallocate_orders, reduce,
    },
    ports::{BackendError, DeploymentBackend, KeyValueStore},
};

/// Service-level errors for task store operations.
#[derive(Debug, Error)]
pub enum TaskStoreError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// Seeding from the backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// A writer panicked while holding the state lock.
    #[error("task store state lock poisoned: {0}")]
    Poisoned(String),
}

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Point-in-time copy of the store state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// All tasks in collection order.
    pub tasks: TaskCollection,
    /// Selected keys in selection order.
    pub selection: Selection,
    /// Keys of batches expanded in the operator view.
    pub expanded_batches: Vec<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: TaskCollection,
    selection: Selection,
    expanded_batches: Vec<String>,
}

impl StoreState {
    /// Applies a reducer command. Orders are recomputed when the command
    /// touched or removed a selected task; an unselected task returning to
    /// pending keeps its frozen order until it is selected again.
    fn commit(&mut self, command: TaskCommand) -> Result<(), TaskDomainError> {
        let touches_selection = self.touches_selection(&command);
        self.tasks = reduce(self.tasks.clone(), command)?;
        let selected = self.selection.len();
        self.selection.retain_existing(&self.tasks);
        if touches_selection || self.selection.len() != selected {
            self.reallocate();
        }
        Ok(())
    }

    fn touches_selection(&self, command: &TaskCommand) -> bool {
        let target = match command {
            TaskCommand::Upsert(task) => task.key(),
            TaskCommand::Transition { key, .. } | TaskCommand::RecordFailure { key, .. } => key,
            TaskCommand::RestoreStatus { previous, .. } => previous.key(),
            TaskCommand::Delete(_) | TaskCommand::AssignBatch { .. } => return false,
        };
        self.selection.contains(target)
    }

    fn reallocate(&mut self) {
        self.tasks = reallocate_orders(std::mem::take(&mut self.tasks), &self.selection);
    }
}

/// Owned, injectable task state container.
pub struct TaskStore<S, C>
where
    S: KeyValueStore + 'static,
    C: Clock + Send + Sync,
{
    state: Arc<RwLock<StoreState>>,
    persistence: Arc<PersistenceAdapter<S>>,
    clock: Arc<C>,
    config: PersistenceConfig,
    generation: Arc<AtomicU64>,
}

impl<S, C> TaskStore<S, C>
where
    S: KeyValueStore + 'static,
    C: Clock + Send + Sync,
{
    /// Creates an empty store persisting through `store`.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>, config: PersistenceConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            persistence: Arc::new(PersistenceAdapter::new(store)),
            clock,
            config,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the current time from the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Replaces the in-memory state with what durable storage holds.
    ///
    /// Missing or corrupt records load as empty. Legacy batches are
    /// normalised and the selection starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub async fn load(&self) -> TaskStoreResult<StoreSnapshot> {
        let tasks: Vec<DeploymentTask> = self.persistence.load(&self.config.tasks_key).await;
        let mut expanded: Vec<String> = self
            .persistence
            .load(&self.config.expanded_batches_key)
            .await;
        let mut seen = HashSet::new();
        expanded.retain(|key| seen.insert(key.clone()));
        let collection = normalize_legacy_batches(TaskCollection::new(tasks));

        {
            let mut state = self.write_state()?;
            state.selection.clear();
            state.tasks = collection;
            state.reallocate();
            state.expanded_batches = expanded;
        }
        let snapshot = self.snapshot()?;
        tracing::info!(tasks = snapshot.tasks.len(), "loaded task store");
        Ok(snapshot)
    }

    /// Loads durable state, seeding from `backend` when no task is stored.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Backend`] when the backend fetch fails.
    pub async fn load_or_seed<B>(&self, backend: &B) -> TaskStoreResult<StoreSnapshot>
    where
        B: DeploymentBackend + ?Sized,
    {
        let snapshot = self.load().await?;
        if !snapshot.tasks.is_empty() {
            return Ok(snapshot);
        }
        let fetched = backend.fetch_all_tasks().await?;
        tracing::info!(tasks = fetched.len(), "seeding task store from backend");
        self.mutate(|state| {
            state.tasks = normalize_legacy_batches(TaskCollection::new(fetched));
            state.reallocate();
            Ok(())
        })?;
        self.snapshot()
    }

    /// Returns a copy of the whole state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn snapshot(&self) -> TaskStoreResult<StoreSnapshot> {
        self.read(|state| StoreSnapshot {
            tasks: state.tasks.clone(),
            selection: state.selection.clone(),
            expanded_batches: state.expanded_batches.clone(),
        })
    }

    /// Returns a copy of the task collection.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn tasks(&self) -> TaskStoreResult<TaskCollection> {
        self.read(|state| state.tasks.clone())
    }

    /// Returns the task with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn task(&self, key: &TaskKey) -> TaskStoreResult<Option<DeploymentTask>> {
        self.read(|state| state.tasks.get(key).cloned())
    }

    /// Returns the current selection.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn selection(&self) -> TaskStoreResult<Selection> {
        self.read(|state| state.selection.clone())
    }

    /// Returns the selected tasks in selection order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn selected_tasks(&self) -> TaskStoreResult<Vec<DeploymentTask>> {
        self.read(|state| {
            state
                .selection
                .iter()
                .filter_map(|key| state.tasks.get(key).cloned())
                .collect()
        })
    }

    /// Derives the batch partition with ordinals.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn batches(&self) -> TaskStoreResult<Vec<BatchView>> {
        self.read(|state| derive_batches(&state.tasks))
    }

    /// Counts selected tasks eligible for a batch deploy.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn eligible_for_batch_count(&self) -> TaskStoreResult<usize> {
        self.read(|state| eligible_for_batch_count(&state.tasks, &state.selection))
    }

    /// Returns the operations offered for the task with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn available_operations(
        &self,
        key: &TaskKey,
    ) -> TaskStoreResult<Option<AvailableOperations>> {
        self.read(|state| {
            state
                .tasks
                .get(key)
                .map(|task| StatusRegistry::available_operations(task.status()))
        })
    }

    /// Applies a reducer command.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Domain`] when the reducer rejects the
    /// command; the state is left unchanged.
    pub fn apply(&self, command: TaskCommand) -> TaskStoreResult<()> {
        self.mutate(|state| Ok(state.commit(command)?))
    }

    /// Inserts or replaces a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn insert(&self, task: DeploymentTask) -> TaskStoreResult<()> {
        self.apply(TaskCommand::Upsert(task))
    }

    /// Removes a task; returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn delete(&self, key: &TaskKey) -> TaskStoreResult<bool> {
        self.mutate(|state| {
            if !state.tasks.contains(key) {
                return Ok(false);
            }
            state.commit(TaskCommand::Delete(key.clone()))?;
            Ok(true)
        })
    }

    /// Moves a task along a workflow edge.
    ///
    /// Returns `None` when the task no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Domain`] for an illegal transition.
    pub fn transition(
        &self,
        key: &TaskKey,
        status: TaskStatus,
    ) -> TaskStoreResult<Option<DeploymentTask>> {
        let at = self.now();
        self.apply_to_task(
            key,
            TaskCommand::Transition {
                key: key.clone(),
                status,
                at,
            },
        )
    }

    /// Marks a task failed with `message`.
    ///
    /// Returns `None` when the task no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Domain`] when the task cannot fail from its
    /// current status.
    pub fn record_failure(
        &self,
        key: &TaskKey,
        message: impl Into<String>,
    ) -> TaskStoreResult<Option<DeploymentTask>> {
        let at = self.now();
        self.apply_to_task(
            key,
            TaskCommand::RecordFailure {
                key: key.clone(),
                message: message.into(),
                at,
            },
        )
    }

    /// Reverts a task to the status held in `previous` if it still holds
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn restore_status(
        &self,
        previous: &DeploymentTask,
        expected: TaskStatus,
    ) -> TaskStoreResult<Option<DeploymentTask>> {
        self.apply_to_task(
            previous.key(),
            TaskCommand::RestoreStatus {
                expected,
                previous: previous.clone(),
            },
        )
    }

    fn apply_to_task(
        &self,
        key: &TaskKey,
        command: TaskCommand,
    ) -> TaskStoreResult<Option<DeploymentTask>> {
        self.mutate(|state| {
            if !state.tasks.contains(key) {
                return Ok(None);
            }
            state.commit(command)?;
            Ok(state.tasks.get(key).cloned())
        })
    }

    /// Adds `key` to the selection; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn select(&self, key: &TaskKey) -> TaskStoreResult<bool> {
        self.change_selection(|tasks, selection| {
            tasks.contains(key) && selection.insert(key.clone())
        })
    }

    /// Removes `key` from the selection.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn deselect(&self, key: &TaskKey) -> TaskStoreResult<bool> {
        self.change_selection(|_, selection| selection.remove(key))
    }

    /// Flips selection of `key`; returns `true` when it is now selected.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn toggle_selection(&self, key: &TaskKey) -> TaskStoreResult<bool> {
        self.change_selection(|tasks, selection| {
            tasks.contains(key) && selection.toggle(key.clone())
        })
    }

    /// Replaces the selection with `keys`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn set_selection<I>(&self, keys: I) -> TaskStoreResult<()>
    where
        I: IntoIterator<Item = TaskKey>,
    {
        self.change_selection(|tasks, selection| {
            *selection = keys.into_iter().filter(|key| tasks.contains(key)).collect();
        })
    }

    /// Selects every pending task in collection order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn select_all_pending(&self) -> TaskStoreResult<()> {
        self.change_selection(|tasks, selection| {
            for task in tasks.iter().filter(|task| task.is_pending()) {
                selection.insert(task.key().clone());
            }
        })
    }

    /// Clears the selection.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn clear_selection(&self) -> TaskStoreResult<()> {
        self.change_selection(|_, selection| selection.clear())
    }

    fn change_selection<T>(
        &self,
        change: impl FnOnce(&TaskCollection, &mut Selection) -> T,
    ) -> TaskStoreResult<T> {
        self.mutate(|state| {
            let result = change(&state.tasks, &mut state.selection);
            state.reallocate();
            Ok(result)
        })
    }

    /// Applies an operator edit of a task's deploy order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Domain`] when the task is unknown, not
    /// pending or not selected, or the input is not a positive integer.
    pub fn edit_deploy_order(&self, key: &TaskKey, input: &str) -> TaskStoreResult<()> {
        self.mutate(|state| {
            state.tasks = edit_deploy_order(state.tasks.clone(), &state.selection, key, input)?;
            Ok(())
        })
    }

    /// Groups the eligible selected tasks into a new release batch.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Domain`] with
    /// [`TaskDomainError::NoEligibleTasks`] when nothing is eligible; the
    /// state is left unchanged.
    pub fn assign_batch(&self) -> TaskStoreResult<BatchAssignment> {
        let created_at = self.now();
        let batch_key = BatchKey::generate(created_at, &mut rand::thread_rng());
        self.mutate(|state| {
            let assignment =
                assign_batch(state.tasks.clone(), &state.selection, batch_key, created_at)?;
            state.tasks = assignment.tasks.clone();
            tracing::info!(
                batch_key = %assignment.batch_key,
                members = assignment.members.len(),
                "assigned release batch"
            );
            Ok(assignment)
        })
    }

    /// Flips the expanded flag of a batch; returns `true` when expanded.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn toggle_batch_expansion(&self, batch_key: &str) -> TaskStoreResult<bool> {
        self.mutate(|state| {
            let before = state.expanded_batches.len();
            state.expanded_batches.retain(|key| key != batch_key);
            if before != state.expanded_batches.len() {
                return Ok(false);
            }
            state.expanded_batches.push(batch_key.to_owned());
            Ok(true)
        })
    }

    /// Returns `true` when the batch is expanded.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Poisoned`] when the state lock is poisoned.
    pub fn is_batch_expanded(&self, batch_key: &str) -> TaskStoreResult<bool> {
        self.read(|state| state.expanded_batches.iter().any(|key| key == batch_key))
    }

    /// Writes the current state immediately, cancelling pending debounced
    /// writes.
    ///
    /// Returns `false` when any record was not written.
    pub async fn flush(&self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        persist(&self.state, &self.persistence, &self.config).await
    }

    fn read<T>(&self, view: impl FnOnce(&StoreState) -> T) -> TaskStoreResult<T> {
        let state = self
            .state
            .read()
            .map_err(|err| TaskStoreError::Poisoned(err.to_string()))?;
        Ok(view(&state))
    }

    fn write_state(&self) -> TaskStoreResult<std::sync::RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|err| TaskStoreError::Poisoned(err.to_string()))
    }

    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut StoreState) -> TaskStoreResult<T>,
    ) -> TaskStoreResult<T> {
        let result = {
            let mut state = self.write_state()?;
            change(&mut state)?
        };
        self.schedule_persist();
        Ok(result)
    }

    fn schedule_persist(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no async runtime, persistence deferred until flush");
            return;
        };
        let latest = Arc::clone(&self.generation);
        let state = Arc::clone(&self.state);
        let persistence = Arc::clone(&self.persistence);
        let config = self.config.clone();
        runtime.spawn(async move {
            tokio::time::sleep(config.debounce).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }
            persist(&state, &persistence, &config).await;
        });
    }
}

async fn persist<S>(
    state: &RwLock<StoreState>,
    persistence: &PersistenceAdapter<S>,
    config: &PersistenceConfig,
) -> bool
where
    S: KeyValueStore,
{
    let Some((tasks, expanded)) = durable_view(state) else {
        tracing::warn!("task store state lock poisoned, write skipped");
        return false;
    };
    let tasks_written = persistence.save(&config.tasks_key, &tasks).await;
    let expanded_written = persistence
        .save(&config.expanded_batches_key, &expanded)
        .await;
    tracing::debug!(tasks = tasks.len(), tasks_written, expanded_written, "persisted task store");
    tasks_written && expanded_written
}

fn durable_view(state: &RwLock<StoreState>) -> Option<(TaskCollection, Vec<String>)> {
    let guard = state.read().ok()?;
    Some((guard.tasks.clone(), guard.expanded_batches.clone()))
}
