//! Release batch assignment and the derived batch view.
//!
//! Batch ordinals are never stored. They are derived on every read by
//! ranking the distinct batch keys by creation time, with the ungrouped
//! pseudo-batch always last.

use super::{
    BatchKey, DeploymentTask, Selection, TaskCollection, TaskCommand, TaskDomainError, TaskKey,
    TaskStatus, ordering::none_last, reduce,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Result of stamping selected tasks with a new batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAssignment {
    /// The new batch key.
    pub batch_key: BatchKey,
    /// Shared creation time of the batch.
    pub created_at: DateTime<Utc>,
    /// Member keys in selection order.
    pub members: Vec<TaskKey>,
    /// The updated collection.
    pub tasks: TaskCollection,
}

/// Returns `true` when `task` may join a new batch: it is selected,
/// pending, sequenced and not already a batch member.
#[must_use]
pub fn is_eligible_for_batch(task: &DeploymentTask, selection: &Selection) -> bool {
    selection.contains(task.key())
        && task.is_pending()
        && task.deploy_order().is_some()
        && task.batch_key().is_none()
}

/// Counts selected tasks that would join a batch submitted now.
#[must_use]
pub fn eligible_for_batch_count(collection: &TaskCollection, selection: &Selection) -> usize {
    collection
        .iter()
        .filter(|task| is_eligible_for_batch(task, selection))
        .count()
}

/// Stamps every eligible selected task with `batch_key` and `created_at`.
///
/// Selected tasks that already belong to a batch are left out; membership
/// never moves between batches.
///
/// # Errors
///
/// Returns [`TaskDomainError::NoEligibleTasks`] when no selected task is
/// eligible, in which case nothing is stamped.
pub fn assign_batch(
    collection: TaskCollection,
    selection: &Selection,
    batch_key: BatchKey,
    created_at: DateTime<Utc>,
) -> Result<BatchAssignment, TaskDomainError> {
    let members: Vec<TaskKey> = selection
        .iter()
        .filter(|key| {
            collection
                .get(key)
                .is_some_and(|task| is_eligible_for_batch(task, selection))
        })
        .cloned()
        .collect();
    if members.is_empty() {
        return Err(TaskDomainError::NoEligibleTasks);
    }

    let tasks = reduce(
        collection,
        TaskCommand::AssignBatch {
            keys: members.clone(),
            batch_key: batch_key.clone(),
            created_at,
        },
    )?;
    Ok(BatchAssignment {
        batch_key,
        created_at,
        members,
        tasks,
    })
}

/// Fills in missing batch creation times for batches loaded from legacy
/// data.
///
/// A batch where some member carries a creation time adopts the earliest
/// one; otherwise the earliest member deploy time is used. Batches with
/// neither stay unstamped.
#[must_use]
pub fn normalize_legacy_batches(mut collection: TaskCollection) -> TaskCollection {
    let mut stamps: HashMap<BatchKey, (Option<DateTime<Utc>>, Option<DateTime<Utc>>)> =
        HashMap::new();
    for task in collection.iter() {
        if let Some(batch_key) = task.batch_key() {
            let entry = stamps.entry(batch_key.clone()).or_default();
            entry.0 = earliest(entry.0, task.batch_created_at());
            entry.1 = earliest(entry.1, task.deploy_time());
        }
    }

    for task in collection.iter_mut() {
        let Some((created, deployed)) = task.batch_key().and_then(|key| stamps.get(key)) else {
            continue;
        };
        let resolved = created.or(*deployed);
        if resolved.is_some() && task.batch_created_at() != resolved {
            task.set_batch_created_at(resolved);
        }
    }
    collection
}

fn earliest(
    current: Option<DateTime<Utc>>,
    candidate: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (current, candidate) {
        (Some(current), Some(candidate)) => Some(current.min(candidate)),
        (current, candidate) => current.or(candidate),
    }
}

/// A release batch as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchView {
    /// One-based rank by creation time; the ungrouped group ranks last.
    pub ordinal: usize,
    /// Batch key, or `None` for the ungrouped group.
    pub batch_key: Option<BatchKey>,
    /// Shared creation time, if known.
    pub created_at: Option<DateTime<Utc>>,
    /// Members ordered by deploy order, unassigned last.
    pub members: Vec<DeploymentTask>,
}

impl BatchView {
    /// Returns `true` for the ungrouped pseudo-batch.
    #[must_use]
    pub const fn is_ungrouped(&self) -> bool {
        self.batch_key.is_none()
    }

    /// Returns the number of member tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.members.len()
    }

    /// Counts members per status.
    #[must_use]
    pub fn status_counts(&self) -> BTreeMap<TaskStatus, usize> {
        let mut counts = BTreeMap::new();
        for task in &self.members {
            *counts.entry(task.status()).or_insert(0) += 1;
        }
        counts
    }
}

/// Partitions the collection into batches with derived ordinals.
///
/// The derivation is a pure function of the stored batch keys and creation
/// times, so repeated calls on the same data yield identical ordinals.
#[must_use]
pub fn derive_batches(collection: &TaskCollection) -> Vec<BatchView> {
    let mut grouped: Vec<(BatchKey, Option<DateTime<Utc>>, Vec<DeploymentTask>)> = Vec::new();
    let mut ungrouped: Vec<DeploymentTask> = Vec::new();

    for task in collection.iter() {
        match task.batch_key() {
            Some(batch_key) => {
                if let Some(group) = grouped.iter_mut().find(|group| &group.0 == batch_key) {
                    group.1 = earliest(group.1, task.batch_created_at());
                    group.2.push(task.clone());
                } else {
                    grouped.push((
                        batch_key.clone(),
                        task.batch_created_at(),
                        vec![task.clone()],
                    ));
                }
            }
            None => ungrouped.push(task.clone()),
        }
    }

    grouped.sort_by(|left, right| {
        none_last(left.1, right.1).then_with(|| left.0.cmp(&right.0))
    });

    let mut views: Vec<BatchView> = grouped
        .into_iter()
        .enumerate()
        .map(|(index, (batch_key, created_at, members))| BatchView {
            ordinal: index + 1,
            batch_key: Some(batch_key),
            created_at,
            members: sort_members(members),
        })
        .collect();

    if !ungrouped.is_empty() {
        views.push(BatchView {
            ordinal: views.len() + 1,
            batch_key: None,
            created_at: None,
            members: sort_members(ungrouped),
        });
    }
    views
}

fn sort_members(mut members: Vec<DeploymentTask>) -> Vec<DeploymentTask> {
    members.sort_by(|left, right| none_last(left.deploy_order(), right.deploy_order()));
    members
}
