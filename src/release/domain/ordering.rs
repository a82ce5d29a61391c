//! Deploy-order allocation for selected pending tasks.
//!
//! After every call the selected pending tasks carry exactly the orders
//! `1..=N`. Unselected pending tasks carry none, and tasks outside
//! [`TaskStatus::Pending`](super::TaskStatus::Pending) keep whatever order
//! they had when they left it.

use super::{DeployOrder, Selection, TaskCollection, TaskDomainError, TaskKey};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Recomputes deploy orders for the whole collection.
///
/// Selected pending tasks are ranked by their existing order (unassigned
/// last), ties broken by collection position.
#[must_use]
pub fn reallocate_orders(mut collection: TaskCollection, selection: &Selection) -> TaskCollection {
    let mut candidates: Vec<(Option<DeployOrder>, usize)> = collection
        .iter()
        .enumerate()
        .filter(|(_, task)| task.is_pending() && selection.contains(task.key()))
        .map(|(position, task)| (task.deploy_order(), position))
        .collect();
    candidates.sort_by(|left, right| {
        none_last(left.0, right.0).then_with(|| left.1.cmp(&right.1))
    });

    let ranks: HashMap<usize, DeployOrder> = candidates
        .iter()
        .enumerate()
        .map(|(index, (_, position))| (*position, DeployOrder::from_rank(index + 1)))
        .collect();

    for (position, task) in collection.iter_mut().enumerate() {
        if task.is_pending() {
            task.set_deploy_order(ranks.get(&position).copied());
        }
    }
    collection
}

/// Applies an operator edit of one task's deploy order.
///
/// Empty input clears the order. When another selected pending task holds
/// the requested value, the two tasks swap their raw orders. Either way the
/// collection is then reallocated so orders stay dense.
///
/// # Errors
///
/// Returns [`TaskDomainError::TaskNotFound`] for an unknown key,
/// [`TaskDomainError::TaskNotPending`] when the task has left the pending
/// status, [`TaskDomainError::TaskNotSelected`] when it is not selected and
/// [`TaskDomainError::InvalidDeployOrder`] when the input is not a positive
/// integer.
pub fn edit_deploy_order(
    mut collection: TaskCollection,
    selection: &Selection,
    key: &TaskKey,
    input: &str,
) -> Result<TaskCollection, TaskDomainError> {
    let task = collection
        .get(key)
        .ok_or_else(|| TaskDomainError::TaskNotFound(key.clone()))?;
    if !task.is_pending() {
        return Err(TaskDomainError::TaskNotPending {
            task_key: key.clone(),
            status: task.status(),
        });
    }
    if !selection.contains(key) {
        return Err(TaskDomainError::TaskNotSelected(key.clone()));
    }
    let current = task.deploy_order();
    let target = DeployOrder::parse(input)?;

    if let Some(order) = target {
        let holder = collection
            .iter()
            .find(|other| {
                other.key() != key
                    && other.is_pending()
                    && selection.contains(other.key())
                    && other.deploy_order() == Some(order)
            })
            .map(|other| other.key().clone());
        if let Some(holder) = holder.and_then(|holder_key| collection.get_mut(&holder_key)) {
            holder.set_deploy_order(current);
        }
    }
    if let Some(task) = collection.get_mut(key) {
        task.set_deploy_order(target);
    }

    Ok(reallocate_orders(collection, selection))
}

/// Orders present values ascending with absent values last.
pub(super) fn none_last<T: Ord>(left: Option<T>, right: Option<T>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
