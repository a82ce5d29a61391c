//! Ordered set of task keys picked by the operator.

use super::{TaskCollection, TaskKey};

/// Tasks selected by the operator, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    keys: Vec<TaskKey>,
}

impl Selection {
    /// Creates an empty selection.
    #[must_use]
    pub const fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Returns `true` when `key` is selected.
    #[must_use]
    pub fn contains(&self, key: &TaskKey) -> bool {
        self.keys.contains(key)
    }

    /// Appends `key`; returns `false` when it was already selected.
    pub fn insert(&mut self, key: TaskKey) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Removes `key`; returns `false` when it was not selected.
    pub fn remove(&mut self, key: &TaskKey) -> bool {
        let before = self.keys.len();
        self.keys.retain(|selected| selected != key);
        before != self.keys.len()
    }

    /// Flips membership of `key`; returns `true` when it is now selected.
    pub fn toggle(&mut self, key: TaskKey) -> bool {
        if self.remove(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Clears the selection.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Drops keys that are not present in `tasks`.
    pub fn retain_existing(&mut self, tasks: &TaskCollection) {
        self.keys.retain(|key| tasks.contains(key));
    }

    /// Iterates keys in selection order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskKey> {
        self.keys.iter()
    }

    /// Returns the number of selected keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` when nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<TaskKey> for Selection {
    fn from_iter<I: IntoIterator<Item = TaskKey>>(iter: I) -> Self {
        let mut selection = Self::new();
        for key in iter {
            selection.insert(key);
        }
        selection
    }
}
