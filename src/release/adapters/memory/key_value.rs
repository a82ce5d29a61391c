//! In-memory key-value store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::release::ports::{KeyValueStore, KeyValueStoreError, KeyValueStoreResult};

/// Thread-safe in-memory key-value store.
///
/// Clones share the same underlying map, so tests can inspect what a
/// service wrote.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStore {
    state: Arc<RwLock<InMemoryKeyValueState>>,
}

#[derive(Debug, Default)]
struct InMemoryKeyValueState {
    entries: HashMap<String, String>,
    writes: usize,
}

impl InMemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with one raw entry.
    #[must_use]
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut state = InMemoryKeyValueState::default();
        state.entries.insert(key.into(), value.into());
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Returns the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError::Persistence`] when the lock is poisoned.
    pub fn raw(&self, key: &str) -> KeyValueStoreResult<Option<String>> {
        let state = self.state.read().map_err(|err| {
            KeyValueStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.entries.get(key).cloned())
    }

    /// Returns how many writes have been performed.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError::Persistence`] when the lock is poisoned.
    pub fn write_count(&self) -> KeyValueStoreResult<usize> {
        let state = self.state.read().map_err(|err| {
            KeyValueStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.writes)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn read(&self, key: &str) -> KeyValueStoreResult<Option<String>> {
        self.raw(key)
    }

    async fn write(&self, key: &str, value: &str) -> KeyValueStoreResult<()> {
        let mut state = self.state.write().map_err(|err| {
            KeyValueStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        state.entries.insert(key.to_owned(), value.to_owned());
        state.writes += 1;
        Ok(())
    }
}
