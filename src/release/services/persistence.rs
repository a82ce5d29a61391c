//! Typed, corruption-tolerant persistence on top of a key-value store.
//!
//! Failures never reach the caller: missing or malformed values load as the
//! type's default, and failed writes are logged and skipped.

use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

use crate::release::ports::KeyValueStore;

/// Loads and saves JSON-encoded values through a [`KeyValueStore`].
#[derive(Debug)]
pub struct PersistenceAdapter<S>
where
    S: KeyValueStore,
{
    store: Arc<S>,
}

impl<S> PersistenceAdapter<S>
where
    S: KeyValueStore,
{
    /// Creates an adapter over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Loads the value stored under `key`.
    ///
    /// Returns `T::default()` when the value is absent, unreadable or does
    /// not decode.
    pub async fn load<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let raw = match self.store.read(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read persisted value, using default");
                return T::default();
            }
        };
        if raw.trim().is_empty() {
            return T::default();
        }
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(key, error = %err, "discarding malformed persisted value");
            T::default()
        })
    }

    /// Saves `value` under `key`.
    ///
    /// Returns `false` when the value was not written.
    pub async fn save<T>(&self, key: &str, value: &T) -> bool
    where
        T: Serialize + ?Sized + Sync,
    {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to encode value, write skipped");
                return false;
            }
        };
        match self.store.write(key, &encoded).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to persist value, write skipped");
                false
            }
        }
    }
}
