//! Port contracts for release workflow management.
//!
//! Ports define infrastructure-agnostic interfaces used by release services.

pub mod backend;
pub mod key_value;
pub mod notifier;

pub use backend::{BackendError, BackendResult, DeploymentBackend, OperationOutcome};
pub use key_value::{KeyValueStore, KeyValueStoreError, KeyValueStoreResult};
pub use notifier::{Notification, NotificationLevel, Notifier};

#[cfg(test)]
pub use key_value::MockKeyValueStore;
