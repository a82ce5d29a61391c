//! In-memory adapters for tests and local sessions.

mod key_value;
mod notifier;

pub use key_value::InMemoryKeyValueStore;
pub use notifier::RecordingNotifier;
