//! File-backed adapters.

mod key_value;

pub use key_value::FileKeyValueStore;
