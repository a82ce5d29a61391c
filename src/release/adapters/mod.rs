//! Adapter implementations for release workflow ports.

pub mod file;
pub mod memory;
pub mod simulated;
pub mod tracing_notifier;
