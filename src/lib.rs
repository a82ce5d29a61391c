//! Convoy: release-batch tracking for application deployment tasks.
//!
//! This crate tracks deployment tasks as they move through a fixed release
//! workflow, lets an operator sequence selected tasks, groups them into
//! release batches and drives their state transitions against a backend.
//!
//! # Architecture
//!
//! Convoy follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic and reducers with no infrastructure
//!   dependencies
//! - **Ports**: Abstract trait interfaces for persistence, the deployment
//!   backend and operator notifications
//! - **Adapters**: Concrete implementations of ports (files, memory,
//!   simulation)
//!
//! # Modules
//!
//! - [`release`]: Task lifecycle, deploy ordering, batching and execution
//! - [`config`]: Runtime configuration for simulation and persistence
//! - [`telemetry`]: Tracing subscriber initialisation

pub mod config;
pub mod release;
pub mod telemetry;
