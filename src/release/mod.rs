//! Release workflow management for deployment tasks.
//!
//! This module tracks deployment tasks through the release state machine,
//! keeps the deploy order of selected pending tasks dense, groups sequenced
//! tasks into release batches and drives operations against a deployment
//! backend. The module follows hexagonal architecture:
//!
//! - Domain types and pure reducers in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
