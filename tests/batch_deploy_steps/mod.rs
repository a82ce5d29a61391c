//! Step definitions for release batch deployment scenarios.

pub mod given;
pub mod world;
