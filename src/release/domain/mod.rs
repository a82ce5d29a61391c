//! Domain model for release workflow management.
//!
//! The release domain models the task lifecycle state machine, deploy-order
//! allocation and batch assignment as pure types and reducers, keeping all
//! infrastructure concerns outside of the domain boundary.

mod batch;
mod collection;
mod error;
mod ids;
mod operation;
mod ordering;
mod registry;
mod selection;
mod status;
mod task;

pub use batch::{
    BatchAssignment, BatchView, assign_batch, derive_batches, eligible_for_batch_count,
    is_eligible_for_batch, normalize_legacy_batches,
};
pub use collection::{TaskCollection, TaskCommand, reduce};
pub use error::{ParseOperationKindError, ParseTaskStatusError, TaskDomainError};
pub use ids::{BatchKey, DeployOrder, TaskKey};
pub use operation::OperationKind;
pub use ordering::{edit_deploy_order, reallocate_orders};
pub use registry::{AvailableOperations, OperationAffordance, StatusRegistry};
pub use selection::Selection;
pub use status::TaskStatus;
pub use task::{DeploymentTask, ReleaseTarget};
