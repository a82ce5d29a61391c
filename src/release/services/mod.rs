//! Service layer orchestrating release workflow operations.

pub mod coordinator;
pub mod executor;
pub mod persistence;
pub mod store;

pub use coordinator::{
    BatchCompletion, BatchDispatch, BatchOperationCoordinator, CoordinatorError,
    CoordinatorResult,
};
pub use executor::{
    ExecutionOutcome, ExecutorError, ExecutorResult, LoadingSink, OperationExecutor,
};
pub use persistence::PersistenceAdapter;
pub use store::{StoreSnapshot, TaskStore, TaskStoreError, TaskStoreResult};
