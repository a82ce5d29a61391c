//! Shared world state for release batch deployment BDD scenarios.

use std::sync::Arc;

use convoy::config::{PersistenceConfig, SimulationConfig};
use convoy::release::{
    adapters::{
        memory::{InMemoryKeyValueStore, RecordingNotifier},
        simulated::SimulatedBackend,
    },
    services::{
        BatchCompletion, BatchOperationCoordinator, CoordinatorError, OperationExecutor,
        TaskStore,
    },
};
use mockable::DefaultClock;
use rstest::fixture;

/// Store type used by the BDD world.
pub type TestStore = TaskStore<InMemoryKeyValueStore, DefaultClock>;

/// Coordinator type used by the BDD world.
pub type TestCoordinator =
    BatchOperationCoordinator<InMemoryKeyValueStore, DefaultClock, SimulatedBackend, RecordingNotifier>;

/// Scenario world for batch deployment behaviour tests.
pub struct BatchDeployWorld {
    pub store: Arc<TestStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub coordinator: TestCoordinator,
    pub in_flight: Option<BatchCompletion>,
    pub last_error: Option<CoordinatorError>,
}

impl BatchDeployWorld {
    /// Creates a world whose deploys succeed `deploy_success_percent` of
    /// the time.
    #[must_use]
    pub fn with_success_percent(deploy_success_percent: u8) -> Self {
        let store = Arc::new(TaskStore::new(
            Arc::new(InMemoryKeyValueStore::new()),
            Arc::new(DefaultClock),
            PersistenceConfig::default(),
        ));
        let backend = SimulatedBackend::with_seed(
            SimulationConfig::immediate().with_deploy_success_percent(deploy_success_percent),
            11,
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let executor = Arc::new(OperationExecutor::new(
            Arc::clone(&store),
            Arc::new(backend),
            Arc::clone(&notifier),
        ));
        let coordinator = BatchOperationCoordinator::new(executor, Arc::clone(&notifier));

        Self {
            store,
            notifier,
            coordinator,
            in_flight: None,
            last_error: None,
        }
    }
}

impl Default for BatchDeployWorld {
    fn default() -> Self {
        Self::with_success_percent(100)
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> BatchDeployWorld {
    BatchDeployWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
