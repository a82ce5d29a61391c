//! Runs one release session against the simulated deployment backend.
//!
//! Usage:
//!
//! ```text
//! convoy-demo [state-dir] [task-count]
//! ```
//!
//! State is kept as JSON files under `state-dir` (default `.convoy`). On the
//! first run the store is seeded with `task-count` sample tasks (default 8).
//! Every pending task is then selected, grouped into a release batch and
//! deployed; the resulting batch layout is logged once all deploys resolve.
//! Set `RUST_LOG` to override the default log filter.

use camino::Utf8PathBuf;
use convoy::config::ConvoyConfig;
use convoy::release::adapters::file::FileKeyValueStore;
use convoy::release::adapters::simulated::SimulatedBackend;
use convoy::release::adapters::tracing_notifier::TracingNotifier;
use convoy::release::domain::BatchKey;
use convoy::release::ports::KeyValueStoreError;
use convoy::release::services::{
    BatchCompletion, BatchOperationCoordinator, CoordinatorError, ExecutionOutcome,
    ExecutorResult, OperationExecutor, TaskStore, TaskStoreError,
};
use convoy::telemetry::{TelemetryError, init_tracing};
use mockable::DefaultClock;
use std::env;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Builder;
use tokio::task::JoinHandle;

const DEFAULT_STATE_DIR: &str = ".convoy";
const DEFAULT_TASK_COUNT: usize = 8;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can end a demo session.
#[derive(Debug, Error)]
enum DemoError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to open state directory: {0}")]
    State(#[from] KeyValueStoreError),
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] std::io::Error),
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
}

#[derive(Debug)]
struct DemoArgs {
    state_dir: Utf8PathBuf,
    task_count: usize,
}

fn main() -> Result<(), BoxError> {
    let config = ConvoyConfig::default();
    init_tracing(&config.log_filter).map_err(DemoError::from)?;
    let args = parse_args(env::args().skip(1))?;
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(DemoError::RuntimeInit)?;
    runtime.block_on(run_session(config, args))?;
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<DemoArgs, DemoError> {
    let state_dir = args
        .next()
        .map_or_else(|| Utf8PathBuf::from(DEFAULT_STATE_DIR), Utf8PathBuf::from);
    let task_count = args
        .next()
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|_| DemoError::InvalidArgs(format!("'{raw}' is not a task count")))
        })
        .transpose()?
        .unwrap_or(DEFAULT_TASK_COUNT);
    if let Some(extra) = args.next() {
        return Err(DemoError::InvalidArgs(format!(
            "unexpected argument '{extra}'"
        )));
    }
    Ok(DemoArgs {
        state_dir,
        task_count,
    })
}

async fn run_session(config: ConvoyConfig, args: DemoArgs) -> Result<(), DemoError> {
    let key_value = Arc::new(FileKeyValueStore::open(&args.state_dir)?);
    let store = Arc::new(TaskStore::new(
        key_value,
        Arc::new(DefaultClock),
        config.persistence.clone(),
    ));
    let backend = Arc::new(
        SimulatedBackend::new(config.simulation.clone()).with_sample_tasks(args.task_count),
    );
    let notifier = Arc::new(TracingNotifier);
    let snapshot = store.load_or_seed(backend.as_ref()).await?;
    tracing::info!(
        state_dir = %args.state_dir,
        tasks = snapshot.tasks.len(),
        "release session started"
    );

    let executor = Arc::new(OperationExecutor::new(
        Arc::clone(&store),
        backend,
        Arc::clone(&notifier),
    ));
    let coordinator = BatchOperationCoordinator::new(executor, notifier);

    store.select_all_pending()?;
    match coordinator.submit_batch_deploy() {
        Ok(dispatch) => {
            if let BatchCompletion::InFlight(handles) = dispatch.completion {
                await_deploys(handles).await;
            }
        }
        Err(CoordinatorError::NoEligibleTasks) => {
            tracing::info!("no pending tasks left to deploy");
        }
        Err(err) => return Err(err.into()),
    }

    for batch in store.batches()? {
        tracing::info!(
            ordinal = batch.ordinal,
            batch_key = batch.batch_key.as_ref().map_or("ungrouped", BatchKey::as_str),
            tasks = batch.task_count(),
            statuses = ?batch.status_counts(),
            "release batch"
        );
    }
    if !store.flush().await {
        tracing::warn!("final state was not fully written");
    }
    Ok(())
}

async fn await_deploys(handles: Vec<JoinHandle<ExecutorResult<ExecutionOutcome>>>) {
    for handle in handles {
        match handle.await {
            Ok(Ok(outcome)) => tracing::debug!(?outcome, "deploy settled"),
            Ok(Err(err)) => tracing::warn!(error = %err, "deploy failed to apply"),
            Err(err) => tracing::error!(error = %err, "deploy task aborted"),
        }
    }
}
