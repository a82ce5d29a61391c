//! Simulated deployment backend.
//!
//! Stands in for a real deployment API: operations resolve after a fixed
//! delay, and deploys fail at random with one of a small pool of messages.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::config::SimulationConfig;
use crate::release::{
    domain::{DeploymentTask, OperationKind, ReleaseTarget, TaskKey, TaskStatus},
    ports::{BackendError, BackendResult, DeploymentBackend, OperationOutcome},
};

/// Messages attached to simulated deploy failures.
pub const DEPLOY_FAILURE_MESSAGES: [&str; 5] = [
    "image pull failed: manifest unknown",
    "readiness probe failed on 2 of 3 replicas",
    "insufficient cluster resources: cpu quota exceeded",
    "config map validation failed",
    "health check timed out after 120s",
];

const SAMPLE_APPS: [&str; 6] = [
    "user-service",
    "order-service",
    "payment-gateway",
    "inventory-api",
    "notification-hub",
    "search-indexer",
];
const SAMPLE_CLUSTERS: [&str; 3] = ["cluster-east-1", "cluster-west-2", "cluster-central"];
const SAMPLE_ENVS: [&str; 3] = ["prod", "staging", "gray"];
const SAMPLE_DEPLOYERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// Backend with simulated latency and random deploy failures.
#[derive(Debug)]
pub struct SimulatedBackend {
    config: SimulationConfig,
    rng: Mutex<StdRng>,
    tasks: Vec<DeploymentTask>,
}

impl SimulatedBackend {
    /// Creates a backend seeded from system entropy with no tasks.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self::from_rng(config, StdRng::from_entropy())
    }

    /// Creates a backend with a deterministic random sequence.
    #[must_use]
    pub fn with_seed(config: SimulationConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(config: SimulationConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng: Mutex::new(rng),
            tasks: Vec::new(),
        }
    }

    /// Sets the tasks returned by [`DeploymentBackend::fetch_all_tasks`].
    #[must_use]
    pub fn with_tasks(mut self, tasks: Vec<DeploymentTask>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Populates the backend with `count` generated pending tasks.
    #[must_use]
    pub fn with_sample_tasks(mut self, count: usize) -> Self {
        let rng = self
            .rng
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        self.tasks = sample_tasks(count, rng);
        self
    }

    fn roll_deploy(&self) -> OperationOutcome {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if rng.gen_range(0..100_u8) < self.config.deploy_success_percent {
            return OperationOutcome::Transitioned(TaskStatus::Deployed);
        }
        let index = rng.gen_range(0..DEPLOY_FAILURE_MESSAGES.len());
        let message = DEPLOY_FAILURE_MESSAGES
            .get(index)
            .copied()
            .unwrap_or("deployment failed");
        OperationOutcome::Failed {
            message: message.to_owned(),
        }
    }

    const fn delay_for(&self, operation: OperationKind) -> Duration {
        match operation {
            OperationKind::Deploy => self.config.deploy_delay,
            OperationKind::Whitelist => self.config.whitelist_delay,
            OperationKind::Rollback => self.config.rollback_delay,
            OperationKind::VerifyPass | OperationKind::OpsIntervention | OperationKind::Delete => {
                Duration::ZERO
            }
        }
    }
}

#[async_trait]
impl DeploymentBackend for SimulatedBackend {
    async fn fetch_all_tasks(&self) -> BackendResult<Vec<DeploymentTask>> {
        Ok(self.tasks.clone())
    }

    async fn submit_operation(
        &self,
        task_key: &TaskKey,
        operation: OperationKind,
    ) -> BackendResult<OperationOutcome> {
        let Some(success_status) = operation.success_status() else {
            return Err(BackendError::Unsupported {
                task_key: task_key.clone(),
                operation,
            });
        };

        let delay = self.delay_for(operation);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = if operation == OperationKind::Deploy {
            self.roll_deploy()
        } else {
            OperationOutcome::Transitioned(success_status)
        };
        tracing::debug!(%task_key, %operation, ?outcome, "simulated operation resolved");
        Ok(outcome)
    }
}

/// Generates `count` pending tasks spread across sample applications.
pub fn sample_tasks(count: usize, rng: &mut impl Rng) -> Vec<DeploymentTask> {
    SAMPLE_APPS
        .iter()
        .cycle()
        .take(count)
        .enumerate()
        .map(|(index, app)| {
            let cluster = pick(&SAMPLE_CLUSTERS, rng);
            let env = pick(&SAMPLE_ENVS, rng);
            let deployer = pick(&SAMPLE_DEPLOYERS, rng);
            let patch: u32 = rng.gen_range(0..20);
            let target = ReleaseTarget::new(*app, format!("v1.{index}.{patch}"))
                .on_cluster(cluster, format!("{app}-{env}"))
                .in_env(env)
                .deployed_by(deployer);
            DeploymentTask::new(TaskKey::new(format!("task-{:04}", index + 1)), target)
        })
        .collect()
}

fn pick<'a>(values: &[&'a str], rng: &mut impl Rng) -> &'a str {
    values
        .get(rng.gen_range(0..values.len().max(1)))
        .copied()
        .unwrap_or_default()
}
