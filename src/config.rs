//! Runtime configuration for the simulated backend and task persistence.

use std::time::Duration;

/// Top-level configuration for a Convoy session.
///
/// # Examples
///
/// ```
/// use convoy::config::ConvoyConfig;
///
/// let config = ConvoyConfig::default();
/// assert_eq!(config.simulation.deploy_success_percent, 80);
/// assert_eq!(config.log_filter, "info");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvoyConfig {
    /// Simulated backend behaviour.
    pub simulation: SimulationConfig,
    /// Durable persistence behaviour.
    pub persistence: PersistenceConfig,
    /// Default `tracing` filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,
}

impl Default for ConvoyConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            persistence: PersistenceConfig::default(),
            log_filter: "info".to_owned(),
        }
    }
}

/// Latency and failure profile of the simulated deployment backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Round-trip delay before a deploy resolves.
    pub deploy_delay: Duration,
    /// Round-trip delay before a whitelist approval resolves.
    pub whitelist_delay: Duration,
    /// Round-trip delay before a rollback resolves.
    pub rollback_delay: Duration,
    /// Probability, in percent, that a deploy succeeds.
    pub deploy_success_percent: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            deploy_delay: Duration::from_secs(2),
            whitelist_delay: Duration::from_millis(1500),
            rollback_delay: Duration::from_secs(2),
            deploy_success_percent: 80,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration with no simulated latency.
    ///
    /// Useful for tests that should not wait on timers.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            deploy_delay: Duration::ZERO,
            whitelist_delay: Duration::ZERO,
            rollback_delay: Duration::ZERO,
            deploy_success_percent: 80,
        }
    }

    /// Overrides the deploy success probability (clamped to 100).
    #[must_use]
    pub fn with_deploy_success_percent(mut self, percent: u8) -> Self {
        self.deploy_success_percent = percent.min(100);
        self
    }
}

/// Persistence keys and write coalescing window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Quiet period after the last mutation before state is written.
    pub debounce: Duration,
    /// Key holding the task snapshot array.
    pub tasks_key: String,
    /// Key holding the expanded batch key array.
    pub expanded_batches_key: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            tasks_key: "deployment-tasks".to_owned(),
            expanded_batches_key: "expanded-batches".to_owned(),
        }
    }
}
