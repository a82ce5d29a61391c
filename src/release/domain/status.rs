//! Task lifecycle status and the workflow transition graph.

use super::ParseTaskStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a deployment task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task is waiting to be sequenced and deployed.
    Pending,
    /// A deploy is in flight.
    Deploying,
    /// A whitelist approval is in flight.
    Approving,
    /// The release is rolled out and awaiting verification.
    Deployed,
    /// The deploy or its verification failed.
    DeploymentFailed,
    /// A rollback is in flight.
    RollingBack,
    /// The task has reached the end of the workflow.
    DeploymentEnded,
}

impl TaskStatus {
    /// Every status in workflow order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Deploying,
        Self::Approving,
        Self::Deployed,
        Self::DeploymentFailed,
        Self::RollingBack,
        Self::DeploymentEnded,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Deploying => "DEPLOYING",
            Self::Approving => "APPROVING",
            Self::Deployed => "DEPLOYED",
            Self::DeploymentFailed => "DEPLOYMENT_FAILED",
            Self::RollingBack => "ROLLING_BACK",
            Self::DeploymentEnded => "DEPLOYMENT_ENDED",
        }
    }

    /// Returns the operator-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Deploying => "deploying",
            Self::Approving => "awaiting approval",
            Self::Deployed => "deployed",
            Self::DeploymentFailed => "failed",
            Self::RollingBack => "rolling back",
            Self::DeploymentEnded => "ended",
        }
    }

    /// Returns `true` for the initial pending status.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns `true` when no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::DeploymentEnded)
    }

    /// Returns `true` when `target` is a direct successor in the workflow.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Deploying | Self::Approving)
                | (Self::Approving, Self::Pending)
                | (Self::Deploying, Self::Deployed | Self::DeploymentFailed)
                | (Self::Deployed, Self::DeploymentEnded | Self::DeploymentFailed)
                | (
                    Self::DeploymentFailed,
                    Self::RollingBack | Self::DeploymentEnded
                )
                | (Self::RollingBack, Self::DeploymentEnded)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseTaskStatusError(value.to_owned()))
    }
}
