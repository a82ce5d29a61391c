//! Operator-initiated operations on deployment tasks.

use super::{ParseOperationKindError, TaskStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation an operator can request for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Roll the release out.
    Deploy,
    /// Request a whitelist approval.
    Whitelist,
    /// Confirm that a deployed release passed verification.
    VerifyPass,
    /// Roll a failed release back.
    Rollback,
    /// Close out a failed or rolling-back task by hand.
    OpsIntervention,
    /// Remove the task entirely.
    Delete,
}

impl OperationKind {
    /// Every operation kind.
    pub const ALL: [Self; 6] = [
        Self::Deploy,
        Self::Whitelist,
        Self::VerifyPass,
        Self::Rollback,
        Self::OpsIntervention,
        Self::Delete,
    ];

    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Whitelist => "whitelist",
            Self::VerifyPass => "verify_pass",
            Self::Rollback => "rollback",
            Self::OpsIntervention => "ops_intervention",
            Self::Delete => "delete",
        }
    }

    /// Returns the operator-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Whitelist => "whitelist approval",
            Self::VerifyPass => "verification",
            Self::Rollback => "rollback",
            Self::OpsIntervention => "ops intervention",
            Self::Delete => "delete",
        }
    }

    /// Status applied as soon as the operation starts, for operations with a
    /// visible in-progress phase.
    #[must_use]
    pub const fn intermediate_status(self) -> Option<TaskStatus> {
        match self {
            Self::Deploy => Some(TaskStatus::Deploying),
            Self::Whitelist => Some(TaskStatus::Approving),
            Self::Rollback => Some(TaskStatus::RollingBack),
            Self::VerifyPass | Self::OpsIntervention | Self::Delete => None,
        }
    }

    /// Status reached when the operation completes successfully.
    ///
    /// `Delete` removes the task and has no resulting status.
    #[must_use]
    pub const fn success_status(self) -> Option<TaskStatus> {
        match self {
            Self::Deploy => Some(TaskStatus::Deployed),
            Self::Whitelist => Some(TaskStatus::Pending),
            Self::VerifyPass | Self::Rollback | Self::OpsIntervention => {
                Some(TaskStatus::DeploymentEnded)
            }
            Self::Delete => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for OperationKind {
    type Error = ParseOperationKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseOperationKindError(value.to_owned()))
    }
}
