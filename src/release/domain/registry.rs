//! Static table of applicable operations per task status.
//!
//! The registry drives which affordances are enabled. Transitions follow the
//! workflow graph in [`TaskStatus::can_transition_to`]; deletion is an
//! editorial policy that is independent of that graph.

use super::{OperationKind, TaskStatus};

/// An operation shown alongside a status with its enabled flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationAffordance {
    /// The operation.
    pub operation: OperationKind,
    /// Whether the operation may be requested now.
    pub enabled: bool,
}

/// Operations offered for a task in a given status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableOperations {
    /// The main forward operation, if any.
    pub primary: Option<OperationKind>,
    /// Additional operations; always ends with the delete affordance.
    pub secondary: Vec<OperationAffordance>,
}

impl AvailableOperations {
    /// Returns `true` when `operation` is offered and enabled.
    #[must_use]
    pub fn allows(&self, operation: OperationKind) -> bool {
        self.primary == Some(operation)
            || self
                .secondary
                .iter()
                .any(|affordance| affordance.operation == operation && affordance.enabled)
    }
}

/// Fixed status-to-operation registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusRegistry;

impl StatusRegistry {
    /// Returns the primary operation for `status`.
    #[must_use]
    pub const fn primary(status: TaskStatus) -> Option<OperationKind> {
        match status {
            TaskStatus::Pending => Some(OperationKind::Deploy),
            TaskStatus::Deployed => Some(OperationKind::VerifyPass),
            TaskStatus::DeploymentFailed => Some(OperationKind::Rollback),
            TaskStatus::Deploying
            | TaskStatus::Approving
            | TaskStatus::RollingBack
            | TaskStatus::DeploymentEnded => None,
        }
    }

    /// Returns the secondary transition operations for `status`.
    const fn secondary_transitions(status: TaskStatus) -> &'static [OperationKind] {
        match status {
            TaskStatus::Pending => &[OperationKind::Whitelist],
            TaskStatus::DeploymentFailed | TaskStatus::RollingBack => {
                &[OperationKind::OpsIntervention]
            }
            TaskStatus::Deploying
            | TaskStatus::Approving
            | TaskStatus::Deployed
            | TaskStatus::DeploymentEnded => &[],
        }
    }

    /// Returns `true` when deletion is permitted for `status`.
    #[must_use]
    pub const fn allows_delete(status: TaskStatus) -> bool {
        matches!(status, TaskStatus::Pending | TaskStatus::Deployed)
    }

    /// Returns `true` when `operation` may be requested for a task in
    /// `status`.
    #[must_use]
    pub fn is_applicable(status: TaskStatus, operation: OperationKind) -> bool {
        if operation == OperationKind::Delete {
            return Self::allows_delete(status);
        }
        Self::primary(status) == Some(operation)
            || Self::secondary_transitions(status).contains(&operation)
    }

    /// Returns the affordances offered for `status`.
    #[must_use]
    pub fn available_operations(status: TaskStatus) -> AvailableOperations {
        let mut secondary: Vec<OperationAffordance> = Self::secondary_transitions(status)
            .iter()
            .map(|operation| OperationAffordance {
                operation: *operation,
                enabled: true,
            })
            .collect();
        secondary.push(OperationAffordance {
            operation: OperationKind::Delete,
            enabled: Self::allows_delete(status),
        });

        AvailableOperations {
            primary: Self::primary(status),
            secondary,
        }
    }
}
