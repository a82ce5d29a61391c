//! Deployment task record.

use super::{BatchKey, DeployOrder, TaskDomainError, TaskKey, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive attributes of the release a task deploys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    /// Application name.
    pub app_name: String,
    /// Version being released.
    pub version: String,
    /// Target cluster.
    pub cluster: String,
    /// Target namespace.
    pub namespace: String,
    /// Environment tag such as `prod` or `staging`.
    pub env: String,
    /// Operator responsible for the deploy.
    pub deployer: String,
}

impl ReleaseTarget {
    /// Creates a release target for an application version.
    #[must_use]
    pub fn new(app_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            version: version.into(),
            cluster: String::new(),
            namespace: String::new(),
            env: String::new(),
            deployer: String::new(),
        }
    }

    /// Sets the cluster and namespace.
    #[must_use]
    pub fn on_cluster(mut self, cluster: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self.namespace = namespace.into();
        self
    }

    /// Sets the environment tag.
    #[must_use]
    pub fn in_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    /// Sets the deployer.
    #[must_use]
    pub fn deployed_by(mut self, deployer: impl Into<String>) -> Self {
        self.deployer = deployer.into();
        self
    }
}

/// A single application's deployment record.
///
/// The serialized form is the persisted task snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTask {
    key: TaskKey,
    app_name: String,
    version: String,
    #[serde(default)]
    cluster: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    env: String,
    #[serde(default)]
    deployer: String,
    status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deploy_order: Option<DeployOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    batch_key: Option<BatchKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    batch_created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deploy_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_time: Option<DateTime<Utc>>,
}

impl DeploymentTask {
    /// Creates a pending task with no order or batch.
    #[must_use]
    pub fn new(key: TaskKey, target: ReleaseTarget) -> Self {
        Self {
            key,
            app_name: target.app_name,
            version: target.version,
            cluster: target.cluster,
            namespace: target.namespace,
            env: target.env,
            deployer: target.deployer,
            status: TaskStatus::Pending,
            deploy_order: None,
            batch_key: None,
            batch_created_at: None,
            deploy_time: None,
            error_message: None,
            error_time: None,
        }
    }

    /// Overrides the status of a freshly built task.
    ///
    /// Intended for seeding and tests; live status changes go through
    /// [`DeploymentTask::transition_to`].
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the deploy order of a freshly built task.
    #[must_use]
    pub fn with_deploy_order(mut self, order: DeployOrder) -> Self {
        self.deploy_order = Some(order);
        self
    }

    /// Sets the batch membership of a freshly built task.
    #[must_use]
    pub fn with_batch(mut self, batch_key: BatchKey, created_at: Option<DateTime<Utc>>) -> Self {
        self.batch_key = Some(batch_key);
        self.batch_created_at = created_at;
        self
    }

    /// Sets the deploy time of a freshly built task.
    #[must_use]
    pub fn with_deploy_time(mut self, deploy_time: DateTime<Utc>) -> Self {
        self.deploy_time = Some(deploy_time);
        self
    }

    /// Returns the task key.
    #[must_use]
    pub const fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Returns the application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Returns the released version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the target cluster.
    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Returns the target namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the environment tag.
    #[must_use]
    pub fn env(&self) -> &str {
        &self.env
    }

    /// Returns the deployer.
    #[must_use]
    pub fn deployer(&self) -> &str {
        &self.deployer
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns `true` while the task is pending.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Returns the deploy order, if assigned.
    #[must_use]
    pub const fn deploy_order(&self) -> Option<DeployOrder> {
        self.deploy_order
    }

    /// Returns the release batch, or `None` for ungrouped tasks.
    #[must_use]
    pub fn batch_key(&self) -> Option<&BatchKey> {
        self.batch_key.as_ref().filter(|key| !key.is_ungrouped())
    }

    /// Returns the batch creation time.
    #[must_use]
    pub const fn batch_created_at(&self) -> Option<DateTime<Utc>> {
        self.batch_created_at
    }

    /// Returns the time the release was rolled out.
    #[must_use]
    pub const fn deploy_time(&self) -> Option<DateTime<Utc>> {
        self.deploy_time
    }

    /// Returns the failure message while the task is failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the failure time while the task is failed.
    #[must_use]
    pub const fn error_time(&self) -> Option<DateTime<Utc>> {
        self.error_time
    }

    /// Moves the task along a workflow edge.
    ///
    /// Reaching [`TaskStatus::Deployed`] records the deploy time; leaving
    /// [`TaskStatus::DeploymentFailed`] clears the failure metadata. The
    /// deploy order is never touched here.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] when `target` is
    /// not a successor of the current status.
    pub fn transition_to(
        &mut self,
        target: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(TaskDomainError::InvalidStateTransition {
                task_key: self.key.clone(),
                from: self.status,
                to: target,
            });
        }
        if self.status == TaskStatus::DeploymentFailed {
            self.error_message = None;
            self.error_time = None;
        }
        if target == TaskStatus::Deployed {
            self.deploy_time = Some(at);
        }
        self.status = target;
        Ok(())
    }

    /// Marks the task failed with a descriptive message.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] when the current
    /// status cannot fail.
    pub fn record_failure(
        &mut self,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        self.transition_to(TaskStatus::DeploymentFailed, at)?;
        self.error_message = Some(message.into());
        self.error_time = Some(at);
        Ok(())
    }

    /// Puts back the status and failure metadata captured in `previous`
    /// before an aborted operation. Order and batch membership are kept.
    pub(crate) fn restore_status(&mut self, previous: &Self) {
        self.status = previous.status;
        self.deploy_time = previous.deploy_time;
        self.error_message.clone_from(&previous.error_message);
        self.error_time = previous.error_time;
    }

    pub(crate) const fn set_deploy_order(&mut self, order: Option<DeployOrder>) {
        self.deploy_order = order;
    }

    /// Stamps batch membership.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::AlreadyBatched`] when the task already
    /// belongs to a batch; membership is never reassigned.
    pub(crate) fn join_batch(
        &mut self,
        batch_key: BatchKey,
        created_at: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        if let Some(existing) = self.batch_key() {
            return Err(TaskDomainError::AlreadyBatched {
                task_key: self.key.clone(),
                batch_key: existing.clone(),
            });
        }
        self.batch_key = Some(batch_key);
        self.batch_created_at = Some(created_at);
        Ok(())
    }

    pub(crate) const fn set_batch_created_at(&mut self, created_at: Option<DateTime<Utc>>) {
        self.batch_created_at = created_at;
    }
}
