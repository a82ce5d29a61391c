//! In-memory integration tests for the operation executor.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use convoy::config::SimulationConfig;
use convoy::release::{
    adapters::simulated::{DEPLOY_FAILURE_MESSAGES, SimulatedBackend},
    domain::{OperationKind, TaskStatus},
    ports::{DeploymentBackend, NotificationLevel},
    services::{ExecutionOutcome, ExecutorError, LoadingSink},
};
use eyre::{bail, ensure};
use rstest::rstest;

use super::helpers::{Harness, UnreachableBackend, harness, key, pending};

fn levels<B: DeploymentBackend + 'static>(session: &Harness<B>) -> Vec<NotificationLevel> {
    session
        .notifier
        .notifications()
        .into_iter()
        .map(|notification| notification.level)
        .collect()
}

#[tokio::test]
async fn successful_deploy_reaches_deployed() -> eyre::Result<()> {
    let session = harness(100);
    session.seed([pending("a")]);

    let outcome = session
        .executor
        .execute(OperationKind::Deploy, &key("a"), false, None)
        .await?;

    ensure!(outcome == ExecutionOutcome::Completed(TaskStatus::Deployed));
    ensure!(session.status("a") == Some(TaskStatus::Deployed));
    let task = session.store.task(&key("a"))?;
    ensure!(task.and_then(|task| task.deploy_time()).is_some());
    ensure!(levels(&session) == vec![NotificationLevel::Success]);
    Ok(())
}

#[tokio::test]
async fn failed_deploy_is_recorded_on_the_task() -> eyre::Result<()> {
    let session = harness(0);
    session.seed([pending("a")]);

    let outcome = session
        .executor
        .execute(OperationKind::Deploy, &key("a"), false, None)
        .await?;

    let ExecutionOutcome::Failed { message } = outcome else {
        bail!("expected a failed deploy, got {outcome:?}");
    };
    ensure!(DEPLOY_FAILURE_MESSAGES.contains(&message.as_str()));
    let task = session
        .store
        .task(&key("a"))?
        .ok_or_else(|| eyre::eyre!("task vanished"))?;
    ensure!(task.status() == TaskStatus::DeploymentFailed);
    ensure!(task.error_message() == Some(message.as_str()));
    ensure!(task.error_time().is_some());
    ensure!(levels(&session) == vec![NotificationLevel::Error]);
    Ok(())
}

#[rstest]
#[case(OperationKind::VerifyPass, TaskStatus::Pending)]
#[case(OperationKind::Rollback, TaskStatus::Deployed)]
#[case(OperationKind::Deploy, TaskStatus::DeploymentEnded)]
#[case(OperationKind::Delete, TaskStatus::RollingBack)]
#[tokio::test]
async fn inapplicable_operation_mutates_nothing(
    #[case] operation: OperationKind,
    #[case] status: TaskStatus,
) -> eyre::Result<()> {
    let session = harness(100);
    session.seed([pending("a").with_status(status)]);
    let before = session.store.snapshot()?;

    let outcome = session
        .executor
        .execute(operation, &key("a"), false, None)
        .await?;

    ensure!(outcome == ExecutionOutcome::NotApplicable { status });
    ensure!(session.store.snapshot()? == before);
    ensure!(levels(&session) == vec![NotificationLevel::Warning]);
    Ok(())
}

#[tokio::test]
async fn silent_execution_mutates_without_notifying() -> eyre::Result<()> {
    let session = harness(100);
    session.seed([pending("a").with_status(TaskStatus::Deployed)]);

    let outcome = session
        .executor
        .execute(OperationKind::VerifyPass, &key("a"), true, None)
        .await?;

    ensure!(outcome == ExecutionOutcome::Completed(TaskStatus::DeploymentEnded));
    ensure!(session.notifier.notifications().is_empty());
    Ok(())
}

#[rstest]
#[case(OperationKind::Whitelist, TaskStatus::Pending, TaskStatus::Pending)]
#[case(OperationKind::Rollback, TaskStatus::DeploymentFailed, TaskStatus::DeploymentEnded)]
#[case(OperationKind::OpsIntervention, TaskStatus::DeploymentFailed, TaskStatus::DeploymentEnded)]
#[case(OperationKind::OpsIntervention, TaskStatus::RollingBack, TaskStatus::DeploymentEnded)]
#[tokio::test]
async fn deterministic_operations_reach_their_target(
    #[case] operation: OperationKind,
    #[case] from: TaskStatus,
    #[case] to: TaskStatus,
) -> eyre::Result<()> {
    let session = harness(100);
    session.seed([pending("a").with_status(from)]);

    let outcome = session
        .executor
        .execute(operation, &key("a"), true, None)
        .await?;

    ensure!(outcome == ExecutionOutcome::Completed(to));
    ensure!(session.status("a") == Some(to));
    Ok(())
}

#[tokio::test]
async fn delete_removes_the_task_immediately() -> eyre::Result<()> {
    let session = harness(100);
    session.seed([pending("a"), pending("b")]);

    let outcome = session
        .executor
        .execute(OperationKind::Delete, &key("a"), false, None)
        .await?;

    ensure!(outcome == ExecutionOutcome::Deleted);
    ensure!(session.status("a").is_none());
    ensure!(session.store.tasks()?.len() == 1);
    Ok(())
}

#[tokio::test]
async fn unknown_task_is_reported_once() -> eyre::Result<()> {
    let session = harness(100);

    let result = session
        .executor
        .execute(OperationKind::Deploy, &key("ghost"), false, None)
        .await;

    match result {
        Err(ExecutorError::TaskNotFound(missing)) if missing == key("ghost") => {}
        other => bail!("expected TaskNotFound, got {other:?}"),
    }
    ensure!(levels(&session) == vec![NotificationLevel::Error]);
    Ok(())
}

#[tokio::test]
async fn backend_failure_restores_the_previous_status() -> eyre::Result<()> {
    let session = Harness::with_backend(UnreachableBackend);
    session.seed([pending("a")]);

    let result = session
        .executor
        .execute(OperationKind::Deploy, &key("a"), false, None)
        .await;

    match result {
        Err(ExecutorError::Backend(_)) => {}
        other => bail!("expected a backend error, got {other:?}"),
    }
    ensure!(session.status("a") == Some(TaskStatus::Pending));
    ensure!(levels(&session) == vec![NotificationLevel::Error]);
    Ok(())
}

#[tokio::test]
async fn loading_sink_brackets_the_operation() -> eyre::Result<()> {
    let session = harness(100);
    session.seed([pending("a")]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let sink: LoadingSink = Arc::new(move |loading| {
        recorder
            .lock()
            .expect("loading log lock")
            .push(loading);
    });

    session
        .executor
        .execute(OperationKind::Deploy, &key("a"), true, Some(sink))
        .await?;

    ensure!(*seen.lock().expect("loading log lock") == vec![true, false]);
    Ok(())
}

#[tokio::test]
async fn loading_sink_resets_after_backend_failure() -> eyre::Result<()> {
    let session = Harness::with_backend(UnreachableBackend);
    session.seed([pending("a")]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let sink: LoadingSink = Arc::new(move |loading| {
        recorder
            .lock()
            .expect("loading log lock")
            .push(loading);
    });

    let result = session
        .executor
        .execute(OperationKind::Rollback, &key("a"), true, Some(sink))
        .await;

    ensure!(result.is_ok(), "pending tasks cannot roll back");
    ensure!(seen.lock().expect("loading log lock").is_empty());

    session.store.transition(&key("a"), TaskStatus::Deploying)?;
    session.store.record_failure(&key("a"), "probe failed")?;
    let recorder = Arc::clone(&seen);
    let retry: LoadingSink = Arc::new(move |loading| {
        recorder
            .lock()
            .expect("loading log lock")
            .push(loading);
    });
    let failed = session
        .executor
        .execute(OperationKind::Rollback, &key("a"), true, Some(retry))
        .await;

    ensure!(failed.is_err());
    ensure!(*seen.lock().expect("loading log lock") == vec![true, false]);
    let task = session
        .store
        .task(&key("a"))?
        .ok_or_else(|| eyre::eyre!("task vanished"))?;
    ensure!(task.status() == TaskStatus::DeploymentFailed);
    ensure!(task.error_message() == Some("probe failed"), "failure metadata restored");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn in_progress_status_is_visible_until_the_backend_resolves() -> eyre::Result<()> {
    let config = SimulationConfig {
        deploy_delay: Duration::from_secs(2),
        ..SimulationConfig::immediate()
    }
    .with_deploy_success_percent(100);
    let session = Harness::with_backend(SimulatedBackend::with_seed(config, 7));
    session.seed([pending("a")]);

    let handle = session.executor.spawn(OperationKind::Deploy, key("a"), true);
    ensure!(session.status("a") == Some(TaskStatus::Deploying));

    let outcome = handle.await??;
    ensure!(outcome == ExecutionOutcome::Completed(TaskStatus::Deployed));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn deleting_mid_flight_does_not_resurrect_the_task() -> eyre::Result<()> {
    let config = SimulationConfig {
        rollback_delay: Duration::from_secs(2),
        ..SimulationConfig::immediate()
    };
    let session = Harness::with_backend(SimulatedBackend::with_seed(config, 7));
    session.seed([pending("a").with_status(TaskStatus::DeploymentFailed)]);

    let handle = session.executor.spawn(OperationKind::Rollback, key("a"), true);
    ensure!(session.status("a") == Some(TaskStatus::RollingBack));
    session.store.delete(&key("a"))?;

    let outcome = handle.await??;
    ensure!(outcome == ExecutionOutcome::Vanished);
    ensure!(session.status("a").is_none());
    Ok(())
}
