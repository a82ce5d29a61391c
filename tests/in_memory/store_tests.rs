//! In-memory integration tests for the task store.

use std::sync::Arc;
use std::time::Duration;

use convoy::config::{PersistenceConfig, SimulationConfig};
use convoy::release::{
    adapters::{memory::InMemoryKeyValueStore, simulated::SimulatedBackend},
    domain::{BatchKey, DeploymentTask, OperationKind, TaskDomainError, TaskStatus},
    services::{TaskStore, TaskStoreError},
};
use eyre::{bail, ensure};
use rstest::{fixture, rstest};

use super::helpers::{FixedClock, Harness, harness, instant, key, pending, simulated};

#[fixture]
fn session() -> Harness {
    let session = harness(100);
    session.seed([pending("a"), pending("b"), pending("c")]);
    session
}

fn store_over(key_value: &InMemoryKeyValueStore) -> TaskStore<InMemoryKeyValueStore, FixedClock> {
    TaskStore::new(
        Arc::new(key_value.clone()),
        Arc::new(FixedClock(instant(60))),
        PersistenceConfig::default(),
    )
}

#[rstest]
#[tokio::test]
async fn selection_changes_keep_orders_dense(session: Harness) -> eyre::Result<()> {
    session.store.select(&key("c"))?;
    session.store.select(&key("a"))?;
    session.store.select(&key("b"))?;
    ensure!(
        [session.order("a"), session.order("b"), session.order("c")] == [Some(2), Some(3), Some(1)]
    );

    session.store.deselect(&key("a"))?;
    ensure!(
        [session.order("a"), session.order("b"), session.order("c")] == [None, Some(2), Some(1)]
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn selecting_unknown_keys_is_ignored(session: Harness) -> eyre::Result<()> {
    let selected = session.store.select(&key("ghost"))?;

    ensure!(!selected);
    ensure!(session.store.selection()?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn deleting_a_selected_task_closes_the_gap(session: Harness) -> eyre::Result<()> {
    session.store.select_all_pending()?;

    ensure!(session.store.delete(&key("a"))?);

    ensure!(!session.store.selection()?.contains(&key("a")));
    ensure!([session.order("b"), session.order("c")] == [Some(1), Some(2)]);
    ensure!(!session.store.delete(&key("a"))?);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn manual_edit_swaps_then_reallocates(session: Harness) -> eyre::Result<()> {
    session.store.select_all_pending()?;

    session.store.edit_deploy_order(&key("a"), "3")?;

    ensure!(
        [session.order("a"), session.order("b"), session.order("c")] == [Some(3), Some(2), Some(1)]
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn invalid_manual_edit_leaves_orders_untouched(session: Harness) -> eyre::Result<()> {
    session.store.select_all_pending()?;
    let before = session.store.tasks()?;

    match session.store.edit_deploy_order(&key("b"), "zero") {
        Err(TaskStoreError::Domain(TaskDomainError::InvalidDeployOrder(_))) => {}
        other => bail!("expected InvalidDeployOrder, got {other:?}"),
    }

    ensure!(session.store.tasks()? == before);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn leaving_pending_freezes_the_order(session: Harness) -> eyre::Result<()> {
    session.store.select_all_pending()?;
    session.store.transition(&key("b"), TaskStatus::Approving)?;

    session.store.clear_selection()?;
    ensure!(session.order("b") == Some(2));

    session.store.transition(&key("b"), TaskStatus::Pending)?;
    ensure!(session.order("b") == Some(2), "frozen order survives the return");

    session.store.select(&key("b"))?;
    ensure!(session.order("b") == Some(1));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn editing_an_unselected_task_is_rejected(session: Harness) -> eyre::Result<()> {
    session.seed([pending("x")]);
    session.store.set_selection([key("a"), key("b"), key("c")])?;
    let before = session.store.tasks()?;

    match session.store.edit_deploy_order(&key("x"), "1") {
        Err(TaskStoreError::Domain(TaskDomainError::TaskNotSelected(task_key)))
            if task_key == key("x") => {}
        other => bail!("expected TaskNotSelected, got {other:?}"),
    }

    ensure!(session.store.tasks()? == before);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn deploying_a_selected_task_closes_the_gap(session: Harness) -> eyre::Result<()> {
    session.store.select_all_pending()?;

    session
        .executor
        .execute(OperationKind::Deploy, &key("b"), true, None)
        .await?;

    ensure!(session.status("b") == Some(TaskStatus::Deployed));
    ensure!([session.order("a"), session.order("c")] == [Some(1), Some(2)]);
    ensure!(session.order("b") == Some(2), "departed task keeps its frozen order");
    let assignment = session.store.assign_batch()?;
    ensure!(assignment.members == vec![key("a"), key("c")]);
    ensure!([session.order("a"), session.order("c")] == [Some(1), Some(2)]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn selected_task_returning_to_pending_rejoins_densely() -> eyre::Result<()> {
    let config = SimulationConfig {
        whitelist_delay: Duration::from_millis(1500),
        ..SimulationConfig::immediate()
    };
    let session = Harness::with_backend(SimulatedBackend::with_seed(config, 7));
    session.seed([pending("a"), pending("b"), pending("c"), pending("d")]);
    session.store.set_selection([key("a"), key("b"), key("c")])?;

    let handle = session.executor.spawn(OperationKind::Whitelist, key("b"), true);
    ensure!(session.status("b") == Some(TaskStatus::Approving));
    session.store.deselect(&key("c"))?;
    session.store.select(&key("d"))?;
    ensure!([session.order("a"), session.order("d")] == [Some(1), Some(2)]);

    handle.await??;

    ensure!(session.status("b") == Some(TaskStatus::Pending));
    ensure!(
        [session.order("a"), session.order("b"), session.order("d")] == [Some(1), Some(2), Some(3)]
    );
    ensure!(session.store.eligible_for_batch_count()? == 3);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn batch_assignment_stamps_clock_time(session: Harness) -> eyre::Result<()> {
    session.store.set_selection([key("b"), key("a")])?;

    let assignment = session.store.assign_batch()?;

    ensure!(assignment.members == vec![key("b"), key("a")]);
    ensure!(assignment.created_at == instant(0));
    ensure!(
        assignment
            .batch_key
            .as_str()
            .starts_with(&format!("BATCH-{}-", instant(0).timestamp_millis()))
    );
    let batches = session.store.batches()?;
    ensure!(batches.len() == 2);
    ensure!(batches.first().map(|view| view.task_count()) == Some(2));
    ensure!(batches.last().is_some_and(|view| view.is_ungrouped()));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn batch_without_eligible_tasks_mutates_nothing(session: Harness) -> eyre::Result<()> {
    let before = session.store.snapshot()?;

    match session.store.assign_batch() {
        Err(TaskStoreError::Domain(TaskDomainError::NoEligibleTasks)) => {}
        other => bail!("expected NoEligibleTasks, got {other:?}"),
    }

    ensure!(session.store.snapshot()? == before);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn available_operations_follow_status(session: Harness) -> eyre::Result<()> {
    session.store.transition(&key("a"), TaskStatus::Deploying)?;

    let deploying = session.store.available_operations(&key("a"))?;
    let idle = session.store.available_operations(&key("b"))?;

    ensure!(deploying.is_some_and(|ops| ops.primary.is_none()));
    ensure!(idle.is_some_and(|ops| ops.primary.is_some()));
    ensure!(session.store.available_operations(&key("ghost"))?.is_none());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn batch_expansion_toggles() -> eyre::Result<()> {
    let session = harness(100);

    ensure!(session.store.toggle_batch_expansion("BATCH-1")?);
    ensure!(session.store.is_batch_expanded("BATCH-1")?);
    ensure!(!session.store.toggle_batch_expansion("BATCH-1")?);
    ensure!(!session.store.is_batch_expanded("BATCH-1")?);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn mutation_bursts_persist_only_the_final_state() -> eyre::Result<()> {
    let session = harness(100);
    session.seed([pending("a"), pending("b")]);
    session.store.select_all_pending()?;
    session.store.transition(&key("a"), TaskStatus::Deploying)?;

    ensure!(session.key_value.write_count()? == 0, "nothing written inside the window");
    tokio::time::sleep(PersistenceConfig::default().debounce + Duration::from_millis(50)).await;

    ensure!(session.key_value.write_count()? == 2, "one write per durable key");
    let raw = session
        .key_value
        .raw("deployment-tasks")?
        .ok_or_else(|| eyre::eyre!("tasks were not persisted"))?;
    let persisted: Vec<DeploymentTask> = serde_json::from_str(&raw)?;
    let statuses: Vec<TaskStatus> = persisted.iter().map(DeploymentTask::status).collect();
    ensure!(statuses == vec![TaskStatus::Deploying, TaskStatus::Pending]);
    Ok(())
}

#[tokio::test]
async fn flush_writes_immediately() -> eyre::Result<()> {
    let session = harness(100);
    session.seed([pending("a")]);

    ensure!(session.store.flush().await);

    ensure!(session.key_value.raw("deployment-tasks")?.is_some());
    ensure!(session.key_value.raw("expanded-batches")?.as_deref() == Some("[]"));
    Ok(())
}

#[tokio::test]
async fn reload_restores_tasks_and_clears_selection() -> eyre::Result<()> {
    let session = harness(100);
    session.seed([pending("a"), pending("b")]);
    session.store.select_all_pending()?;
    session.store.toggle_batch_expansion("BATCH-9")?;
    ensure!(session.store.flush().await);

    let reloaded = store_over(&session.key_value);
    let snapshot = reloaded.load().await?;

    ensure!(snapshot.tasks.len() == 2);
    ensure!(snapshot.selection.is_empty());
    ensure!(snapshot.tasks.iter().all(|task| task.deploy_order().is_none()));
    ensure!(snapshot.expanded_batches == vec!["BATCH-9".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn corrupt_storage_loads_empty() -> eyre::Result<()> {
    let key_value = InMemoryKeyValueStore::with_entry("deployment-tasks", "[{\"key\":");
    let store = store_over(&key_value);

    let snapshot = store.load().await?;

    ensure!(snapshot.tasks.is_empty());
    Ok(())
}

#[tokio::test]
async fn duplicate_expanded_batches_load_once() -> eyre::Result<()> {
    let key_value = InMemoryKeyValueStore::with_entry("expanded-batches", r#"["x","y","x"]"#);
    let store = store_over(&key_value);

    let snapshot = store.load().await?;

    ensure!(snapshot.expanded_batches == vec!["x".to_owned(), "y".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn legacy_batches_are_normalised_on_load() -> eyre::Result<()> {
    let legacy = serde_json::json!([
        {
            "key": "old-1", "appName": "user-service", "version": "1.0.0",
            "status": "DEPLOYED", "batchKey": "BATCH-LEGACY",
            "deployTime": "2024-03-01T10:00:00Z"
        },
        {
            "key": "old-2", "appName": "order-service", "version": "1.0.0",
            "status": "DEPLOYED", "batchKey": "BATCH-LEGACY",
            "deployTime": "2024-03-01T09:00:00Z"
        },
        { "key": "old-3", "appName": "search-indexer", "version": "1.0.0",
          "status": "PENDING", "batchKey": "0" }
    ]);
    let key_value = InMemoryKeyValueStore::with_entry("deployment-tasks", legacy.to_string());
    let store = store_over(&key_value);

    store.load().await?;
    let batches = store.batches()?;

    let first = batches
        .first()
        .ok_or_else(|| eyre::eyre!("expected a legacy batch"))?;
    ensure!(first.batch_key == Some(BatchKey::new("BATCH-LEGACY")));
    ensure!(first.created_at.map(|at| at.to_rfc3339()) == Some("2024-03-01T09:00:00+00:00".to_owned()));
    ensure!(batches.last().is_some_and(|view| view.is_ungrouped() && view.task_count() == 1));
    Ok(())
}

#[tokio::test]
async fn empty_store_is_seeded_from_the_backend() -> eyre::Result<()> {
    let session = harness(100);
    let backend = simulated(100).with_sample_tasks(5);

    let snapshot = session.store.load_or_seed(&backend).await?;

    ensure!(snapshot.tasks.len() == 5);
    ensure!(snapshot.tasks.iter().all(|task| task.status() == TaskStatus::Pending));
    Ok(())
}

#[tokio::test]
async fn stored_tasks_take_precedence_over_seeding() -> eyre::Result<()> {
    let session = harness(100);
    session.seed([pending("kept")]);
    ensure!(session.store.flush().await);
    let reloaded = store_over(&session.key_value);

    let snapshot = reloaded
        .load_or_seed(&simulated(100).with_sample_tasks(5))
        .await?;

    ensure!(snapshot.tasks.len() == 1);
    ensure!(snapshot.tasks.contains(&key("kept")));
    Ok(())
}
