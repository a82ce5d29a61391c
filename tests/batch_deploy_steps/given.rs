//! Given steps for release batch deployment BDD scenarios.

use super::when::select_task;
use super::world::BatchDeployWorld;
use convoy::release::domain::{DeploymentTask, ReleaseTarget, TaskKey};
use eyre::WrapErr;
use rstest_bdd_macros::given;

#[given("a release session where deploys always succeed")]
fn deploys_always_succeed(world: &mut BatchDeployWorld) {
    *world = BatchDeployWorld::with_success_percent(100);
}

#[given("a release session where deploys always fail")]
fn deploys_always_fail(world: &mut BatchDeployWorld) {
    *world = BatchDeployWorld::with_success_percent(0);
}

#[given(r#"a pending task "{key}""#)]
fn pending_task(world: &mut BatchDeployWorld, key: String) -> Result<(), eyre::Report> {
    let target = ReleaseTarget::new(format!("{key}-service"), "v1.0.0")
        .on_cluster("cluster-east-1", "default")
        .in_env("prod");
    world
        .store
        .insert(DeploymentTask::new(TaskKey::new(key), target))
        .wrap_err("seed pending task")
}

#[given(r#"the operator has selected "{key}""#)]
fn operator_has_selected(world: &mut BatchDeployWorld, key: String) -> Result<(), eyre::Report> {
    select_task(world, &key)
}
