//! BDD step definitions for the internet reachability check

use cucumber::{given, then, when};

use crate::world::NetwatchWorld;

#[given("host fallback is disabled")]
fn host_fallback_disabled(world: &mut NetwatchWorld) {
    world.config.internet.host_fallback = false;
}

#[when("the internet check runs")]
async fn internet_check_runs(world: &mut NetwatchWorld) {
    world.engine().check_internet_once().await;
}

#[then("the internet should be reported reachable")]
async fn internet_reported_reachable(world: &mut NetwatchWorld) {
    let state = world.engine().state().read().await;
    assert!(state.internet.reachable);
}

#[then("the internet should be reported unreachable")]
async fn internet_reported_unreachable(world: &mut NetwatchWorld) {
    let state = world.engine().state().read().await;
    assert!(!state.internet.reachable);
    assert!(state.internet.last_checked_at.is_some());
}
