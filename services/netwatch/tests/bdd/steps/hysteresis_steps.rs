//! BDD step definitions for debounced host alerts

use std::sync::atomic::Ordering;

use cucumber::gherkin::Step;
use cucumber::{given, then, when};

use crate::world::NetwatchWorld;

#[given(expr = "a monitored host {string} at {string}")]
fn monitored_host(world: &mut NetwatchWorld, name: String, address: String) {
    world.add_target(&name, &address);
}

#[given(expr = "alerts clear after a hold of {int} seconds")]
fn hold_of(world: &mut NetwatchWorld, seconds: u64) {
    world.config.hysteresis.min_hold = std::time::Duration::from_secs(seconds);
}

fn set_host(world: &mut NetwatchWorld, name: &str, up: bool) {
    let address = world.address_of(name);
    world.hosts.set(&address, up);
}

#[given(expr = "host {string} stops answering")]
fn host_does_not_answer(world: &mut NetwatchWorld, name: String) {
    set_host(world, &name, false);
}

#[when(expr = "host {string} stops answering")]
fn host_stops_answering(world: &mut NetwatchWorld, name: String) {
    set_host(world, &name, false);
}

#[when(expr = "host {string} answers again")]
fn host_answers_again(world: &mut NetwatchWorld, name: String) {
    set_host(world, &name, true);
}

/// Each sweep runs at the current simulated time, then the clock moves on
/// by one second
#[when(regex = r"^(\d+) sweeps? runs?$")]
async fn sweeps_run(world: &mut NetwatchWorld, count: u32) {
    for _ in 0..count {
        let now = world.now();
        let applied = world.engine().sweep_at(now).await;
        world.last_sweep = Some(applied);
        world.clock += 1;
    }
}

#[when(expr = "{int} seconds pass")]
fn seconds_pass(world: &mut NetwatchWorld, seconds: i64) {
    world.clock += seconds;
}

async fn active_labels(world: &mut NetwatchWorld) -> Vec<String> {
    world
        .engine()
        .state()
        .read()
        .await
        .alerts_snapshot()
        .records
        .into_iter()
        .map(|r| r.label)
        .collect()
}

#[then("there should be no active alerts")]
async fn no_active_alerts(world: &mut NetwatchWorld) {
    let labels = active_labels(world).await;
    assert!(labels.is_empty(), "expected no alerts, got {:?}", labels);
}

#[then(expr = "the only active alert should be {string}")]
async fn only_active_alert(world: &mut NetwatchWorld, label: String) {
    assert_eq!(active_labels(world).await, vec![label]);
}

#[then("the active alerts should be:")]
async fn active_alerts_in_order(world: &mut NetwatchWorld, step: &Step) {
    let table = step.table.as_ref().expect("step needs a table of labels");
    let expected: Vec<String> = table.rows.iter().map(|row| row[0].clone()).collect();
    assert_eq!(active_labels(world).await, expected);
}

#[then(expr = "host {string} should have {int} consecutive failures")]
async fn consecutive_failures(world: &mut NetwatchWorld, name: String, failures: u32) {
    let address = world.address_of(&name);
    let state = world.engine().state().read().await;
    let host = state.host_state(&address).expect("unknown host");
    assert_eq!(host.consecutive_failures, failures);
}

#[then("the last sweep should have raised an alert")]
fn last_sweep_raised(world: &mut NetwatchWorld) {
    let sweep = world.last_sweep.as_ref().expect("no sweep has run");
    assert!(
        sweep
            .transitions
            .iter()
            .any(|t| t.transition == netwatch::hysteresis::Transition::Raised),
        "expected a raise in {:?}",
        sweep.transitions
    );
}

#[given("the internet is unreachable")]
fn internet_unreachable(world: &mut NetwatchWorld) {
    world.internet.up.store(false, Ordering::SeqCst);
}

#[when("the internet comes back")]
fn internet_comes_back(world: &mut NetwatchWorld) {
    world.internet.up.store(true, Ordering::SeqCst);
}
