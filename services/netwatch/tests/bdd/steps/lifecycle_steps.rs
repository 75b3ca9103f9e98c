//! BDD step definitions for netwatch builder and lifecycle feature

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};
use tokio_util::sync::CancellationToken;

use netwatch::probe::{ConnectProber, EchoProber};
use netwatch::NetwatchBuilder;

use crate::world::NetwatchWorld;

fn build_netwatch_builder(world: &mut NetwatchWorld) -> NetwatchBuilder {
    let mut config = world.config.clone();
    config.api.enabled = false;
    config.history.enabled = false;

    let hosts: Arc<dyn EchoProber> = world.hosts.clone();
    let internet: Arc<dyn ConnectProber> = world.internet.clone();

    let mut builder = NetwatchBuilder::new(config)
        .with_echo_prober(hosts)
        .with_connect_prober(internet)
        .with_alert_log(world.log.clone());

    if let Some(cancel) = world.lifecycle_cancel.take() {
        builder = builder.with_cancellation_token(cancel);
    }

    builder
}

#[given("no monitored hosts")]
fn no_monitored_hosts(world: &mut NetwatchWorld) {
    world.config.targets.clear();
    world.targets_declared = true;
}

#[given("a pre-cancelled cancellation token")]
fn pre_cancelled_token(world: &mut NetwatchWorld) {
    let token = CancellationToken::new();
    token.cancel();
    world.lifecycle_cancel = Some(token);
}

#[when("netwatch is built")]
async fn netwatch_is_built(world: &mut NetwatchWorld) {
    let builder = build_netwatch_builder(world);
    world.lifecycle_build_succeeded = Some(builder.build().await.is_ok());
}

#[when("netwatch is built and started")]
async fn netwatch_is_built_and_started(world: &mut NetwatchWorld) {
    let builder = build_netwatch_builder(world);
    match builder.build().await {
        Ok(netwatch) => {
            world.lifecycle_build_succeeded = Some(true);
            let started =
                tokio::time::timeout(Duration::from_secs(10), netwatch.start()).await;
            world.lifecycle_start_succeeded = Some(matches!(started, Ok(Ok(()))));
        }
        Err(_) => {
            world.lifecycle_build_succeeded = Some(false);
            world.lifecycle_start_succeeded = Some(false);
        }
    }
}

#[then("the build should fail")]
fn build_should_fail(world: &mut NetwatchWorld) {
    assert_eq!(
        world.lifecycle_build_succeeded,
        Some(false),
        "Expected build to fail"
    );
}

#[then("the lifecycle should complete successfully")]
fn lifecycle_should_complete(world: &mut NetwatchWorld) {
    assert_eq!(
        world.lifecycle_build_succeeded,
        Some(true),
        "Expected build to succeed"
    );
    assert_eq!(
        world.lifecycle_start_succeeded,
        Some(true),
        "Expected start to succeed"
    );
}
