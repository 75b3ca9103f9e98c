//! BDD step definitions for the HTTP query API

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use cucumber::{then, when};
use tower::ServiceExt;

use netwatch::api::{build_router, ApiState};

use crate::world::NetwatchWorld;

#[when(expr = "a client requests {string}")]
async fn client_requests(world: &mut NetwatchWorld, uri: String) {
    let state = Arc::clone(world.engine().state());
    let router = build_router(ApiState {
        state,
        log: world.log.clone(),
        recent_limit: world.config.history.recent_limit,
    });

    let response = router
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    world.response_status = Some(response.status().as_u16());

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    world.response_json = serde_json::from_slice(&body).ok();
}

fn response_json(world: &NetwatchWorld) -> &serde_json::Value {
    world.response_json.as_ref().expect("no JSON response")
}

#[then(expr = "the response status should be {int}")]
fn response_status(world: &mut NetwatchWorld, status: u16) {
    assert_eq!(world.response_status, Some(status));
}

#[then("the response should report success")]
fn response_success(world: &mut NetwatchWorld) {
    assert_eq!(response_json(world)["success"], true);
}

#[then(expr = "the response should list {int} alert(s)")]
fn response_lists_alerts(world: &mut NetwatchWorld, count: usize) {
    let alerts = response_json(world)["alerts"]
        .as_array()
        .expect("response has no alerts array");
    assert_eq!(alerts.len(), count);
}

#[then(expr = "response alert {int} should be labelled {string}")]
fn response_alert_label(world: &mut NetwatchWorld, index: usize, label: String) {
    assert_eq!(response_json(world)["alerts"][index - 1]["label"], label.as_str());
}

#[then(expr = "the status of host {string} should be unknown")]
fn host_status_unknown(world: &mut NetwatchWorld, name: String) {
    let host = find_host(response_json(world), &name);
    assert!(host["up"].is_null());
    assert_eq!(host["alert_active"], false);
}

#[then(expr = "host {string} should be reported down with an active alert")]
fn host_status_down(world: &mut NetwatchWorld, name: String) {
    let host = find_host(response_json(world), &name);
    assert_eq!(host["up"], false);
    assert_eq!(host["alert_active"], true);
    assert!(host["last_change"].is_string());
}

#[then(expr = "the status should report internet_ok as {word}")]
fn status_internet_ok(world: &mut NetwatchWorld, value: String) {
    let expected: bool = value.parse().expect("expected true or false");
    assert_eq!(response_json(world)["internet_ok"], expected);
}

fn find_host<'a>(json: &'a serde_json::Value, name: &str) -> &'a serde_json::Value {
    json["hosts"]
        .as_array()
        .expect("response has no hosts array")
        .iter()
        .find(|h| h["name"] == name)
        .unwrap_or_else(|| panic!("no host '{}' in status", name))
}
