//! HTTP query API: current alerts, host status and alert history

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::history::AlertLog;
use crate::state::{AlertRecord, StateHandle};

/// Display format for every timestamp the API returns
pub const TIME_FORMAT: &str = "%H:%M:%S %d-%m-%Y";

/// API application state
#[derive(Clone)]
pub struct ApiState {
    pub state: StateHandle,
    pub log: Arc<dyn AlertLog>,
    /// Rows returned by `/historical`
    pub recent_limit: usize,
}

/// Build the API router. Any origin may read it.
pub fn build_router(api: ApiState) -> Router {
    Router::new()
        .route("/alerts", get(alerts_handler))
        .route("/status", get(status_handler))
        .route("/historical", get(historical_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(api)
}

/// Render `ts` in the time zone `tz`
pub fn format_time<Tz>(ts: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    ts.with_timezone(tz).format(TIME_FORMAT).to_string()
}

fn local_time(ts: &DateTime<Utc>) -> String {
    format_time(ts, &Local)
}

fn record_json(record: &AlertRecord) -> Value {
    json!({
        "label": record.label,
        "time": local_time(&record.occurred_at),
    })
}

async fn alerts_handler(State(api): State<ApiState>) -> Json<Value> {
    let cache = api.state.read().await.alerts_snapshot();
    let alerts: Vec<Value> = cache.records.iter().map(record_json).collect();

    Json(json!({
        "alerts": alerts,
        "success": true,
    }))
}

async fn status_handler(State(api): State<ApiState>) -> Json<Value> {
    let status = api.state.read().await.status_snapshot();

    let hosts: Vec<Value> = status
        .hosts
        .iter()
        .map(|h| {
            json!({
                "name": h.name,
                "ip": h.address,
                "up": h.up,
                "alert_active": h.alert_active,
                "last_change": h.last_change_at.as_ref().map(local_time),
                "last_result_ts": h.last_probe_at.as_ref().map(local_time),
            })
        })
        .collect();

    Json(json!({
        "internet_ok": status.internet.reachable,
        "internet_last_checked": status.internet.last_checked_at.as_ref().map(local_time),
        "hosts": hosts,
        "success": true,
    }))
}

async fn historical_handler(State(api): State<ApiState>) -> Response {
    match api.log.list_recent(api.recent_limit).await {
        Ok(mut records) => {
            // Stored newest first, returned oldest first
            records.reverse();
            let alerts: Vec<Value> = records.iter().map(record_json).collect();
            Json(json!({
                "alerts": alerts,
                "success": true,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::warn!("Failed to read alert history: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "OK"
}
