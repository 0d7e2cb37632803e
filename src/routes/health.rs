use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/live", get(live))
        .route("/info", get(info))
}

async fn health(State(state): State<AppState>) -> Response {
    let database = match state.db_proxy() {
        Some(proxy) => match proxy.ping().await {
            Ok(latency) => json!({
                "connected": true,
                "latency_ms": latency.as_millis() as u64,
            }),
            Err(err) => {
                tracing::warn!(error = %err, "health check db ping failed");
                json!({ "connected": false })
            }
        },
        None => json!({ "connected": false }),
    };

    let healthy = database["connected"] == json!(true);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "uptime_seconds": state.uptime_seconds(),
            "database": database,
        })),
    )
        .into_response()
}

async fn live() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

async fn info(State(state): State<AppState>) -> Response {
    let started_at = DateTime::<Utc>::from(state.started_at_system())
        .to_rfc3339_opts(SecondsFormat::Secs, true);

    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": started_at,
        "uptime_seconds": state.uptime_seconds(),
        "providers": {
            "speech": state.speech_provider().is_available(),
            "passage_generation": state.passage_provider().is_available(),
        },
    }))
    .into_response()
}
