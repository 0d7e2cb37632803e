use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::db::operations::events;
use crate::response::{AppError, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecordEventRequest {
    pub event_type: String,
}

/// Records a practice event. Any event type feeds the streak, so clients
/// log reading practice and similar activity through here as well.
pub async fn record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RecordEventRequest>,
) -> Response {
    let proxy = match super::require_db(&state) {
        Ok(proxy) => proxy,
        Err(err) => return err.into_response(),
    };

    let event_type = body.event_type.trim();
    if event_type.is_empty() {
        return AppError::validation("event_type must not be empty").into_response();
    }

    match events::insert_event(proxy.as_ref(), &user.id, event_type, Utc::now().naive_utc()).await
    {
        Ok(()) => Json(SuccessResponse::new(json!({ "recorded": true }))).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "event insert failed");
            AppError::internal("failed to record event").into_response()
        }
    }
}
