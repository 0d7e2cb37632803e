use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use serde_json::json;

use crate::auth::AuthUser;
use crate::response::AppError;
use crate::services::progress;
use crate::state::AppState;

/// The dashboard snapshot. `now` is captured once here so every window
/// cutoff and the streak walk agree on the same instant.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    let proxy = match super::require_db(&state) {
        Ok(proxy) => proxy,
        Err(err) => return err.into_response(),
    };

    let now = Utc::now();
    match progress::compute_dashboard(proxy.as_ref(), &user.id, now).await {
        Ok(dashboard) => Json(json!({ "progress_dashboard": dashboard })).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, user_id = %user.id, "dashboard computation failed");
            AppError::internal("failed to compute dashboard").into_response()
        }
    }
}
