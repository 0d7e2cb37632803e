use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::db::DatabaseProxy;
use crate::middleware::auth::require_auth;
use crate::response::{json_error, AppError};
use crate::state::AppState;

pub mod auth;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod passages;
pub mod speech;
pub mod users;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/logout-all", post(auth::logout_all))
        .route("/api/auth/verify", get(auth::verify))
        .route("/api/users/me", get(users::me))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route("/api/passages", get(passages::list))
        .route("/api/passages/parse", post(passages::parse))
        .route("/api/passages/generate", post(passages::generate))
        .route("/api/passages/:id/sentences", get(passages::sentences))
        .route("/api/speech/assessment", post(speech::assess))
        .route("/api/events", post(events::record))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .merge(protected)
        .nest("/health", health::router())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "route not found").into_response()
}

/// Shared by handlers that cannot serve without a live database.
pub(crate) fn require_db(state: &AppState) -> Result<Arc<DatabaseProxy>, AppError> {
    state.db_proxy().ok_or_else(|| {
        json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "database unavailable",
        )
    })
}
