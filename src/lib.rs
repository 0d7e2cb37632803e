pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::DatabaseProxy;
use crate::state::AppState;

/// Builds the full application router. `db_proxy` is optional so the
/// server can come up (and serve health probes) before the database does.
pub fn create_app(db_proxy: Option<Arc<DatabaseProxy>>) -> Router {
    let state = AppState::new(db_proxy);

    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
