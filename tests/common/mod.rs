use axum::Router;

/// App wired without a database. Health probes and the auth middleware
/// still behave, which is what these tests exercise.
pub fn create_test_app() -> Router {
    parla_backend::create_app(None)
}
