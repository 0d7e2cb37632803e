use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use crate::auth::AuthUser;
use crate::response::SuccessResponse;

pub async fn me(Extension(user): Extension<AuthUser>) -> Response {
    Json(SuccessResponse::new(user)).into_response()
}
