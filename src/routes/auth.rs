use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{
    extract_token, format_naive_datetime_iso_millis, hash_token, sign_jwt_for_user, AuthUser,
};
use crate::db::operations::user;
use crate::response::{json_error, AppError, SuccessResponse};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub base_language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let proxy = match super::require_db(&state) {
        Ok(proxy) => proxy,
        Err(err) => return err.into_response(),
    };

    let email = body.email.trim().to_lowercase();
    if !email.contains('@') {
        return AppError::validation("invalid email address").into_response();
    }
    if body.name.trim().is_empty() {
        return AppError::validation("name must not be empty").into_response();
    }
    if body.password.len() < MIN_PASSWORD_LEN {
        return AppError::validation("password must be at least 8 characters").into_response();
    }

    match user::email_exists(proxy.as_ref(), &email).await {
        Ok(true) => return email_in_use_response(),
        Ok(false) => {}
        Err(err) => {
            tracing::warn!(error = %err, "register email lookup failed");
            return AppError::internal("failed to create account").into_response();
        }
    }

    let password_hash = match bcrypt::hash(&body.password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::warn!(error = %err, "password hashing failed");
            return AppError::internal("failed to create account").into_response();
        }
    };

    let user_id = Uuid::new_v4().to_string();
    let base_language = body
        .base_language
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("en");

    if let Err(err) = user::create_user(
        proxy.as_ref(),
        &user_id,
        &email,
        body.name.trim(),
        &password_hash,
        base_language,
    )
    .await
    {
        tracing::warn!(error = %err, "user insert failed");
        return AppError::internal("failed to create account").into_response();
    }

    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "account created" })),
    )
        .into_response()
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
    let proxy = match super::require_db(&state) {
        Ok(proxy) => proxy,
        Err(err) => return err.into_response(),
    };

    let email = body.email.trim().to_lowercase();
    let record = match user::find_by_email(proxy.as_ref(), &email).await {
        Ok(Some(record)) => record,
        Ok(None) => return AppError::unauthorized("invalid email or password").into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "login user lookup failed");
            return AppError::internal("login failed").into_response();
        }
    };

    match bcrypt::verify(&body.password, &record.password_hash) {
        Ok(true) => {}
        Ok(false) => return AppError::unauthorized("invalid email or password").into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "password verification failed");
            return AppError::internal("login failed").into_response();
        }
    }

    let (token, expires_at) = match sign_jwt_for_user(&record.id) {
        Ok(pair) => pair,
        Err(err) => {
            tracing::warn!(error = %err, "token signing failed");
            return AppError::internal("login failed").into_response();
        }
    };

    if let Err(err) =
        user::create_session(proxy.as_ref(), &hash_token(&token), &record.id, expires_at).await
    {
        tracing::warn!(error = %err, "session insert failed");
        return AppError::internal("login failed").into_response();
    }

    let profile = AuthUser {
        id: record.id,
        email: record.email,
        name: record.name,
        role: record.role,
        base_language: record.base_language,
        created_at: format_naive_datetime_iso_millis(record.created_at),
        updated_at: format_naive_datetime_iso_millis(record.updated_at),
    };

    Json(SuccessResponse::new(json!({
        "user": profile,
        "token": token,
        "expiry": format_naive_datetime_iso_millis(expires_at),
    })))
    .into_response()
}

/// Revokes the session behind the presented token.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let proxy = match super::require_db(&state) {
        Ok(proxy) => proxy,
        Err(err) => return err.into_response(),
    };

    let Some(token) = extract_token(&headers) else {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing auth token")
            .into_response();
    };

    if let Err(err) = proxy.delete_session_by_token_hash(&hash_token(&token)).await {
        tracing::warn!(error = %err, "session delete failed");
        return AppError::internal("logout failed").into_response();
    }

    Json(json!({ "success": true, "message": "logged out" })).into_response()
}

pub async fn logout_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    let proxy = match super::require_db(&state) {
        Ok(proxy) => proxy,
        Err(err) => return err.into_response(),
    };

    match proxy.delete_sessions_for_user(&user.id).await {
        Ok(revoked) => Json(SuccessResponse::new(json!({ "revoked": revoked }))).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "bulk session delete failed");
            AppError::internal("logout failed").into_response()
        }
    }
}

pub async fn verify(Extension(user): Extension<AuthUser>) -> Response {
    Json(SuccessResponse::new(user)).into_response()
}

/// Duplicate sign-up is a normal response, not an error status; the
/// sign-up form surfaces the message inline.
fn email_in_use_response() -> Response {
    Json(json!({ "success": false, "message": "Email already in use." })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_email_is_reported_without_an_error_status() {
        let response = email_in_use_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Email already in use.");
    }
}
