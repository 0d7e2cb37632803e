use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{format_naive_datetime_iso_millis, AuthUser};
use crate::db::operations::passages;
use crate::response::{json_error, AppError, SuccessResponse};
use crate::services::passage_provider::{Difficulty, GenerationError};
use crate::services::sentence_split::split_sentences;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub text: String,
    pub title: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub description: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Serialize)]
struct PassageSummary {
    id: i64,
    language: String,
    title: String,
    difficulty: String,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct SentenceSummary {
    id: i64,
    text: String,
    completion_status: bool,
}

/// Splits a pasted passage into sentences and stores both.
pub async fn parse(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ParseRequest>,
) -> Response {
    let proxy = match super::require_db(&state) {
        Ok(proxy) => proxy,
        Err(err) => return err.into_response(),
    };

    if body.title.trim().is_empty() {
        return AppError::validation("title must not be empty").into_response();
    }
    let sentences = split_sentences(&body.text);
    if sentences.is_empty() {
        return AppError::validation("text contains no sentences").into_response();
    }

    let language = body
        .language
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("en");

    match passages::create_passage_with_sentences(
        proxy.as_ref(),
        &user.id,
        language,
        body.title.trim(),
        "custom",
        &sentences,
    )
    .await
    {
        Ok(passage_id) => (
            StatusCode::CREATED,
            Json(SuccessResponse::new(json!({
                "passage_id": passage_id,
                "sentences": sentences,
            }))),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "passage insert failed");
            AppError::internal("failed to store passage").into_response()
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    let proxy = match super::require_db(&state) {
        Ok(proxy) => proxy,
        Err(err) => return err.into_response(),
    };

    match passages::list_passages(proxy.as_ref(), &user.id).await {
        Ok(records) => {
            let summaries: Vec<PassageSummary> = records
                .into_iter()
                .map(|record| PassageSummary {
                    id: record.id,
                    language: record.language,
                    title: record.title,
                    difficulty: record.difficulty,
                    created_at: format_naive_datetime_iso_millis(record.created_at),
                })
                .collect();
            Json(SuccessResponse::new(summaries)).into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "passage list failed");
            AppError::internal("failed to list passages").into_response()
        }
    }
}

pub async fn sentences(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(passage_id): Path<i64>,
) -> Response {
    let proxy = match super::require_db(&state) {
        Ok(proxy) => proxy,
        Err(err) => return err.into_response(),
    };

    match passages::list_passage_sentences(proxy.as_ref(), &user.id, passage_id).await {
        Ok(Some(records)) => {
            let summaries: Vec<SentenceSummary> = records
                .into_iter()
                .map(|record| SentenceSummary {
                    id: record.id,
                    text: record.text,
                    completion_status: record.completion_status,
                })
                .collect();
            Json(SuccessResponse::new(summaries)).into_response()
        }
        Ok(None) => AppError::not_found("passage not found").into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "sentence list failed");
            AppError::internal("failed to list sentences").into_response()
        }
    }
}

/// Generates a practice passage with the configured LLM. The result is
/// returned to the client, which decides whether to keep it via /parse.
pub async fn generate(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
    Json(body): Json<GenerateRequest>,
) -> Response {
    if body.description.trim().is_empty() {
        return AppError::validation("description must not be empty").into_response();
    }

    let provider = state.passage_provider();
    match provider
        .generate_passage(body.description.trim(), body.difficulty)
        .await
    {
        Ok(text) => Json(SuccessResponse::new(json!({ "text": text }))).into_response(),
        Err(GenerationError::NotConfigured(var)) => {
            tracing::warn!(missing = var, "passage generation unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "passage generation is not configured",
            )
            .into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "passage generation failed");
            AppError::internal("passage generation failed").into_response()
        }
    }
}
