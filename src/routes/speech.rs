use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::db::operations::events::{self, EVENT_PRACTICE_PRON};
use crate::db::operations::feedback::{self, NewFeedback, NewFeedbackError};
use crate::response::{json_error, AppError};
use crate::services::speech_provider::{AssessmentOutcome, SpeechError};
use crate::state::AppState;

/// Field names mirror the recognizer's payload so existing clients keep
/// working unchanged.
#[derive(Debug, Serialize)]
struct AssessmentResponse {
    #[serde(rename = "AccuracyScore")]
    accuracy_score: f64,
    #[serde(rename = "FluencyScore")]
    fluency_score: f64,
    #[serde(rename = "PronunciationScore")]
    pronunciation_score: f64,
    #[serde(rename = "JsonResult")]
    json_result: serde_json::Value,
}

struct AssessmentUpload {
    audio: Vec<u8>,
    text: String,
    sentence_id: Option<i64>,
}

/// Grades an uploaded recording, persists the feedback plus per-word
/// errors, and logs a pronunciation practice event.
pub async fn assess(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Response {
    let proxy = match super::require_db(&state) {
        Ok(proxy) => proxy,
        Err(err) => return err.into_response(),
    };

    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(err) => return err.into_response(),
    };

    let outcome = match state
        .speech_provider()
        .assess(upload.audio, &upload.text)
        .await
    {
        Ok(outcome) => outcome,
        Err(SpeechError::NotRecognized) => {
            return AppError::bad_request("speech not recognized").into_response();
        }
        Err(SpeechError::NotConfigured(var)) => {
            tracing::warn!(missing = var, "speech assessment unavailable");
            return json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "speech assessment is not configured",
            )
            .into_response();
        }
        Err(err) => {
            tracing::warn!(error = %err, "speech assessment failed");
            return AppError::internal("speech assessment failed").into_response();
        }
    };

    if let Err(err) = persist_outcome(proxy.as_ref(), &user.id, upload.sentence_id, &outcome).await
    {
        tracing::warn!(error = %err, "feedback persistence failed");
        return AppError::internal("failed to store assessment").into_response();
    }

    Json(AssessmentResponse {
        accuracy_score: outcome.accuracy,
        fluency_score: outcome.fluency,
        pronunciation_score: outcome.pronunciation,
        json_result: outcome.raw,
    })
    .into_response()
}

async fn read_upload(mut multipart: Multipart) -> Result<AssessmentUpload, AppError> {
    let mut audio: Option<Vec<u8>> = None;
    let mut text: Option<String> = None;
    let mut sentence_id: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::bad_request("malformed multipart body"))?
    {
        match field.name().unwrap_or_default() {
            "audio" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("failed to read audio field"))?;
                audio = Some(bytes.to_vec());
            }
            "text" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("failed to read text field"))?;
                text = Some(value);
            }
            "sentence_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("failed to read sentence_id field"))?;
                sentence_id = value.trim().parse().ok();
            }
            _ => {}
        }
    }

    let audio = audio
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::validation("audio field is required"))?;
    let text = text
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::validation("text field is required"))?;

    Ok(AssessmentUpload {
        audio,
        text,
        sentence_id,
    })
}

async fn persist_outcome(
    proxy: &crate::db::DatabaseProxy,
    user_id: &str,
    sentence_id: Option<i64>,
    outcome: &AssessmentOutcome,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().naive_utc();

    let feedback_id = feedback::insert_feedback(
        proxy,
        &NewFeedback {
            user_id,
            sentence_id,
            provider_id: Some(outcome.provider_id),
            display_text: &outcome.display_text,
            accuracy: outcome.accuracy,
            fluency: outcome.fluency,
            completeness: outcome.completeness,
            pronunciation: outcome.pronunciation,
            timestamp: now,
        },
    )
    .await?;

    let errors: Vec<NewFeedbackError<'_>> = outcome
        .words
        .iter()
        .filter(|word| word.error_type != "None")
        .map(|word| NewFeedbackError {
            word: &word.word,
            phoneme: "",
            syllable: "",
            accuracy: word.accuracy,
            error_type: &word.error_type,
        })
        .collect();
    feedback::insert_feedback_errors(proxy, feedback_id, &errors).await?;

    events::insert_event(proxy, user_id, EVENT_PRACTICE_PRON, now).await
}
