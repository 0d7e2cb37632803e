use chrono::NaiveDateTime;
use sqlx::Row;
use uuid::Uuid;

use crate::db::DatabaseProxy;

/// One scored attempt, reduced to the fields the dashboard consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSample {
    pub timestamp: NaiveDateTime,
    pub accuracy: f64,
    pub fluency: f64,
    pub completeness: f64,
    pub pronunciation: f64,
}

#[derive(Debug, Clone)]
pub struct NewFeedback<'a> {
    pub user_id: &'a str,
    pub sentence_id: Option<i64>,
    pub provider_id: Option<Uuid>,
    pub display_text: &'a str,
    pub accuracy: f64,
    pub fluency: f64,
    pub completeness: f64,
    pub pronunciation: f64,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewFeedbackError<'a> {
    pub word: &'a str,
    pub phoneme: &'a str,
    pub syllable: &'a str,
    pub accuracy: f64,
    pub error_type: &'a str,
}

pub async fn insert_feedback(
    proxy: &DatabaseProxy,
    feedback: &NewFeedback<'_>,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO "feedbacks" (
            "userId", "sentenceId", "providerId", "displayText",
            "accuracyScore", "fluencyScore", "completenessScore", "pronScore",
            "timestamp"
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING "id"
        "#,
    )
    .bind(feedback.user_id)
    .bind(feedback.sentence_id)
    .bind(feedback.provider_id)
    .bind(feedback.display_text)
    .bind(feedback.accuracy)
    .bind(feedback.fluency)
    .bind(feedback.completeness)
    .bind(feedback.pronunciation)
    .bind(feedback.timestamp)
    .fetch_one(proxy.pool())
    .await?;

    row.try_get("id")
}

pub async fn insert_feedback_errors(
    proxy: &DatabaseProxy,
    feedback_id: i64,
    errors: &[NewFeedbackError<'_>],
) -> Result<(), sqlx::Error> {
    for error in errors {
        sqlx::query(
            r#"
            INSERT INTO "feedback_errors" (
                "feedbackId", "word", "phoneme", "syllable", "accuracyScore", "errorType"
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(feedback_id)
        .bind(error.word)
        .bind(error.phoneme)
        .bind(error.syllable)
        .bind(error.accuracy)
        .bind(error.error_type)
        .execute(proxy.pool())
        .await?;
    }
    Ok(())
}

pub async fn list_scores_since(
    proxy: &DatabaseProxy,
    user_id: &str,
    since: NaiveDateTime,
) -> Result<Vec<ScoreSample>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "timestamp", "accuracyScore", "fluencyScore",
               "completenessScore", "pronScore"
        FROM "feedbacks"
        WHERE "userId" = $1 AND "timestamp" >= $2
        ORDER BY "timestamp" ASC
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(proxy.pool())
    .await?;

    rows.into_iter().map(map_score_row).collect()
}

/// Window scores for every user active since the cutoff. Only users with at
/// least one feedback row in the window appear, so the percentile scan never
/// touches the full user table.
pub async fn list_all_user_scores_since(
    proxy: &DatabaseProxy,
    since: NaiveDateTime,
) -> Result<Vec<(String, ScoreSample)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "userId", "timestamp", "accuracyScore", "fluencyScore",
               "completenessScore", "pronScore"
        FROM "feedbacks"
        WHERE "timestamp" >= $1
        "#,
    )
    .bind(since)
    .fetch_all(proxy.pool())
    .await?;

    rows.into_iter()
        .map(|row| {
            let user_id: String = row.try_get("userId")?;
            let sample = map_score_row(row)?;
            Ok((user_id, sample))
        })
        .collect()
}

fn map_score_row(row: sqlx::postgres::PgRow) -> Result<ScoreSample, sqlx::Error> {
    Ok(ScoreSample {
        timestamp: row.try_get("timestamp")?,
        accuracy: row.try_get("accuracyScore")?,
        fluency: row.try_get("fluencyScore")?,
        completeness: row.try_get("completenessScore")?,
        pronunciation: row.try_get("pronScore")?,
    })
}
