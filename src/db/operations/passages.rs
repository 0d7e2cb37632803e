use chrono::NaiveDateTime;
use sqlx::Row;

use crate::db::DatabaseProxy;

#[derive(Debug, Clone)]
pub struct PassageRecord {
    pub id: i64,
    pub language: String,
    pub title: String,
    pub difficulty: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct SentenceRecord {
    pub id: i64,
    pub text: String,
    pub completion_status: bool,
}

pub async fn create_passage_with_sentences(
    proxy: &DatabaseProxy,
    user_id: &str,
    language: &str,
    title: &str,
    difficulty: &str,
    sentences: &[String],
) -> Result<i64, sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;

    let row = sqlx::query(
        r#"
        INSERT INTO "passages" ("userId", "language", "title", "difficulty")
        VALUES ($1, $2, $3, $4)
        RETURNING "id"
        "#,
    )
    .bind(user_id)
    .bind(language)
    .bind(title)
    .bind(difficulty)
    .fetch_one(&mut *tx)
    .await?;
    let passage_id: i64 = row.try_get("id")?;

    for text in sentences {
        sqlx::query(
            r#"
            INSERT INTO "sentences" ("passageId", "text", "completionStatus")
            VALUES ($1, $2, FALSE)
            "#,
        )
        .bind(passage_id)
        .bind(text)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(passage_id)
}

pub async fn list_passages(
    proxy: &DatabaseProxy,
    user_id: &str,
) -> Result<Vec<PassageRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "id", "language", "title", "difficulty", "createdAt"
        FROM "passages"
        WHERE "userId" = $1
        ORDER BY "createdAt" DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(proxy.pool())
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(PassageRecord {
                id: row.try_get("id")?,
                language: row.try_get("language")?,
                title: row.try_get("title")?,
                difficulty: row.try_get("difficulty")?,
                created_at: row.try_get("createdAt")?,
            })
        })
        .collect()
}

/// Sentences of a passage, only when the passage belongs to the user.
/// `None` means not found or owned by someone else.
pub async fn list_passage_sentences(
    proxy: &DatabaseProxy,
    user_id: &str,
    passage_id: i64,
) -> Result<Option<Vec<SentenceRecord>>, sqlx::Error> {
    let owned: Option<i64> = sqlx::query_scalar(
        r#"SELECT "id" FROM "passages" WHERE "id" = $1 AND "userId" = $2"#,
    )
    .bind(passage_id)
    .bind(user_id)
    .fetch_optional(proxy.pool())
    .await?;

    if owned.is_none() {
        return Ok(None);
    }

    let rows = sqlx::query(
        r#"
        SELECT "id", "text", "completionStatus"
        FROM "sentences"
        WHERE "passageId" = $1
        ORDER BY "id" ASC
        "#,
    )
    .bind(passage_id)
    .fetch_all(proxy.pool())
    .await?;

    let sentences = rows
        .into_iter()
        .map(|row| {
            Ok(SentenceRecord {
                id: row.try_get("id")?,
                text: row.try_get("text")?,
                completion_status: row.try_get("completionStatus")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(Some(sentences))
}
