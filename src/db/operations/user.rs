use chrono::NaiveDateTime;
use sqlx::Row;

use crate::db::DatabaseProxy;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub base_language: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub async fn email_exists(proxy: &DatabaseProxy, email: &str) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM "users" WHERE "email" = $1"#)
            .bind(email)
            .fetch_one(proxy.pool())
            .await?;
    Ok(count > 0)
}

pub async fn create_user(
    proxy: &DatabaseProxy,
    id: &str,
    email: &str,
    name: &str,
    password_hash: &str,
    base_language: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "users" ("id", "email", "name", "passwordHash", "baseLanguage")
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(base_language)
    .execute(proxy.pool())
    .await?;
    Ok(())
}

pub async fn find_by_email(
    proxy: &DatabaseProxy,
    email: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id", "email", "name", "passwordHash", "baseLanguage", "role",
               "createdAt", "updatedAt"
        FROM "users"
        WHERE "email" = $1
        "#,
    )
    .bind(email)
    .fetch_optional(proxy.pool())
    .await?;

    row.map(map_user_row).transpose()
}

pub async fn find_by_id(
    proxy: &DatabaseProxy,
    user_id: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id", "email", "name", "passwordHash", "baseLanguage", "role",
               "createdAt", "updatedAt"
        FROM "users"
        WHERE "id" = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(proxy.pool())
    .await?;

    row.map(map_user_row).transpose()
}

pub async fn create_session(
    proxy: &DatabaseProxy,
    token_hash: &str,
    user_id: &str,
    expires_at: NaiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "sessions" ("token", "userId", "expiresAt")
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(expires_at)
    .execute(proxy.pool())
    .await?;
    Ok(())
}

fn map_user_row(row: sqlx::postgres::PgRow) -> Result<UserRecord, sqlx::Error> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("passwordHash")?,
        base_language: row.try_get("baseLanguage")?,
        role: row.try_get("role")?,
        created_at: row.try_get("createdAt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}
