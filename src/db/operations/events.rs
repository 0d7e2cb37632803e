use chrono::{NaiveDate, NaiveDateTime};

use crate::db::DatabaseProxy;

pub const EVENT_PRACTICE_PRON: &str = "PRACTICE_PRON";

pub async fn insert_event(
    proxy: &DatabaseProxy,
    user_id: &str,
    event_type: &str,
    timestamp: NaiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "events" ("userId", "eventType", "timestamp")
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(event_type)
    .bind(timestamp)
    .execute(proxy.pool())
    .await?;
    Ok(())
}

/// Distinct UTC calendar dates on which the user logged at least one event,
/// regardless of event type. Input to the streak walk.
pub async fn distinct_event_dates(
    proxy: &DatabaseProxy,
    user_id: &str,
) -> Result<Vec<NaiveDate>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT DISTINCT DATE("timestamp") as "date"
        FROM "events"
        WHERE "userId" = $1
        ORDER BY "date" ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(proxy.pool())
    .await
}

pub async fn count_events(
    proxy: &DatabaseProxy,
    user_id: &str,
    event_type: Option<&str>,
    since: Option<NaiveDateTime>,
) -> Result<i64, sqlx::Error> {
    let mut qb = sqlx::QueryBuilder::new(
        r#"SELECT COUNT(*) FROM "events" WHERE "userId" = "#,
    );
    qb.push_bind(user_id);
    if let Some(event_type) = event_type {
        qb.push(r#" AND "eventType" = "#);
        qb.push_bind(event_type);
    }
    if let Some(since) = since {
        qb.push(r#" AND "timestamp" >= "#);
        qb.push_bind(since);
    }

    qb.build_query_scalar().fetch_one(proxy.pool()).await
}
