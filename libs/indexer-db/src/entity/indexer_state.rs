use sqlx::types::chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

/// Named progress checkpoint shared by the pipeline stages.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct IndexerState {
    pub name: String,
    pub last_processed_ts: i64,
    pub updated_at: DateTime<Utc>,
}

impl IndexerState {
    /// Returns the checkpoint timestamp for `name`, if one was saved.
    pub async fn load<'c, E>(name: &str, connection: E) -> Result<Option<u64>, sqlx::Error>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let ts: Option<i64> = sqlx::query_scalar(
            "SELECT last_processed_ts FROM indexer_state WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(connection)
        .await?;

        Ok(ts.map(|value| value as u64))
    }

    /// Upserts the checkpoint timestamp for `name`.
    pub async fn save<'c, E>(name: &str, ts: u64, connection: E) -> Result<(), sqlx::Error>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO indexer_state (name, last_processed_ts, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (name)
            DO UPDATE SET last_processed_ts = EXCLUDED.last_processed_ts, updated_at = now()
            "#,
        )
        .bind(name)
        .bind(ts as i64)
        .execute(connection)
        .await?;

        Ok(())
    }
}
