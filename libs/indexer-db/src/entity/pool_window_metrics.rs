use sqlx::types::chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};

/// Aggregated per-pool window metrics row.
///
/// Amount columns hold exact decimal strings scaled by token decimals;
/// the fiat columns stay NULL (no price oracle in this pipeline).
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct PoolWindowMetrics {
    pub chain_id: i64,
    pub pool_address: String,
    pub window_size_seconds: i64,
    pub window_start_ts: DateTime<Utc>,
    pub window_end_ts: DateTime<Utc>,
    pub swap_count: i64,
    pub volume0: String,
    pub volume1: String,
    pub fee0: String,
    pub fee1: String,
    pub fee_usd: Option<String>,
    pub fee_rate0: Option<String>,
    pub fee_rate1: Option<String>,
    pub tvl0: Option<String>,
    pub tvl1: Option<String>,
    pub tvl_usd: Option<String>,
    pub apr: Option<String>,
    pub fee_method: String,
    pub tvl_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for upserting one window metrics row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoolWindowMetrics {
    pub chain_id: u64,
    pub pool_address: String,
    pub window_size_seconds: u64,
    pub window_start_ts: DateTime<Utc>,
    pub window_end_ts: DateTime<Utc>,
    pub swap_count: u64,
    pub volume0: String,
    pub volume1: String,
    pub fee0: String,
    pub fee1: String,
    pub fee_usd: Option<String>,
    pub fee_rate0: Option<String>,
    pub fee_rate1: Option<String>,
    pub tvl0: Option<String>,
    pub tvl1: Option<String>,
    pub tvl_usd: Option<String>,
    pub apr: Option<String>,
    pub fee_method: String,
    pub tvl_method: String,
}

impl PoolWindowMetrics {
    /// Upsert one metrics row; all non-key columns are replaced.
    pub async fn upsert<'c, E>(
        metrics: &NewPoolWindowMetrics,
        connection: E,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let query = r#"
            INSERT INTO pool_window_metrics (
                chain_id, pool_address, window_size_seconds, window_start_ts, window_end_ts,
                swap_count, volume0, volume1, fee0, fee1, fee_usd, fee_rate0, fee_rate1,
                tvl0, tvl1, tvl_usd, apr, fee_method, tvl_method, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, now(), now()
            )
            ON CONFLICT (chain_id, pool_address, window_size_seconds, window_start_ts)
            DO UPDATE SET
                window_end_ts = EXCLUDED.window_end_ts,
                swap_count = EXCLUDED.swap_count,
                volume0 = EXCLUDED.volume0,
                volume1 = EXCLUDED.volume1,
                fee0 = EXCLUDED.fee0,
                fee1 = EXCLUDED.fee1,
                fee_usd = EXCLUDED.fee_usd,
                fee_rate0 = EXCLUDED.fee_rate0,
                fee_rate1 = EXCLUDED.fee_rate1,
                tvl0 = EXCLUDED.tvl0,
                tvl1 = EXCLUDED.tvl1,
                tvl_usd = EXCLUDED.tvl_usd,
                apr = EXCLUDED.apr,
                fee_method = EXCLUDED.fee_method,
                tvl_method = EXCLUDED.tvl_method,
                updated_at = now()
        "#;

        sqlx::query(query)
            .bind(metrics.chain_id as i64)
            .bind(&metrics.pool_address)
            .bind(metrics.window_size_seconds as i64)
            .bind(metrics.window_start_ts)
            .bind(metrics.window_end_ts)
            .bind(metrics.swap_count as i64)
            .bind(&metrics.volume0)
            .bind(&metrics.volume1)
            .bind(&metrics.fee0)
            .bind(&metrics.fee1)
            .bind(&metrics.fee_usd)
            .bind(&metrics.fee_rate0)
            .bind(&metrics.fee_rate1)
            .bind(&metrics.tvl0)
            .bind(&metrics.tvl1)
            .bind(&metrics.tvl_usd)
            .bind(&metrics.apr)
            .bind(&metrics.fee_method)
            .bind(&metrics.tvl_method)
            .execute(connection)
            .await?;

        Ok(())
    }

    /// Upsert a batch of metrics rows inside one transaction.
    pub async fn upsert_batch(
        metrics: &[NewPoolWindowMetrics],
        db: &PgPool,
    ) -> Result<(), sqlx::Error> {
        if metrics.is_empty() {
            return Ok(());
        }

        let mut tx = db.begin().await?;
        for row in metrics {
            Self::upsert(row, &mut *tx).await?;
        }
        tx.commit().await
    }
}
