use sqlx::types::chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};

/// V3 pool registry row.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Pool {
    pub chain_id: i64,
    pub pool_address: String,
    pub token0: String,
    pub token1: String,
    pub fee: i64,
    pub tick_spacing: i32,
    pub first_seen_block: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for upserting a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPool {
    pub chain_id: u64,
    pub pool_address: String,
    pub token0: String,
    pub token1: String,
    pub fee: u32,
    pub tick_spacing: i32,
    pub first_seen_block: u64,
}

impl Pool {
    /// Upsert one pool. `first_seen_block` keeps the lowest block ever
    /// recorded for the pool.
    pub async fn upsert<'c, E>(pool: &NewPool, connection: E) -> Result<(), sqlx::Error>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let query = r#"
            INSERT INTO pools (
                chain_id, pool_address, token0, token1, fee, tick_spacing,
                first_seen_block, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
            ON CONFLICT (chain_id, pool_address)
            DO UPDATE SET
                token0 = EXCLUDED.token0,
                token1 = EXCLUDED.token1,
                fee = EXCLUDED.fee,
                tick_spacing = EXCLUDED.tick_spacing,
                first_seen_block = LEAST(pools.first_seen_block, EXCLUDED.first_seen_block),
                updated_at = now()
        "#;

        sqlx::query(query)
            .bind(pool.chain_id as i64)
            .bind(&pool.pool_address)
            .bind(&pool.token0)
            .bind(&pool.token1)
            .bind(pool.fee as i64)
            .bind(pool.tick_spacing)
            .bind(pool.first_seen_block as i64)
            .execute(connection)
            .await?;

        Ok(())
    }

    /// Upsert a batch of pools inside one transaction.
    pub async fn upsert_batch(pools: &[NewPool], db: &PgPool) -> Result<(), sqlx::Error> {
        if pools.is_empty() {
            return Ok(());
        }

        let mut tx = db.begin().await?;
        for pool in pools {
            Self::upsert(pool, &mut *tx).await?;
        }
        tx.commit().await
    }

    pub async fn find_by_address<'c, E>(
        chain_id: u64,
        pool_address: &str,
        connection: E,
    ) -> Result<Option<Pool>, sqlx::Error>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query_as::<_, Pool>(
            "SELECT * FROM pools WHERE chain_id = $1 AND pool_address = $2",
        )
        .bind(chain_id as i64)
        .bind(pool_address)
        .fetch_optional(connection)
        .await
    }
}
