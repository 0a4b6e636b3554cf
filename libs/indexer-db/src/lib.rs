use std::env;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod entity;

pub use entity::{IndexerState, NewPool, NewPoolWindowMetrics, Pool, PoolWindowMetrics};

mod defaults {
    pub const DATABASE_MAX_CONNECTIONS: &str = "5";
}

/// Builds the Postgres connection pool from `DATABASE_URL`.
///
/// Loads `.env` if present. `DATABASE_MAX_CONNECTIONS` caps the pool.
pub async fn initialize_database() -> Result<PgPool, sqlx::Error> {
    dotenvy::dotenv().ok();

    let url = env::var("DATABASE_URL")
        .map_err(|_| sqlx::Error::Configuration("DATABASE_URL is not set".into()))?;

    let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
        .unwrap_or_else(|_| defaults::DATABASE_MAX_CONNECTIONS.to_string())
        .parse::<u32>()
        .unwrap_or(5);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&url)
        .await
}
