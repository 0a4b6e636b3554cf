use async_trait::async_trait;
use sqlx::PgPool;

use indexer_db::entity::{NewPool, NewPoolWindowMetrics, Pool, PoolWindowMetrics};

use crate::error::AppError;

/// Destination for flushed pool records and window metrics.
///
/// Upserts must be idempotent under their natural keys; flushed windows
/// may be re-emitted after a restart from the safe watermark.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn upsert_pools(&self, pools: &[NewPool]) -> Result<(), AppError>;
    async fn upsert_window_metrics(
        &self,
        metrics: &[NewPoolWindowMetrics],
    ) -> Result<(), AppError>;
}

#[async_trait]
impl MetricStore for PgPool {
    async fn upsert_pools(&self, pools: &[NewPool]) -> Result<(), AppError> {
        Ok(Pool::upsert_batch(pools, self).await?)
    }

    async fn upsert_window_metrics(
        &self,
        metrics: &[NewPoolWindowMetrics],
    ) -> Result<(), AppError> {
        Ok(PoolWindowMetrics::upsert_batch(metrics, self).await?)
    }
}
