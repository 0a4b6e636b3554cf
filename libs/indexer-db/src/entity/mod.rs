pub mod indexer_state;
pub mod pool;
pub mod pool_window_metrics;

pub use indexer_state::IndexerState;
pub use pool::{NewPool, Pool};
pub use pool_window_metrics::{NewPoolWindowMetrics, PoolWindowMetrics};
