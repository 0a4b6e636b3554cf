use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use num_bigint::{BigInt, Sign};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use indexer_db::entity::{NewPool, NewPoolWindowMetrics};
use indexer_model::TypedEventRecord;

use crate::accumulator::Accumulator;
use crate::amounts::{compute_apr, compute_rate, format_rate, format_token_amount};
use crate::error::AppError;
use crate::state::StateStore;
use crate::store::MetricStore;
use crate::tvl::{self, ChainSource, TVL_METHOD_NONE};

pub const FEE_METHOD_APPROX: &str = "approx_from_feeTier";

/// Aggregation settings.
pub struct Config {
    pub window_seconds: u64,
    /// Rows buffered before an upsert round-trip; 0 falls back to 1000.
    pub batch_size: usize,
    /// Reprocess records with timestamp >= this value; 0 disables.
    pub recompute_from: u64,
}

/// End-of-run counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub total: u64,
    pub decoded: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Folds a typed-event stream into per-pool window metrics.
///
/// One open window per pool at a time: a record for a different window
/// flushes the pool's open accumulator before a fresh one starts. Events
/// are expected to arrive with a pool's windows contiguous and in order.
pub struct Aggregator<S, C> {
    cfg: Config,
    store: S,
    chain: C,
    state: Box<dyn StateStore>,
    decimals: HashMap<Address, u8>,
    accumulators: HashMap<String, Accumulator>,
    pool_seen: HashMap<String, u64>,
    recompute_from: u64,
}

impl<S: MetricStore, C: ChainSource> Aggregator<S, C> {
    pub fn new(
        mut cfg: Config,
        store: S,
        chain: C,
        state: Box<dyn StateStore>,
    ) -> Result<Self, AppError> {
        if cfg.window_seconds == 0 {
            return Err(AppError::Config("window seconds must be > 0".to_string()));
        }
        if cfg.batch_size == 0 {
            cfg.batch_size = 1000;
        }

        let recompute_from = cfg.recompute_from;
        Ok(Self {
            cfg,
            store,
            chain,
            state,
            decimals: HashMap::new(),
            accumulators: HashMap::new(),
            pool_seen: HashMap::new(),
            recompute_from,
        })
    }

    /// Runs aggregation over a typed-events JSONL file.
    ///
    /// Store and chain failures during a flush abort the run; per-record
    /// parse and aggregation failures are logged and counted. On shutdown
    /// the open windows are dropped, leaving the last completed batch
    /// flush as the durable state.
    pub async fn run(
        &mut self,
        input_path: &str,
        shutdown: Arc<AtomicBool>,
    ) -> Result<RunStats, AppError> {
        let start_ts = self.load_start_timestamp().await?;

        let input = File::open(input_path).await?;
        let mut lines = BufReader::new(input).lines();

        let mut batch: Vec<NewPoolWindowMetrics> = Vec::new();
        let mut pools: Vec<NewPool> = Vec::new();
        let mut max_ts = start_ts;
        let mut stats = RunStats::default();

        while let Some(line) = lines.next_line().await? {
            if shutdown.load(Ordering::Relaxed) {
                info!("shutdown requested, dropping open windows");
                info!(
                    "aggregate cancelled: total={} decoded={} skipped={} failed={}",
                    stats.total, stats.decoded, stats.skipped, stats.failed
                );
                return Ok(stats);
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            stats.total += 1;

            let record: TypedEventRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(err) => {
                    stats.failed += 1;
                    warn!("parse typed event: {err}");
                    continue;
                }
            };

            if record.timestamp <= start_ts {
                stats.skipped += 1;
                continue;
            }

            let window_start = window_start(record.timestamp, self.cfg.window_seconds);
            let window_end = window_start + self.cfg.window_seconds;
            let key = pool_key(&record.address);

            match self.accumulators.remove(&key) {
                None => {
                    self.accumulators
                        .insert(key.clone(), Accumulator::new(&record, window_start, window_end));
                }
                Some(open) if open.window_start != window_start => {
                    let (metrics, pool) = self.flush_accumulator(&open).await?;
                    if let Some(metrics) = metrics {
                        batch.push(metrics);
                        stats.decoded += 1;
                    }
                    if let Some(pool) = pool {
                        pools.push(pool);
                    }
                    self.accumulators
                        .insert(key.clone(), Accumulator::new(&record, window_start, window_end));
                }
                Some(open) => {
                    self.accumulators.insert(key.clone(), open);
                }
            }

            if let Some(acc) = self.accumulators.get_mut(&key) {
                if let Err(err) = acc.add(&record) {
                    stats.failed += 1;
                    warn!("aggregate event for pool {}: {err}", record.address);
                    continue;
                }
            }

            if record.timestamp > max_ts {
                max_ts = record.timestamp;
            }

            if batch.len() >= self.cfg.batch_size {
                self.flush_batches(&batch, &pools).await?;
                batch.clear();
                pools.clear();
                self.save_state().await?;
            }
        }

        // Drain every remaining open window.
        let open: Vec<Accumulator> = self
            .accumulators
            .drain()
            .map(|(_, accumulator)| accumulator)
            .collect();
        for accumulator in &open {
            let (metrics, pool) = self.flush_accumulator(accumulator).await?;
            if let Some(metrics) = metrics {
                batch.push(metrics);
                stats.decoded += 1;
            }
            if let Some(pool) = pool {
                pools.push(pool);
            }
        }

        if !batch.is_empty() || !pools.is_empty() {
            self.flush_batches(&batch, &pools).await?;
        }

        self.recompute_from = max_ts;
        self.save_state().await?;

        info!(
            "aggregate complete: total={} decoded={} skipped={} failed={}",
            stats.total, stats.decoded, stats.skipped, stats.failed
        );
        Ok(stats)
    }

    /// The starting cut-off: records at or below it are skipped.
    async fn load_start_timestamp(&self) -> Result<u64, AppError> {
        if self.cfg.recompute_from > 0 {
            return Ok(self.cfg.recompute_from - 1);
        }
        Ok(self.state.load().await?.unwrap_or(0))
    }

    /// Persists the safe watermark: with open windows, the earliest open
    /// window start minus one, so a replay from watermark + 1 rebuilds
    /// every open window exactly.
    async fn save_state(&self) -> Result<(), AppError> {
        if self.accumulators.is_empty() {
            return self.state.save(self.recompute_from).await;
        }

        let mut safe_ts = self
            .accumulators
            .values()
            .map(|accumulator| accumulator.window_start)
            .min()
            .unwrap_or(0);
        if safe_ts > 0 {
            safe_ts -= 1;
        }
        if safe_ts == 0 {
            safe_ts = self.recompute_from;
        }
        self.state.save(safe_ts).await
    }

    async fn flush_batches(
        &self,
        batch: &[NewPoolWindowMetrics],
        pools: &[NewPool],
    ) -> Result<(), AppError> {
        if !pools.is_empty() {
            self.store.upsert_pools(pools).await?;
        }
        if !batch.is_empty() {
            self.store.upsert_window_metrics(batch).await?;
        }
        Ok(())
    }

    /// Builds the metrics row (and, for a pool's first window, the pool
    /// record) for one closed window. Returns nothing when the pool meta
    /// never resolved.
    async fn flush_accumulator(
        &mut self,
        acc: &Accumulator,
    ) -> Result<(Option<NewPoolWindowMetrics>, Option<NewPool>), AppError> {
        if acc.pool_meta.token0.is_empty() || acc.pool_meta.token1.is_empty() {
            warn!("missing pool meta for {}", acc.pool_address);
            return Ok((None, None));
        }

        let pool_record = self.register_pool(acc);

        let decimals0 = self.token_decimals(&acc.pool_meta.token0).await;
        let decimals1 = self.token_decimals(&acc.pool_meta.token1).await;

        let mut tvl0_raw: Option<BigInt> = None;
        let mut tvl1_raw: Option<BigInt> = None;
        let mut tvl_method = TVL_METHOD_NONE;

        if acc.last_block > 0 {
            match (
                Address::from_str(&acc.pool_meta.token0),
                Address::from_str(&acc.pool_meta.token1),
                Address::from_str(&acc.pool_address),
            ) {
                (Ok(token0), Ok(token1), Ok(pool)) => {
                    match tvl::fetch_tvl(&self.chain, token0, token1, pool, acc.last_block).await {
                        Ok((balance0, balance1, method)) => {
                            tvl0_raw = Some(big_int_from_u256(balance0));
                            tvl1_raw = Some(big_int_from_u256(balance1));
                            tvl_method = method;
                        }
                        Err(err) => {
                            warn!("tvl fetch failed for {}: {err}", acc.pool_address);
                        }
                    }
                }
                _ => warn!("invalid addresses for tvl fetch on {}", acc.pool_address),
            }
        }

        let rate0 = compute_rate(&acc.fee0, tvl0_raw.as_ref());
        let rate1 = compute_rate(&acc.fee1, tvl1_raw.as_ref());
        let apr = compute_apr(rate0.as_ref(), rate1.as_ref(), self.cfg.window_seconds);

        let metrics = NewPoolWindowMetrics {
            chain_id: acc.chain_id,
            pool_address: acc.pool_address.clone(),
            window_size_seconds: self.cfg.window_seconds,
            window_start_ts: utc_from_ts(acc.window_start),
            window_end_ts: utc_from_ts(acc.window_end),
            swap_count: acc.swap_count,
            volume0: format_token_amount(&acc.volume0, decimals0),
            volume1: format_token_amount(&acc.volume1, decimals1),
            fee0: format_token_amount(&acc.fee0, decimals0),
            fee1: format_token_amount(&acc.fee1, decimals1),
            fee_usd: None,
            fee_rate0: rate0.as_ref().map(|rate| format_rate(rate)),
            fee_rate1: rate1.as_ref().map(|rate| format_rate(rate)),
            tvl0: tvl0_raw
                .as_ref()
                .map(|value| format_token_amount(value, decimals0)),
            tvl1: tvl1_raw
                .as_ref()
                .map(|value| format_token_amount(value, decimals1)),
            tvl_usd: None,
            apr: apr.as_ref().map(|value| format_rate(value)),
            fee_method: FEE_METHOD_APPROX.to_string(),
            tvl_method: tvl_method.to_string(),
        };

        Ok((Some(metrics), pool_record))
    }

    /// Emits a pool record the first time the pool is seen in this run,
    /// or again when a strictly lower first-seen block shows up.
    fn register_pool(&mut self, acc: &Accumulator) -> Option<NewPool> {
        let key = pool_key(&acc.pool_address);
        if let Some(first_seen) = self.pool_seen.get(&key) {
            if *first_seen <= acc.first_block {
                return None;
            }
        }
        self.pool_seen.insert(key, acc.first_block);

        Some(NewPool {
            chain_id: acc.chain_id,
            pool_address: acc.pool_address.clone(),
            token0: acc.pool_meta.token0.clone(),
            token1: acc.pool_meta.token1.clone(),
            fee: acc.pool_meta.fee,
            tick_spacing: acc.pool_meta.tick_spacing,
            first_seen_block: acc.first_block,
        })
    }

    /// Token decimals via the run-local cache. Fetch failures warn and
    /// fall back to 0, leaving amounts unscaled.
    async fn token_decimals(&mut self, token: &str) -> u8 {
        let address = match Address::from_str(token) {
            Ok(address) => address,
            Err(_) => {
                warn!("invalid token address: {token}");
                return 0;
            }
        };

        if let Some(decimals) = self.decimals.get(&address) {
            return *decimals;
        }

        match self.chain.token_decimals(address).await {
            Ok(decimals) => {
                self.decimals.insert(address, decimals);
                decimals
            }
            Err(err) => {
                warn!("token decimals fetch failed for {token}: {err}");
                0
            }
        }
    }
}

/// Start of the window containing `ts`, aligned to a multiple of the
/// window size.
pub fn window_start(ts: u64, window_seconds: u64) -> u64 {
    ts - (ts % window_seconds)
}

fn pool_key(address: &str) -> String {
    address.to_lowercase()
}

fn big_int_from_u256(value: U256) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>())
}

fn utc_from_ts(ts: u64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(ts as i64, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
