//! End-to-end aggregation runs against in-memory stores and a fake chain.

use std::collections::HashMap;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use aggregator::error::AppError;
use aggregator::service::{Aggregator, Config};
use aggregator::state::StateStore;
use aggregator::store::MetricStore;
use aggregator::tvl::ChainSource;
use indexer_db::entity::{NewPool, NewPoolWindowMetrics};

const POOL1: &str = "0x1111111111111111111111111111111111111111";
const POOL2: &str = "0x2222222222222222222222222222222222222222";
const TOKEN0: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const TOKEN1: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

type MetricsKey = (u64, String, u64, DateTime<Utc>);

#[derive(Default, Clone)]
struct MemoryStore {
    pools: Arc<Mutex<HashMap<(u64, String), NewPool>>>,
    metrics: Arc<Mutex<HashMap<MetricsKey, NewPoolWindowMetrics>>>,
    fail_metrics_upserts_after: Arc<Mutex<Option<u32>>>,
    metrics_upsert_calls: Arc<Mutex<u32>>,
}

impl MemoryStore {
    fn fail_after(&self, calls: u32) {
        *self.fail_metrics_upserts_after.lock().unwrap() = Some(calls);
    }

    fn heal(&self) {
        *self.fail_metrics_upserts_after.lock().unwrap() = None;
    }

    fn metrics_snapshot(&self) -> HashMap<MetricsKey, NewPoolWindowMetrics> {
        self.metrics.lock().unwrap().clone()
    }

    fn pools_snapshot(&self) -> HashMap<(u64, String), NewPool> {
        self.pools.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn upsert_pools(&self, pools: &[NewPool]) -> Result<(), AppError> {
        let mut map = self.pools.lock().unwrap();
        for pool in pools {
            let key = (pool.chain_id, pool.pool_address.to_lowercase());
            map.entry(key)
                .and_modify(|existing| {
                    existing.first_seen_block =
                        existing.first_seen_block.min(pool.first_seen_block);
                })
                .or_insert_with(|| pool.clone());
        }
        Ok(())
    }

    async fn upsert_window_metrics(
        &self,
        metrics: &[NewPoolWindowMetrics],
    ) -> Result<(), AppError> {
        {
            let mut calls = self.metrics_upsert_calls.lock().unwrap();
            *calls += 1;
            if let Some(limit) = *self.fail_metrics_upserts_after.lock().unwrap() {
                if *calls > limit {
                    return Err(AppError::Config("injected store failure".to_string()));
                }
            }
        }

        let mut map = self.metrics.lock().unwrap();
        for row in metrics {
            let key = (
                row.chain_id,
                row.pool_address.to_lowercase(),
                row.window_size_seconds,
                row.window_start_ts,
            );
            map.insert(key, row.clone());
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
struct MemoryState {
    value: Arc<Mutex<Option<u64>>>,
}

impl MemoryState {
    fn preset(value: u64) -> Self {
        Self {
            value: Arc::new(Mutex::new(Some(value))),
        }
    }

    fn get(&self) -> Option<u64> {
        *self.value.lock().unwrap()
    }
}

#[async_trait]
impl StateStore for MemoryState {
    async fn load(&self) -> Result<Option<u64>, AppError> {
        Ok(self.get())
    }

    async fn save(&self, ts: u64) -> Result<(), AppError> {
        *self.value.lock().unwrap() = Some(ts);
        Ok(())
    }
}

#[derive(Default, Clone)]
struct MockChain {
    decimals: HashMap<Address, u8>,
    balances_at_block: HashMap<Address, U256>,
    balances_latest: HashMap<Address, U256>,
    fail_at_block: Vec<Address>,
}

impl MockChain {
    fn standard() -> Self {
        let token0 = Address::from_str(TOKEN0).unwrap();
        let token1 = Address::from_str(TOKEN1).unwrap();
        Self {
            decimals: HashMap::from([(token0, 18), (token1, 6)]),
            balances_at_block: HashMap::from([
                (token0, U256::from(5_000_000_000_000_000_000u128)),
                (token1, U256::from(4_000_000u64)),
            ]),
            balances_latest: HashMap::from([
                (token0, U256::from(6_000_000_000_000_000_000u128)),
                (token1, U256::from(7_000_000u64)),
            ]),
            fail_at_block: Vec::new(),
        }
    }
}

#[async_trait]
impl ChainSource for MockChain {
    async fn token_decimals(&self, token: Address) -> Result<u8, AppError> {
        self.decimals
            .get(&token)
            .copied()
            .ok_or_else(|| AppError::Config(format!("unknown token {token}")))
    }

    async fn balance_of(
        &self,
        token: Address,
        _owner: Address,
        block_number: Option<u64>,
    ) -> Result<U256, AppError> {
        let source = match block_number {
            Some(_) => {
                if self.fail_at_block.contains(&token) {
                    return Err(AppError::Config("state pruned".to_string()));
                }
                &self.balances_at_block
            }
            None => &self.balances_latest,
        };

        source
            .get(&token)
            .copied()
            .ok_or_else(|| AppError::Config(format!("no balance for {token}")))
    }
}

fn swap_line(pool: &str, ts: u64, block: u64, amount0: &str, amount1: &str) -> String {
    serde_json::json!({
        "chain_id": 56,
        "block_number": block,
        "block_hash": "0xabc",
        "tx_hash": "0xdef",
        "log_index": 1,
        "address": pool,
        "event_name": "Swap",
        "timestamp": ts,
        "decoded": {
            "sender": "0x4444444444444444444444444444444444444444",
            "recipient": "0x5555555555555555555555555555555555555555",
            "amount0": amount0,
            "amount1": amount1,
            "sqrt_price_x96": "0",
            "liquidity": "0",
            "tick": 0
        },
        "pool_meta": {
            "token0": TOKEN0,
            "token1": TOKEN1,
            "fee": 500,
            "tick_spacing": 10
        }
    })
    .to_string()
}

fn write_input(lines: &[String]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn aggregator_with(
    store: MemoryStore,
    chain: MockChain,
    state: MemoryState,
    window_seconds: u64,
    batch_size: usize,
    recompute_from: u64,
) -> Aggregator<MemoryStore, MockChain> {
    Aggregator::new(
        Config {
            window_seconds,
            batch_size,
            recompute_from,
        },
        store,
        chain,
        Box::new(state),
    )
    .unwrap()
}

fn not_cancelled() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

#[tokio::test]
async fn swap_sign_convention_and_formatting() {
    // fee tier 500 (0.05%), decimals 18/6; token0 leaves, token1 enters.
    let input = write_input(&[swap_line(
        POOL1,
        1_700_000_050,
        100,
        "-1000000000000000000",
        "2000000",
    )]);

    let store = MemoryStore::default();
    let state = MemoryState::default();
    let mut aggregator = aggregator_with(
        store.clone(),
        MockChain::standard(),
        state.clone(),
        300,
        1000,
        0,
    );

    let stats = aggregator
        .run(input.path().to_str().unwrap(), not_cancelled())
        .await
        .unwrap();
    assert_eq!(stats.decoded, 1);
    assert_eq!(stats.failed, 0);

    let metrics = store.metrics_snapshot();
    assert_eq!(metrics.len(), 1);
    let row = metrics.values().next().unwrap();

    assert_eq!(row.swap_count, 1);
    assert_eq!(row.volume0, "1.000000000000000000");
    assert_eq!(row.volume1, "2.000000");
    assert_eq!(row.fee0, "0.000000000000000000");
    assert_eq!(row.fee1, "0.001000");
    assert_eq!(row.fee_method, "approx_from_feeTier");

    // TVL resolved at the window's last block.
    assert_eq!(row.tvl_method, "balance_of_block");
    assert_eq!(row.tvl0.as_deref(), Some("5.000000000000000000"));
    assert_eq!(row.tvl1.as_deref(), Some("4.000000"));

    // Only the input side carries a rate: 0.001 / 4.0 at 18 digits.
    assert!(row.fee_rate0.is_none());
    assert_eq!(row.fee_rate1.as_deref(), Some("0.000250000000000000"));

    // APR annualises the single rate over the 300s window.
    assert_eq!(row.apr.as_deref(), Some("26.280000000000000000"));

    assert!(row.fee_usd.is_none());
    assert!(row.tvl_usd.is_none());
}

#[tokio::test]
async fn window_splitting_emits_one_row_per_window() {
    let input = write_input(&[
        swap_line(POOL1, 1_700_000_050, 100, "-1000", "2000"),
        swap_line(POOL1, 1_700_000_350, 101, "-1000", "2000"),
    ]);

    let store = MemoryStore::default();
    let mut aggregator = aggregator_with(
        store.clone(),
        MockChain::standard(),
        MemoryState::default(),
        300,
        1000,
        0,
    );

    let stats = aggregator
        .run(input.path().to_str().unwrap(), not_cancelled())
        .await
        .unwrap();
    assert_eq!(stats.decoded, 2);

    let metrics = store.metrics_snapshot();
    assert_eq!(metrics.len(), 2);

    let mut starts: Vec<i64> = metrics
        .values()
        .map(|row| row.window_start_ts.timestamp())
        .collect();
    starts.sort_unstable();
    assert_eq!(starts, vec![1_699_999_800, 1_700_000_100]);

    for row in metrics.values() {
        assert_eq!(
            row.window_end_ts.timestamp() - row.window_start_ts.timestamp(),
            300
        );
    }
}

#[tokio::test]
async fn checkpoint_skips_old_records() {
    let input = write_input(&[
        swap_line(POOL1, 1_700_000_180, 100, "-1000", "2000"),
        swap_line(POOL1, 1_700_000_210, 101, "-1000", "2000"),
    ]);

    let store = MemoryStore::default();
    let state = MemoryState::preset(1_700_000_200);
    let mut aggregator = aggregator_with(
        store.clone(),
        MockChain::standard(),
        state.clone(),
        300,
        1000,
        0,
    );

    let stats = aggregator
        .run(input.path().to_str().unwrap(), not_cancelled())
        .await
        .unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.decoded, 1);

    // Final state is the maximum processed timestamp.
    assert_eq!(state.get(), Some(1_700_000_210));
}

#[tokio::test]
async fn tvl_falls_back_to_latest_block() {
    let mut chain = MockChain::standard();
    chain.fail_at_block = vec![Address::from_str(TOKEN0).unwrap()];

    let input = write_input(&[swap_line(
        POOL1,
        1_700_000_050,
        100,
        "-1000000000000000000",
        "2000000",
    )]);

    let store = MemoryStore::default();
    let mut aggregator =
        aggregator_with(store.clone(), chain, MemoryState::default(), 300, 1000, 0);

    aggregator
        .run(input.path().to_str().unwrap(), not_cancelled())
        .await
        .unwrap();

    let metrics = store.metrics_snapshot();
    let row = metrics.values().next().unwrap();

    assert_eq!(row.tvl_method, "balance_of_latest");
    assert_eq!(row.tvl0.as_deref(), Some("6.000000000000000000"));
    assert_eq!(row.tvl1.as_deref(), Some("7.000000"));
}

#[tokio::test]
async fn malformed_lines_are_counted_not_fatal() {
    let input = write_input(&[
        "{not json".to_string(),
        swap_line(POOL1, 1_700_000_050, 100, "-1000", "2000"),
        String::new(),
    ]);

    let store = MemoryStore::default();
    let mut aggregator = aggregator_with(
        store.clone(),
        MockChain::standard(),
        MemoryState::default(),
        300,
        1000,
        0,
    );

    let stats = aggregator
        .run(input.path().to_str().unwrap(), not_cancelled())
        .await
        .unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.decoded, 1);
}

fn resumability_input() -> Vec<String> {
    vec![
        swap_line(POOL1, 1_699_999_810, 90, "-1000000000000000000", "2000000"),
        swap_line(POOL1, 1_699_999_900, 91, "3000000000000000000", "-5000000"),
        swap_line(POOL2, 1_699_999_820, 92, "-700000000000000000", "900000"),
        swap_line(POOL1, 1_700_000_150, 93, "-1000000000000000000", "2000000"),
        swap_line(POOL2, 1_700_000_200, 94, "-1000000000000000000", "2000000"),
        swap_line(POOL1, 1_700_000_500, 95, "-2000000000000000000", "4000000"),
        swap_line(POOL2, 1_700_000_600, 96, "1500000000000000000", "-3000000"),
    ]
}

#[tokio::test]
async fn crash_and_resume_reproduces_a_clean_run() {
    let lines = resumability_input();
    let input = write_input(&lines);
    let path = input.path().to_str().unwrap().to_string();

    // Reference: one uninterrupted run.
    let reference_store = MemoryStore::default();
    let mut reference = aggregator_with(
        reference_store.clone(),
        MockChain::standard(),
        MemoryState::default(),
        300,
        1,
        0,
    );
    reference.run(&path, not_cancelled()).await.unwrap();

    // Crashing run: the third metrics upsert fails, aborting the run
    // after two windows were durably flushed and checkpointed.
    let store = MemoryStore::default();
    let state = MemoryState::default();
    store.fail_after(2);

    let mut crashing = aggregator_with(
        store.clone(),
        MockChain::standard(),
        state.clone(),
        300,
        1,
        0,
    );
    assert!(crashing.run(&path, not_cancelled()).await.is_err());

    let saved = state.get().expect("a checkpoint was saved before the crash");
    assert!(saved < 1_700_000_600);

    // Resume over the same input from the safe watermark.
    store.heal();
    let mut resumed = aggregator_with(
        store.clone(),
        MockChain::standard(),
        state.clone(),
        300,
        1,
        saved + 1,
    );
    resumed.run(&path, not_cancelled()).await.unwrap();

    assert_eq!(store.metrics_snapshot(), reference_store.metrics_snapshot());
    assert_eq!(store.pools_snapshot(), reference_store.pools_snapshot());
    assert_eq!(state.get(), Some(1_700_000_600));
}

#[tokio::test]
async fn restart_from_any_saved_state_is_safe() {
    // Replaying a fully processed input from checkpoint + 1 must not
    // change the persisted rows (duplicates are absorbed by the keys).
    let lines = resumability_input();
    let input = write_input(&lines);
    let path = input.path().to_str().unwrap().to_string();

    let store = MemoryStore::default();
    let state = MemoryState::default();

    let mut first = aggregator_with(
        store.clone(),
        MockChain::standard(),
        state.clone(),
        300,
        1,
        0,
    );
    first.run(&path, not_cancelled()).await.unwrap();
    let after_first = store.metrics_snapshot();

    let saved = state.get().unwrap();
    let mut second = aggregator_with(
        store.clone(),
        MockChain::standard(),
        state.clone(),
        300,
        1,
        saved + 1,
    );
    let stats = second.run(&path, not_cancelled()).await.unwrap();

    assert_eq!(stats.decoded, 0);
    assert_eq!(stats.skipped as usize, lines.len());
    assert_eq!(store.metrics_snapshot(), after_first);
}
