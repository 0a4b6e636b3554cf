use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use chrono::{SecondsFormat, Utc};
use tokio::time::sleep;
use tracing::{info, warn};

use indexer_chain::Client;
use indexer_model::{JsonlWriter, LogRecord};

use crate::checkpoint::CheckpointStore;
use crate::error::AppError;
use crate::range::split_range;

/// Runtime settings for one crawl.
pub struct RunConfig {
    pub from_block: u64,
    /// End block (inclusive); 0 means latest.
    pub to_block: u64,
    pub addresses: Vec<Address>,
    pub topic0: Vec<B256>,
    /// Blocks per `eth_getLogs` call.
    pub batch_size: u64,
    pub out_path: String,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

/// Streams logs from the chain and appends them to the output JSONL.
pub struct Runner {
    cfg: RunConfig,
    chain: Client,
    checkpoint: CheckpointStore,
    seen: HashSet<(u64, String, u64)>,
    shutdown: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(
        cfg: RunConfig,
        chain: Client,
        checkpoint: CheckpointStore,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            cfg,
            chain,
            checkpoint,
            seen: HashSet::new(),
            shutdown,
        }
    }

    pub async fn run(&mut self) -> Result<(), AppError> {
        if self.cfg.addresses.is_empty() {
            return Err(AppError::Config(
                "at least one address is required".to_string(),
            ));
        }

        let chain_id = self.chain.chain_id().await?;

        let mut from = self.cfg.from_block;
        let to = if self.cfg.to_block == 0 {
            self.chain.latest_block_number().await?
        } else {
            self.cfg.to_block
        };

        if let Some(checkpoint) = self.checkpoint.load().await? {
            if checkpoint.last_processed_block >= from {
                from = checkpoint.last_processed_block + 1;
                info!(
                    "resuming from checkpoint: last processed block {}",
                    checkpoint.last_processed_block
                );
            }
        }

        if from > to {
            info!("nothing to sync: from {from} > to {to}");
            return Ok(());
        }

        let ranges = split_range(from, to, self.cfg.batch_size)?;
        let mut writer = JsonlWriter::append(&self.cfg.out_path).await?;

        for range in ranges {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("shutdown requested, stopping before block {}", range.from);
                break;
            }

            let logs = self.filter_logs_with_retry(range.from, range.to).await?;
            let ingested_at = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);

            let mut records = Vec::with_capacity(logs.len());
            for log in logs {
                if self.is_duplicate(&log) {
                    continue;
                }

                let block_number = log.block_number.unwrap_or_default();
                let timestamp = self.block_timestamp_with_retry(block_number).await?;
                records.push(build_log_record(chain_id, &log, timestamp, &ingested_at));
            }

            for record in &records {
                writer.write(record).await?;
            }
            writer.flush().await?;

            self.checkpoint.save(range.to).await?;
            info!(
                "batch complete: {} logs for blocks {}..={}",
                records.len(),
                range.from,
                range.to
            );
        }

        Ok(())
    }

    async fn filter_logs_with_retry(&self, from: u64, to: u64) -> Result<Vec<Log>, AppError> {
        let mut delay = self.cfg.retry_backoff;
        let mut attempt = 0;
        loop {
            match self
                .chain
                .filter_logs(from, to, self.cfg.addresses.clone(), self.cfg.topic0.clone())
                .await
            {
                Ok(logs) => return Ok(logs),
                Err(err) => {
                    if attempt >= self.cfg.max_retries {
                        return Err(err.into());
                    }
                    warn!(
                        "get_logs failed for blocks {from}..={to} (attempt {}): {err}",
                        attempt + 1
                    );
                    sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }

    async fn block_timestamp_with_retry(&self, block_number: u64) -> Result<u64, AppError> {
        let mut delay = self.cfg.retry_backoff;
        let mut attempt = 0;
        loop {
            match self.chain.block_timestamp(block_number).await {
                Ok(ts) => return Ok(ts),
                Err(err) => {
                    if attempt >= self.cfg.max_retries {
                        return Err(err.into());
                    }
                    warn!(
                        "timestamp fetch failed for block {block_number} (attempt {}): {err}",
                        attempt + 1
                    );
                    sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }

    fn is_duplicate(&mut self, log: &Log) -> bool {
        let key = (
            log.block_number.unwrap_or_default(),
            log.transaction_hash
                .map(|hash| hash.to_string())
                .unwrap_or_default(),
            log.log_index.unwrap_or_default(),
        );
        !self.seen.insert(key)
    }
}

fn build_log_record(chain_id: u64, log: &Log, timestamp: u64, ingested_at: &str) -> LogRecord {
    let topics = log
        .inner
        .data
        .topics()
        .iter()
        .map(|topic| topic.to_string())
        .collect();

    LogRecord {
        chain_id,
        block_number: log.block_number.unwrap_or_default(),
        block_hash: log.block_hash.map(|hash| hash.to_string()).unwrap_or_default(),
        tx_hash: log
            .transaction_hash
            .map(|hash| hash.to_string())
            .unwrap_or_default(),
        tx_index: log.transaction_index.unwrap_or_default(),
        log_index: log.log_index.unwrap_or_default(),
        address: log.address().to_string(),
        topics,
        data: log.inner.data.data.to_string(),
        removed: log.removed,
        timestamp,
        ingested_at: ingested_at.to_string(),
    }
}
