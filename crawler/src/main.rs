//! BSC raw-log crawler (stage 1).
//!
//! Streams logs for the configured pool addresses over an inclusive block
//! range and appends them to a JSONL file for the decoder stage. Progress
//! is checkpointed by block so an interrupted run resumes where it
//! stopped.

use std::env;
use std::error::Error;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use indexer_chain::Client;

use crate::checkpoint::CheckpointStore;
use crate::error::AppError;
use crate::service::{RunConfig, Runner};

mod checkpoint;
mod error;
mod range;
mod service;

mod defaults {
    pub const BATCH_SIZE: &str = "2000";
    pub const OUT: &str = "./data/logs.jsonl";
    pub const CHECKPOINT: &str = "./data/checkpoint.json";
    pub const MAX_RETRIES: &str = "5";
    pub const RETRY_BACKOFF_MS: &str = "500";
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crawler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rpc_url = env::var("RPC_URL").map_err(|_| AppError::MissingEnvVar("RPC_URL".into()))?;
    let raw_addresses =
        env::var("ADDRESSES").map_err(|_| AppError::MissingEnvVar("ADDRESSES".into()))?;

    let addresses = parse_addresses(&raw_addresses)?;
    let topic0 = parse_topics(&env::var("TOPIC0").unwrap_or_default())?;

    let from_block = env_u64("FROM_BLOCK", 0);
    let to_block = env_u64("TO_BLOCK", 0);
    let batch_size = env::var("BATCH_SIZE")
        .unwrap_or_else(|_| defaults::BATCH_SIZE.to_string())
        .parse::<u64>()
        .unwrap_or(2000);

    let out_path = env::var("OUT").unwrap_or_else(|_| defaults::OUT.to_string());
    let checkpoint_path =
        env::var("CHECKPOINT").unwrap_or_else(|_| defaults::CHECKPOINT.to_string());
    let checkpoint_enabled = env::var("CHECKPOINT_ENABLED")
        .map(|value| value != "false" && value != "0")
        .unwrap_or(true);

    let max_retries = env::var("MAX_RETRIES")
        .unwrap_or_else(|_| defaults::MAX_RETRIES.to_string())
        .parse::<u32>()
        .unwrap_or(5);
    let retry_backoff_ms = env::var("RETRY_BACKOFF_MS")
        .unwrap_or_else(|_| defaults::RETRY_BACKOFF_MS.to_string())
        .parse::<u64>()
        .unwrap_or(500);

    let chain = Client::connect(&rpc_url)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, finishing current batch");
                shutdown.store(true, Ordering::Relaxed);
            }
        });
    }

    info!(
        "crawler start: blocks {from_block}..={to_block}, {} addresses, {} topic0 filters, out {out_path}",
        addresses.len(),
        topic0.len()
    );

    let mut runner = Runner::new(
        RunConfig {
            from_block,
            to_block,
            addresses,
            topic0,
            batch_size,
            out_path,
            max_retries,
            retry_backoff: Duration::from_millis(retry_backoff_ms),
        },
        chain,
        CheckpointStore::new(checkpoint_path, checkpoint_enabled),
        shutdown,
    );

    runner.run().await?;
    Ok(())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_addresses(raw: &str) -> Result<Vec<Address>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Address::from_str(part).map_err(|_| AppError::InvalidAddress(part.to_string())))
        .collect()
}

fn parse_topics(raw: &str) -> Result<Vec<B256>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| B256::from_str(part).map_err(|_| AppError::InvalidTopic(part.to_string())))
        .collect()
}
