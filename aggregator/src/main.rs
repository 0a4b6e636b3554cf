//! Window aggregator (stage 3).
//!
//! Reads typed-event JSONL from the decoder, folds swaps into per-pool
//! window metrics (volume, approximate fees, TVL, APR), and upserts the
//! results into Postgres. Progress is checkpointed as a timestamp
//! watermark so interrupted runs replay only the still-open windows.

use std::env;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::DateTime;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aggregator::error::AppError;
use aggregator::service::{Aggregator, Config};
use aggregator::state::{DbStateStore, FileStateStore, StateStore};

use indexer_chain::Client;

mod defaults {
    pub const WINDOW_SECONDS: &str = "300";
    pub const BATCH_SIZE: &str = "1000";
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aggregator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rpc_url = env::var("RPC_URL").map_err(|_| AppError::MissingEnvVar("RPC_URL".into()))?;
    let input_path = env::var("IN").map_err(|_| AppError::MissingEnvVar("IN".into()))?;

    let window_seconds = env::var("WINDOW_SECONDS")
        .unwrap_or_else(|_| defaults::WINDOW_SECONDS.to_string())
        .parse::<u64>()
        .map_err(|_| AppError::Config("invalid WINDOW_SECONDS".to_string()))?;
    if window_seconds == 0 {
        return Err(AppError::Config("window must be at least 1s".to_string()).into());
    }

    let batch_size = env::var("BATCH_SIZE")
        .unwrap_or_else(|_| defaults::BATCH_SIZE.to_string())
        .parse::<usize>()
        .unwrap_or(1000);

    let recompute_from = parse_timestamp(&env::var("RECOMPUTE_FROM").unwrap_or_default())?;

    let db = indexer_db::initialize_database().await?;
    let chain = Client::connect(&rpc_url)?;

    let state: Box<dyn StateStore> = match env::var("STATE_FILE") {
        Ok(path) if !path.is_empty() => Box::new(FileStateStore::new(path)),
        _ => Box::new(DbStateStore::new(
            db.clone(),
            format!("aggregator:{window_seconds}"),
        )),
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
                shutdown.store(true, Ordering::Relaxed);
            }
        });
    }

    info!(
        "aggregate start: in={input_path} window_seconds={window_seconds} \
         batch_size={batch_size} recompute_from={recompute_from}"
    );

    let mut aggregator = Aggregator::new(
        Config {
            window_seconds,
            batch_size,
            recompute_from,
        },
        db,
        chain,
        state,
    )?;

    aggregator.run(&input_path, shutdown).await?;
    Ok(())
}

/// `RECOMPUTE_FROM` accepts unix seconds or an RFC3339 timestamp.
fn parse_timestamp(input: &str) -> Result<u64, AppError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(0);
    }

    if input.chars().all(|c| c.is_ascii_digit()) {
        return input
            .parse::<u64>()
            .map_err(|_| AppError::Config(format!("invalid timestamp: {input}")));
    }

    let parsed = DateTime::parse_from_rfc3339(input)
        .map_err(|_| AppError::Config(format!("invalid timestamp: {input}")))?;
    Ok(parsed.timestamp().max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_seconds_and_rfc3339() {
        assert_eq!(parse_timestamp("").unwrap(), 0);
        assert_eq!(parse_timestamp("1700000210").unwrap(), 1_700_000_210);
        assert_eq!(
            parse_timestamp("2023-11-14T22:13:20Z").unwrap(),
            1_700_000_000
        );
        assert!(parse_timestamp("not-a-time").is_err());
        assert!(parse_timestamp("17000x").is_err());
    }
}
