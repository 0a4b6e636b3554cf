//! V3 pool event decoder (stage 2).
//!
//! Reads raw-log JSONL from the crawler, decodes Swap/Mint/Burn/Collect
//! events with pool metadata attached, and writes a typed-event stream
//! plus a decode-error stream for the aggregator stage.

use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use indexer_chain::metadata::{PoolMetaCache, TokenMetaCache};
use indexer_chain::Client;

use crate::error::AppError;
use crate::events::{DecodeContext, V3PoolDecoder};
use crate::service::ServiceConfig;

mod error;
mod events;
mod service;

mod defaults {
    pub const OUT: &str = "./data/typed_events.jsonl";
    pub const ERRORS: &str = "./data/decode_errors.jsonl";
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decoder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rpc_url = env::var("RPC_URL").map_err(|_| AppError::MissingEnvVar("RPC_URL".into()))?;
    let input_path = env::var("IN").map_err(|_| AppError::MissingEnvVar("IN".into()))?;
    let out_path = env::var("OUT").unwrap_or_else(|_| defaults::OUT.to_string());
    let errors_path = env::var("ERRORS").unwrap_or_else(|_| defaults::ERRORS.to_string());
    let include_live_meta = env::var("INCLUDE_LIVE_META")
        .map(|value| value == "true" || value == "1")
        .unwrap_or(false);

    let topic0_map = parse_topic0_map(&env::var("TOPIC0_MAP").unwrap_or_default())?;

    let chain = Arc::new(Client::connect(&rpc_url)?);
    let decoder = V3PoolDecoder::new(&topic0_map)?;
    let ctx = DecodeContext {
        chain: Some(chain),
        pool_meta: PoolMetaCache::new(),
        token_meta: TokenMetaCache::new(),
        include_live_meta,
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
        "decode start: in={input_path} out={out_path} errors={errors_path} \
         extra_topics={} include_live_meta={include_live_meta}",
        topic0_map.len()
    );

    service::run(
        ServiceConfig {
            input_path,
            out_path,
            errors_path,
        },
        decoder,
        ctx,
        shutdown,
    )
    .await?;

    Ok(())
}

/// Parses `TOPIC0_MAP`: comma-separated `0xtopic=EventName` pairs.
fn parse_topic0_map(raw: &str) -> Result<HashMap<String, String>, AppError> {
    let mut map = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let (topic, name) = pair
            .split_once('=')
            .ok_or_else(|| AppError::Config(format!("invalid topic0 map entry: {pair}")))?;
        map.insert(topic.trim().to_string(), name.trim().to_string());
    }
    Ok(map)
}
