//! V3 pool event decoding.
//!
//! One module per event. Dispatch is by topic0: the four canonical
//! selectors are always known, and operators can map additional selectors
//! onto them for fee-fork pools whose events carry a compatible payload
//! under a different signature hash.

pub mod burn;
pub mod collect;
pub mod mint;
pub mod swap;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, Log, LogData, B256};
use alloy::sol_types::SolEvent;

use indexer_chain::abi::V3Pool;
use indexer_chain::metadata::{self, PoolMetaCache, TokenMetaCache};
use indexer_chain::Client;
use indexer_model::{EventPayload, LogRecord, PoolMeta, RawLogRef, TypedEvent};

use crate::error::AppError;

/// The four decodable pool events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Swap,
    Mint,
    Burn,
    Collect,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Swap => "Swap",
            Self::Mint => "Mint",
            Self::Burn => "Burn",
            Self::Collect => "Collect",
        }
    }

    /// Case-insensitive parse of an operator-supplied event name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "swap" => Some(Self::Swap),
            "mint" => Some(Self::Mint),
            "burn" => Some(Self::Burn),
            "collect" => Some(Self::Collect),
            _ => None,
        }
    }
}

/// Shared dependencies for decoding.
///
/// The caches are the only mutable state and may be shared across tasks;
/// `chain` can be absent when every pool is already cached.
pub struct DecodeContext {
    pub chain: Option<Arc<Client>>,
    pub pool_meta: PoolMetaCache,
    pub token_meta: TokenMetaCache,
    pub include_live_meta: bool,
}

pub struct V3PoolDecoder {
    topic_to_kind: HashMap<B256, EventKind>,
}

impl V3PoolDecoder {
    /// Builds the decoder from the canonical selectors plus an optional
    /// operator map of `topic0 -> event name`. Unknown event names fail
    /// construction.
    pub fn new(extra_topics: &HashMap<String, String>) -> Result<Self, AppError> {
        let mut topic_to_kind = HashMap::from([
            (V3Pool::Swap::SIGNATURE_HASH, EventKind::Swap),
            (V3Pool::Mint::SIGNATURE_HASH, EventKind::Mint),
            (V3Pool::Burn::SIGNATURE_HASH, EventKind::Burn),
            (V3Pool::Collect::SIGNATURE_HASH, EventKind::Collect),
        ]);

        for (topic0, name) in extra_topics {
            let kind = EventKind::parse(name).ok_or_else(|| {
                AppError::Config(format!("unsupported event name in topic0 map: {name}"))
            })?;
            if topic0.is_empty() {
                continue;
            }
            let topic = B256::from_str(topic0)
                .map_err(|_| AppError::Config(format!("invalid topic0 in map: {topic0}")))?;
            topic_to_kind.insert(topic, kind);
        }

        Ok(Self { topic_to_kind })
    }

    /// Whether `topic0` maps to a decodable event.
    pub fn can_decode(&self, topic0: &str) -> bool {
        B256::from_str(topic0)
            .map(|topic| self.topic_to_kind.contains_key(&topic))
            .unwrap_or(false)
    }

    /// Decodes a raw log into a typed event with pool metadata attached.
    pub async fn decode(
        &self,
        record: &LogRecord,
        ctx: &DecodeContext,
    ) -> Result<TypedEvent, AppError> {
        let topic0_raw = record.topics.first().ok_or(AppError::MissingTopic0)?;
        let topic0 = B256::from_str(topic0_raw)
            .map_err(|_| AppError::InvalidTopic(topic0_raw.clone()))?;
        let kind = *self
            .topic_to_kind
            .get(&topic0)
            .ok_or_else(|| AppError::UnsupportedTopic(topic0_raw.clone()))?;

        let pool = Address::from_str(&record.address)
            .map_err(|_| AppError::InvalidAddress(record.address.clone()))?;

        let pool_meta = self.resolve_pool_meta(pool, record.block_number, ctx).await?;

        let log = build_primitive_log(pool, record)?;
        let decoded = match kind {
            EventKind::Swap => EventPayload::Swap(swap::decode(&log)?),
            EventKind::Mint => EventPayload::Mint(mint::decode(&log)?),
            EventKind::Burn => EventPayload::Burn(burn::decode(&log)?),
            EventKind::Collect => EventPayload::Collect(collect::decode(&log)?),
        };

        Ok(TypedEvent {
            chain_id: record.chain_id,
            block_number: record.block_number,
            block_hash: record.block_hash.clone(),
            tx_hash: record.tx_hash.clone(),
            log_index: record.log_index,
            address: record.address.clone(),
            event_name: kind.name().to_string(),
            timestamp: record.timestamp,
            decoded,
            pool_meta,
            raw: Some(RawLogRef {
                topic0: topic0_raw.clone(),
                data: record.data.clone(),
            }),
        })
    }

    /// Cache lookup, falling back to a chain fetch on miss. Live
    /// slot0/liquidity are merged on top without touching the cached core
    /// fields.
    async fn resolve_pool_meta(
        &self,
        pool: Address,
        block_number: u64,
        ctx: &DecodeContext,
    ) -> Result<PoolMeta, AppError> {
        let mut meta = match ctx.pool_meta.get(pool).await {
            Some(meta) => meta,
            None => {
                let chain = ctx.chain.as_deref().ok_or_else(|| {
                    AppError::Config("chain client is required for metadata fetches".to_string())
                })?;
                let fetched = metadata::fetch_pool_meta(chain, pool, &ctx.token_meta).await?;
                ctx.pool_meta.set(pool, fetched.clone()).await;
                fetched
            }
        };

        if ctx.include_live_meta {
            if let Some(chain) = ctx.chain.as_deref() {
                let optional = metadata::fetch_pool_optional_meta(chain, pool, block_number).await;
                if !optional.liquidity.is_empty() {
                    meta.liquidity = optional.liquidity;
                }
                if optional.slot0.is_some() {
                    meta.slot0 = optional.slot0;
                }
            }
        }

        Ok(meta)
    }
}

fn build_primitive_log(pool: Address, record: &LogRecord) -> Result<Log, AppError> {
    let mut topics = Vec::with_capacity(record.topics.len());
    for topic in &record.topics {
        topics.push(B256::from_str(topic).map_err(|_| AppError::InvalidTopic(topic.clone()))?);
    }

    let data = record
        .data
        .parse::<Bytes>()
        .map_err(|_| AppError::InvalidData(record.data.clone()))?;

    Ok(Log {
        address: pool,
        data: LogData::new_unchecked(topics, data),
    })
}
