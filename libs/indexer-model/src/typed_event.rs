use serde::{Deserialize, Serialize};

use crate::events::EventPayload;
use crate::pool_meta::PoolMeta;

/// A decoded pool event enriched with pool metadata, as written by the
/// decoder stage.
#[derive(Debug, Clone, Serialize)]
pub struct TypedEvent {
    pub chain_id: u64,
    pub block_number: u64,
    pub block_hash: String,
    pub tx_hash: String,
    pub log_index: u64,
    pub address: String,
    pub event_name: String,
    pub timestamp: u64,
    pub decoded: EventPayload,
    pub pool_meta: PoolMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawLogRef>,
}

/// Minimal raw-log back-reference kept for traceability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogRef {
    pub topic0: String,
    pub data: String,
}

/// Read-side shape of a typed event line. The payload stays an opaque
/// JSON value; the aggregator re-parses it only for Swap events.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TypedEventRecord {
    pub chain_id: u64,
    pub block_number: u64,
    pub block_hash: String,
    pub tx_hash: String,
    pub log_index: u64,
    pub address: String,
    pub event_name: String,
    pub timestamp: u64,
    pub decoded: serde_json::Value,
    pub pool_meta: PoolMeta,
    pub raw: Option<RawLogRef>,
}

impl Default for TypedEventRecord {
    fn default() -> Self {
        Self {
            chain_id: 0,
            block_number: 0,
            block_hash: String::new(),
            tx_hash: String::new(),
            log_index: 0,
            address: String::new(),
            event_name: String::new(),
            timestamp: 0,
            decoded: serde_json::Value::Null,
            pool_meta: PoolMeta::default(),
            raw: None,
        }
    }
}
