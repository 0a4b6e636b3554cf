use serde::{Deserialize, Serialize};

/// Structured side record written when a log line fails to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeError {
    pub chain_id: u64,
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: u64,
    pub address: String,
    pub topic0: String,
    pub error: String,
}
