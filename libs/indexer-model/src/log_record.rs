use serde::{Deserialize, Serialize};

/// Normalized representation of a chain log, as written by the crawler
/// and read back by the decoder.
///
/// `(chain_id, block_number, tx_hash, log_index)` uniquely identifies a
/// log; `topics[0]` is the event selector when the log is decodable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRecord {
    pub chain_id: u64,
    pub block_number: u64,
    pub block_hash: String,
    pub tx_hash: String,
    pub tx_index: u64,
    pub log_index: u64,
    pub address: String,
    pub topics: Vec<String>,
    /// Hex-encoded (0x-prefixed) event data blob.
    pub data: String,
    pub removed: bool,
    /// Block timestamp in unix seconds.
    pub timestamp: u64,
    /// RFC3339 timestamp of when the crawler saw the log.
    pub ingested_at: String,
}
