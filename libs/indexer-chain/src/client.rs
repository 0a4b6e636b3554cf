use std::collections::HashMap;

use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Filter, Log};
use alloy::transports::http::{Client as HttpClient, Http};
use tokio::sync::RwLock;

use crate::error::ChainError;

pub type HttpProvider = RootProvider<Http<HttpClient>>;

/// Thin wrapper over an alloy HTTP provider.
///
/// Block timestamps are served from an in-memory header cache so the
/// crawler does not refetch the same header for every log in a block.
pub struct Client {
    provider: HttpProvider,
    ts_cache: RwLock<HashMap<u64, u64>>,
}

impl Client {
    pub fn connect(rpc_url: &str) -> Result<Self, ChainError> {
        let url = rpc_url
            .parse()
            .map_err(|_| ChainError::InvalidUrl(rpc_url.to_string()))?;

        Ok(Self {
            provider: RootProvider::new_http(url),
            ts_cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_chain_id().await?)
    }

    pub async fn latest_block_number(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_block_number().await?)
    }

    /// Block timestamp in unix seconds, cached per block number.
    pub async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        if let Some(ts) = self.ts_cache.read().await.get(&number) {
            return Ok(*ts);
        }

        let block = self
            .provider
            .get_block_by_number(number.into(), BlockTransactionsKind::Hashes)
            .await?
            .ok_or(ChainError::BlockNotFound(number))?;
        let ts = block.header.timestamp;

        self.ts_cache.write().await.insert(number, ts);
        Ok(ts)
    }

    /// Logs in the inclusive range `[from, to]` for the given emitter
    /// addresses, optionally narrowed by topic0 selectors.
    pub async fn filter_logs(
        &self,
        from: u64,
        to: u64,
        addresses: Vec<Address>,
        topic0: Vec<B256>,
    ) -> Result<Vec<Log>, ChainError> {
        let mut filter = Filter::new().from_block(from).to_block(to).address(addresses);
        if !topic0.is_empty() {
            filter = filter.event_signature(topic0);
        }

        Ok(self.provider.get_logs(&filter).await?)
    }
}
