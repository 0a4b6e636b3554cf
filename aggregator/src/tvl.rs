use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use indexer_chain::{metadata, Client};

use crate::error::AppError;

pub const TVL_METHOD_BLOCK: &str = "balance_of_block";
pub const TVL_METHOD_LATEST: &str = "balance_of_latest";
pub const TVL_METHOD_NONE: &str = "unavailable";

/// The chain reads the aggregator needs. Split out as a trait so the
/// streaming behavior can run against a fake chain in tests.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn token_decimals(&self, token: Address) -> Result<u8, AppError>;
    async fn balance_of(
        &self,
        token: Address,
        owner: Address,
        block_number: Option<u64>,
    ) -> Result<U256, AppError>;
}

#[async_trait]
impl ChainSource for Client {
    async fn token_decimals(&self, token: Address) -> Result<u8, AppError> {
        Ok(metadata::fetch_token_meta(self, token).await?.decimals)
    }

    async fn balance_of(
        &self,
        token: Address,
        owner: Address,
        block_number: Option<u64>,
    ) -> Result<U256, AppError> {
        Ok(metadata::balance_of(self, token, owner, block_number).await?)
    }
}

/// Reads both token balances of the pool at the window's last block,
/// falling back to the latest block when the pinned reads fail (pruned
/// state on non-archive nodes is the usual cause).
pub async fn fetch_tvl<C: ChainSource + ?Sized>(
    chain: &C,
    token0: Address,
    token1: Address,
    pool: Address,
    block_number: u64,
) -> Result<(U256, U256, &'static str), AppError> {
    let balance0 = chain.balance_of(token0, pool, Some(block_number)).await;
    let balance1 = chain.balance_of(token1, pool, Some(block_number)).await;
    if let (Ok(balance0), Ok(balance1)) = (balance0, balance1) {
        return Ok((balance0, balance1, TVL_METHOD_BLOCK));
    }

    let balance0 = chain.balance_of(token0, pool, None).await;
    let balance1 = chain.balance_of(token1, pool, None).await;
    match (balance0, balance1) {
        (Ok(balance0), Ok(balance1)) => Ok((balance0, balance1, TVL_METHOD_LATEST)),
        _ => Err(AppError::Tvl("balanceOf failed".to_string())),
    }
}
