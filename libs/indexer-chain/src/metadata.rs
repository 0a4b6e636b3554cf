use std::collections::HashMap;

use alloy::eips::BlockId;
use alloy::primitives::{Address, FixedBytes, U256};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use indexer_model::{PoolMeta, PoolSlot0, TokenMeta};

use crate::abi::{Erc20, Erc20Bytes32, V3Pool};
use crate::client::Client;
use crate::error::ChainError;

/// Pool metadata cache keyed by pool address. Entries are written once on
/// a fetch miss and never mutated afterwards.
#[derive(Default)]
pub struct PoolMetaCache {
    data: RwLock<HashMap<Address, PoolMeta>>,
}

impl PoolMetaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, address: Address) -> Option<PoolMeta> {
        self.data.read().await.get(&address).cloned()
    }

    pub async fn set(&self, address: Address, meta: PoolMeta) {
        self.data.write().await.insert(address, meta);
    }
}

/// Token metadata cache keyed by token address.
#[derive(Default)]
pub struct TokenMetaCache {
    data: RwLock<HashMap<Address, TokenMeta>>,
}

impl TokenMetaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, address: Address) -> Option<TokenMeta> {
        self.data.read().await.get(&address).cloned()
    }

    pub async fn set(&self, address: Address, meta: TokenMeta) {
        self.data.write().await.insert(address, meta);
    }
}

/// Loads the immutable pool fields (token0, token1, fee, tickSpacing) at
/// the latest block and warms the token cache for both tokens.
///
/// A failed token fetch is stored as a sentinel entry so it is not
/// retried within the same run.
pub async fn fetch_pool_meta(
    client: &Client,
    pool: Address,
    token_cache: &TokenMetaCache,
) -> Result<PoolMeta, ChainError> {
    let contract = V3Pool::new(pool, client.provider().clone());

    let token0 = contract
        .token0()
        .call()
        .await
        .map_err(|e| ChainError::call("token0", e))?
        ._0;
    let token1 = contract
        .token1()
        .call()
        .await
        .map_err(|e| ChainError::call("token1", e))?
        ._0;
    let fee = contract
        .fee()
        .call()
        .await
        .map_err(|e| ChainError::call("fee", e))?
        ._0;
    let tick_spacing = contract
        .tickSpacing()
        .call()
        .await
        .map_err(|e| ChainError::call("tickSpacing", e))?
        ._0;

    let meta = PoolMeta {
        token0: token0.to_string(),
        token1: token1.to_string(),
        fee: fee.to::<u32>(),
        tick_spacing: tick_spacing.unchecked_into(),
        ..PoolMeta::default()
    };

    for token in [token0, token1] {
        if token_cache.get(token).await.is_some() {
            continue;
        }
        match fetch_token_meta(client, token).await {
            Ok(token_meta) => token_cache.set(token, token_meta).await,
            Err(err) => {
                warn!("token metadata fetch failed for {token}: {err}");
                let sentinel = TokenMeta {
                    address: token.to_string(),
                    ..TokenMeta::default()
                };
                token_cache.set(token, sentinel).await;
            }
        }
    }

    Ok(meta)
}

/// Loads the optional live pool fields (liquidity, slot0) at `block_number`
/// (0 means latest). Failures are non-fatal; missing fields stay unset.
/// Historical accuracy requires an archive node.
pub async fn fetch_pool_optional_meta(
    client: &Client,
    pool: Address,
    block_number: u64,
) -> PoolMeta {
    let contract = V3Pool::new(pool, client.provider().clone());
    let block = if block_number > 0 {
        BlockId::number(block_number)
    } else {
        BlockId::latest()
    };

    let mut meta = PoolMeta::default();

    match contract.liquidity().block(block).call().await {
        Ok(ret) => meta.liquidity = ret._0.to_string(),
        Err(err) => debug!("liquidity call failed for {pool}: {err}"),
    }

    match contract.slot0().block(block).call().await {
        Ok(ret) => {
            meta.slot0 = Some(PoolSlot0 {
                sqrt_price_x96: ret.sqrtPriceX96.to_string(),
                tick: ret.tick.unchecked_into(),
            })
        }
        Err(err) => debug!("slot0 call failed for {pool}: {err}"),
    }

    meta
}

/// Loads ERC-20 token metadata. `decimals` must succeed; `symbol` and
/// `name` try the `string` ABI first and fall back to `bytes32`.
pub async fn fetch_token_meta(client: &Client, token: Address) -> Result<TokenMeta, ChainError> {
    let erc20 = Erc20::new(token, client.provider().clone());
    let fallback = Erc20Bytes32::new(token, client.provider().clone());

    let decimals = erc20
        .decimals()
        .call()
        .await
        .map_err(|e| ChainError::call("decimals", e))?
        ._0;

    let mut meta = TokenMeta {
        address: token.to_string(),
        decimals,
        ..TokenMeta::default()
    };

    match erc20.symbol().call().await {
        Ok(ret) => meta.symbol = ret._0,
        Err(_) => match fallback.symbol().call().await {
            Ok(ret) => meta.symbol = bytes32_to_string(ret._0),
            Err(err) => debug!("symbol call failed for {token}: {err}"),
        },
    }

    match erc20.name().call().await {
        Ok(ret) => meta.name = ret._0,
        Err(_) => match fallback.name().call().await {
            Ok(ret) => meta.name = bytes32_to_string(ret._0),
            Err(err) => debug!("name call failed for {token}: {err}"),
        },
    }

    Ok(meta)
}

/// `balanceOf(owner)` on `token`, at `block_number` or latest when `None`.
pub async fn balance_of(
    client: &Client,
    token: Address,
    owner: Address,
    block_number: Option<u64>,
) -> Result<U256, ChainError> {
    let erc20 = Erc20::new(token, client.provider().clone());
    let call = erc20.balanceOf(owner);
    let call = match block_number {
        Some(number) => call.block(BlockId::number(number)),
        None => call,
    };

    Ok(call
        .call()
        .await
        .map_err(|e| ChainError::call("balanceOf", e))?
        ._0)
}

fn bytes32_to_string(value: FixedBytes<32>) -> String {
    let bytes = value.as_slice();
    let end = bytes
        .iter()
        .rposition(|b| *b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
