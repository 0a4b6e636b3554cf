//! Swap event decoder.
//!
//! Swap(address indexed sender, address indexed recipient, int256 amount0,
//! int256 amount1, uint160 sqrtPriceX96, uint128 liquidity, int24 tick)
//!
//! Negative amounts left the pool, positive amounts entered it.

use alloy::primitives::Log;
use alloy::sol_types::SolEvent;

use indexer_chain::abi::V3Pool;
use indexer_model::SwapEventData;

use crate::error::AppError;

pub fn decode(log: &Log) -> Result<SwapEventData, AppError> {
    let event = V3Pool::Swap::decode_log(log, false).map_err(|e| AppError::abi("Swap", e))?;

    Ok(SwapEventData {
        sender: event.sender.to_string(),
        recipient: event.recipient.to_string(),
        amount0: event.amount0.to_string(),
        amount1: event.amount1.to_string(),
        sqrt_price_x96: event.sqrtPriceX96.to_string(),
        liquidity: event.liquidity.to_string(),
        tick: event.tick.unchecked_into(),
    })
}
