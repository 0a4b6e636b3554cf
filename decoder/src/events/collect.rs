//! Collect event decoder.
//!
//! Collect(address indexed owner, address recipient, int24 indexed tickLower,
//! int24 indexed tickUpper, uint128 amount0, uint128 amount1)

use alloy::primitives::Log;
use alloy::sol_types::SolEvent;

use indexer_chain::abi::V3Pool;
use indexer_model::CollectEventData;

use crate::error::AppError;

pub fn decode(log: &Log) -> Result<CollectEventData, AppError> {
    let event = V3Pool::Collect::decode_log(log, false).map_err(|e| AppError::abi("Collect", e))?;

    Ok(CollectEventData {
        owner: event.owner.to_string(),
        recipient: event.recipient.to_string(),
        tick_lower: event.tickLower.unchecked_into(),
        tick_upper: event.tickUpper.unchecked_into(),
        amount0: event.amount0.to_string(),
        amount1: event.amount1.to_string(),
    })
}
