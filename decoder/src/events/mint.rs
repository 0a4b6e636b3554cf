//! Mint event decoder.
//!
//! Mint(address sender, address indexed owner, int24 indexed tickLower,
//! int24 indexed tickUpper, uint128 amount, uint256 amount0, uint256 amount1)

use alloy::primitives::Log;
use alloy::sol_types::SolEvent;

use indexer_chain::abi::V3Pool;
use indexer_model::MintEventData;

use crate::error::AppError;

pub fn decode(log: &Log) -> Result<MintEventData, AppError> {
    let event = V3Pool::Mint::decode_log(log, false).map_err(|e| AppError::abi("Mint", e))?;

    Ok(MintEventData {
        sender: event.sender.to_string(),
        owner: event.owner.to_string(),
        tick_lower: event.tickLower.unchecked_into(),
        tick_upper: event.tickUpper.unchecked_into(),
        amount: event.amount.to_string(),
        amount0: event.amount0.to_string(),
        amount1: event.amount1.to_string(),
    })
}
