use serde::{Deserialize, Serialize};

/// Decoded Swap payload.
///
/// Amounts follow the pool's sign convention: negative means the token
/// left the pool, positive means it entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEventData {
    pub sender: String,
    pub recipient: String,
    pub amount0: String,
    pub amount1: String,
    pub sqrt_price_x96: String,
    pub liquidity: String,
    pub tick: i32,
}

/// Decoded Mint payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintEventData {
    pub sender: String,
    pub owner: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount: String,
    pub amount0: String,
    pub amount1: String,
}

/// Decoded Burn payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnEventData {
    pub owner: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount: String,
    pub amount0: String,
    pub amount1: String,
}

/// Decoded Collect payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectEventData {
    pub owner: String,
    pub recipient: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount0: String,
    pub amount1: String,
}

/// One decoded payload per supported pool event. Serialised untagged;
/// the surrounding record's `event_name` field is the discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Swap(SwapEventData),
    Mint(MintEventData),
    Burn(BurnEventData),
    Collect(CollectEventData),
}
