use serde::{Deserialize, Serialize};

/// Immutable V3 pool metadata plus optional live fields.
///
/// `fee` is in parts-per-million; `tick_spacing` is within the signed
/// 24-bit range. `liquidity` and `slot0` are only populated when the
/// decoder runs with live metadata enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMeta {
    #[serde(default)]
    pub token0: String,
    #[serde(default)]
    pub token1: String,
    #[serde(default)]
    pub fee: u32,
    #[serde(default)]
    pub tick_spacing: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub liquidity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot0: Option<PoolSlot0>,
}

/// Select fields of a pool's packed slot0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSlot0 {
    pub sqrt_price_x96: String,
    pub tick: i32,
}
