use serde::{Deserialize, Serialize};

/// ERC-20 token metadata.
///
/// `symbol` and `name` fall back to the empty string for tokens that
/// answer with neither the `string` nor the `bytes32` ABI shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMeta {
    pub address: String,
    pub decimals: u8,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
}
