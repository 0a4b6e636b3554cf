use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("invalid rpc url: {0}")]
    InvalidUrl(String),

    #[error("transport: {0}")]
    Transport(#[from] alloy::transports::TransportError),

    #[error("call {method}: {source}")]
    Call {
        method: &'static str,
        source: alloy::contract::Error,
    },

    #[error("block {0} not found")]
    BlockNotFound(u64),
}

impl ChainError {
    pub(crate) fn call(method: &'static str, source: alloy::contract::Error) -> Self {
        Self::Call { method, source }
    }
}
