use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("missing `{0}` environment variable")]
    MissingEnvVar(String),

    #[error("{0}")]
    Config(String),

    #[error("missing topic0")]
    MissingTopic0,

    #[error("unsupported topic0: {0}")]
    UnsupportedTopic(String),

    #[error("invalid pool address: {0}")]
    InvalidAddress(String),

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("decode {event}: {source}")]
    Abi {
        event: &'static str,
        source: alloy::sol_types::Error,
    },

    #[error("pool metadata: {0}")]
    PoolMeta(#[from] indexer_chain::ChainError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub(crate) fn abi(event: &'static str, source: alloy::sol_types::Error) -> Self {
        Self::Abi { event, source }
    }
}
