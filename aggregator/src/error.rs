use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("missing `{0}` environment variable")]
    MissingEnvVar(String),

    #[error("{0}")]
    Config(String),

    #[error("swap payload: {0}")]
    SwapPayload(String),

    #[error("tvl: {0}")]
    Tvl(String),

    #[error("store: {0}")]
    Store(#[from] sqlx::Error),

    #[error("chain: {0}")]
    Chain(#[from] indexer_chain::ChainError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
