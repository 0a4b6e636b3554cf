//! Chain access for the indexer pipeline: the RPC client wrapper, the
//! V3 pool and ERC-20 contract bindings, and the metadata fetchers with
//! their process-wide caches.

pub mod abi;
pub mod client;
pub mod error;
pub mod metadata;

pub use client::Client;
pub use error::ChainError;
pub use metadata::{PoolMetaCache, TokenMetaCache};
