//! Shared record types for the indexer pipeline.
//!
//! The three stages hand data to each other as JSON lines; the types in
//! this crate are that wire format. All 256-bit on-chain integers are
//! carried as base-10 strings so no precision is lost in transit.

pub mod decode_error;
pub mod events;
pub mod jsonl;
pub mod log_record;
pub mod pool_meta;
pub mod token_meta;
pub mod typed_event;

pub use decode_error::DecodeError;
pub use events::{BurnEventData, CollectEventData, EventPayload, MintEventData, SwapEventData};
pub use jsonl::JsonlWriter;
pub use log_record::LogRecord;
pub use pool_meta::{PoolMeta, PoolSlot0};
pub use token_meta::TokenMeta;
pub use typed_event::{RawLogRef, TypedEvent, TypedEventRecord};
