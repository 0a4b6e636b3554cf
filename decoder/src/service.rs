use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use indexer_model::{DecodeError, JsonlWriter, LogRecord};

use crate::error::AppError;
use crate::events::{DecodeContext, V3PoolDecoder};

pub struct ServiceConfig {
    pub input_path: String,
    pub out_path: String,
    pub errors_path: String,
}

/// Streams the raw-log JSONL through the decoder.
///
/// Per-record faults never abort the run: malformed lines and decode
/// failures become decode-error records, unknown selectors are skipped.
pub async fn run(
    cfg: ServiceConfig,
    decoder: V3PoolDecoder,
    ctx: DecodeContext,
    shutdown: Arc<AtomicBool>,
) -> Result<(), AppError> {
    let input = File::open(&cfg.input_path).await?;
    let mut lines = BufReader::new(input).lines();

    let mut out = JsonlWriter::create(&cfg.out_path).await?;
    let mut errors = JsonlWriter::create(&cfg.errors_path).await?;

    let mut total = 0u64;
    let mut decoded = 0u64;
    let mut skipped = 0u64;
    let mut failed = 0u64;

    while let Some(line) = lines.next_line().await? {
        if shutdown.load(Ordering::Relaxed) {
            info!("shutdown requested, stopping");
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        total += 1;

        let record: LogRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(err) => {
                failed += 1;
                errors
                    .write(&DecodeError {
                        error: err.to_string(),
                        ..DecodeError::default()
                    })
                    .await?;
                continue;
            }
        };

        if record.topics.is_empty() {
            failed += 1;
            errors
                .write(&decode_error_from(&record, "missing topic0"))
                .await?;
            continue;
        }

        // Upstream filters may let foreign events through; those are not
        // errors.
        if !decoder.can_decode(&record.topics[0]) {
            skipped += 1;
            continue;
        }

        match decoder.decode(&record, &ctx).await {
            Ok(event) => {
                out.write(&event).await?;
                decoded += 1;
            }
            Err(err) => {
                failed += 1;
                warn!(
                    "decode failed for log {}:{}: {err}",
                    record.block_number, record.log_index
                );
                errors
                    .write(&decode_error_from(&record, &err.to_string()))
                    .await?;
            }
        }
    }

    out.flush().await?;
    errors.flush().await?;

    info!("decode complete: total={total} decoded={decoded} skipped={skipped} failed={failed}");
    Ok(())
}

fn decode_error_from(record: &LogRecord, error: &str) -> DecodeError {
    DecodeError {
        chain_id: record.chain_id,
        block_number: record.block_number,
        tx_hash: record.tx_hash.clone(),
        log_index: record.log_index,
        address: record.address.clone(),
        topic0: record.topics.first().cloned().unwrap_or_default(),
        error: error.to_string(),
    }
}
