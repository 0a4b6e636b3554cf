use crate::error::AppError;

/// Inclusive block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

/// Splits `[from, to]` into consecutive inclusive ranges of width at most
/// `batch_size`, covering the whole span with no gaps or overlaps.
pub fn split_range(from: u64, to: u64, batch_size: u64) -> Result<Vec<BlockRange>, AppError> {
    if batch_size == 0 {
        return Err(AppError::Config(
            "batch size must be greater than zero".to_string(),
        ));
    }
    if to < from {
        return Err(AppError::Config(format!(
            "to block {to} must be >= from block {from}"
        )));
    }

    let mut ranges = Vec::new();
    let mut start = from;
    loop {
        let remaining = to - start + 1;
        let end = if remaining <= batch_size {
            to
        } else {
            start + batch_size - 1
        };
        ranges.push(BlockRange { from: start, to: end });
        if end == to {
            break;
        }
        start = end + 1;
    }

    Ok(ranges)
}
