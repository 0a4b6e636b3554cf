use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use indexer_model::{PoolMeta, SwapEventData, TypedEventRecord};

use crate::error::AppError;

/// Running totals for one pool inside one window.
///
/// Volumes sum absolute swap amounts; fees follow the fee-tier
/// approximation, attributed to the side that entered the pool. Only swap
/// events move the counters, but every event advances the block/timestamp
/// bookkeeping.
#[derive(Debug, Clone)]
pub struct Accumulator {
    pub chain_id: u64,
    pub pool_address: String,
    pub pool_meta: PoolMeta,
    pub window_start: u64,
    pub window_end: u64,
    pub swap_count: u64,
    pub volume0: BigInt,
    pub volume1: BigInt,
    pub fee0: BigInt,
    pub fee1: BigInt,
    pub last_block: u64,
    pub last_ts: u64,
    pub first_block: u64,
}

impl Accumulator {
    pub fn new(record: &TypedEventRecord, window_start: u64, window_end: u64) -> Self {
        Self {
            chain_id: record.chain_id,
            pool_address: record.address.clone(),
            pool_meta: record.pool_meta.clone(),
            window_start,
            window_end,
            swap_count: 0,
            volume0: BigInt::zero(),
            volume1: BigInt::zero(),
            fee0: BigInt::zero(),
            fee1: BigInt::zero(),
            last_block: record.block_number,
            last_ts: record.timestamp,
            first_block: record.block_number,
        }
    }

    /// Folds one event in. Ties on timestamp prefer later records in input
    /// order; `last_block` selects the TVL snapshot height at flush time.
    pub fn add(&mut self, record: &TypedEventRecord) -> Result<(), AppError> {
        if record.timestamp >= self.last_ts {
            self.last_ts = record.timestamp;
            self.last_block = record.block_number;
        }
        if self.first_block == 0 || record.block_number < self.first_block {
            self.first_block = record.block_number;
        }

        if record.event_name.eq_ignore_ascii_case("swap") {
            let swap: SwapEventData = serde_json::from_value(record.decoded.clone())
                .map_err(|err| AppError::SwapPayload(err.to_string()))?;
            self.apply_swap(&swap)?;
        }

        Ok(())
    }

    fn apply_swap(&mut self, swap: &SwapEventData) -> Result<(), AppError> {
        let amount0 = parse_big_int(&swap.amount0)?;
        let amount1 = parse_big_int(&swap.amount1)?;

        self.volume0 += amount0.abs();
        self.volume1 += amount1.abs();

        let fee = self.pool_meta.fee;
        if fee == 0 {
            self.swap_count += 1;
            return Ok(());
        }

        if amount0.is_negative() && amount1.is_positive() {
            self.fee1 += fee_from_amount(&amount1, fee);
        } else if amount1.is_negative() && amount0.is_positive() {
            self.fee0 += fee_from_amount(&amount0, fee);
        }

        self.swap_count += 1;
        Ok(())
    }
}

fn parse_big_int(value: &str) -> Result<BigInt, AppError> {
    if value.is_empty() {
        return Ok(BigInt::zero());
    }
    value
        .parse::<BigInt>()
        .map_err(|_| AppError::SwapPayload(format!("invalid integer: {value}")))
}

/// Approximate fee: |amount_in| * feeTier / 10^6, truncated.
fn fee_from_amount(amount_in: &BigInt, fee: u32) -> BigInt {
    (amount_in.abs() * fee) / 1_000_000u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexer_model::PoolMeta;

    fn swap_record(
        pool: &str,
        ts: u64,
        block: u64,
        amount0: &str,
        amount1: &str,
        fee: u32,
    ) -> TypedEventRecord {
        TypedEventRecord {
            chain_id: 56,
            block_number: block,
            address: pool.to_string(),
            event_name: "Swap".to_string(),
            timestamp: ts,
            decoded: serde_json::json!({
                "sender": "0x2222222222222222222222222222222222222222",
                "recipient": "0x3333333333333333333333333333333333333333",
                "amount0": amount0,
                "amount1": amount1,
                "sqrt_price_x96": "0",
                "liquidity": "0",
                "tick": 0
            }),
            pool_meta: PoolMeta {
                token0: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
                token1: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_string(),
                fee,
                tick_spacing: 10,
                ..PoolMeta::default()
            },
            ..TypedEventRecord::default()
        }
    }

    #[test]
    fn fee_goes_to_the_input_side() {
        let record = swap_record(
            "0x1111111111111111111111111111111111111111",
            1_700_000_000,
            100,
            "-1000000000000000000",
            "2000000",
            500,
        );

        let mut acc = Accumulator::new(&record, 1_699_999_800, 1_700_000_100);
        acc.add(&record).unwrap();

        assert_eq!(acc.swap_count, 1);
        assert_eq!(acc.volume0.to_string(), "1000000000000000000");
        assert_eq!(acc.volume1.to_string(), "2000000");
        // amount1 entered the pool: fee1 = 2_000_000 * 500 / 1e6
        assert_eq!(acc.fee1.to_string(), "1000");
        assert!(acc.fee0.is_zero());
    }

    #[test]
    fn no_fee_attribution_for_same_sign_amounts() {
        let record = swap_record(
            "0x1111111111111111111111111111111111111111",
            1_700_000_000,
            100,
            "1000",
            "2000",
            500,
        );

        let mut acc = Accumulator::new(&record, 1_699_999_800, 1_700_000_100);
        acc.add(&record).unwrap();

        assert_eq!(acc.swap_count, 1);
        assert!(acc.fee0.is_zero());
        assert!(acc.fee1.is_zero());
        assert_eq!(acc.volume0.to_string(), "1000");
    }

    #[test]
    fn zero_fee_tier_still_counts_swaps() {
        let record = swap_record(
            "0x1111111111111111111111111111111111111111",
            1_700_000_000,
            100,
            "-1000",
            "2000",
            0,
        );

        let mut acc = Accumulator::new(&record, 1_699_999_800, 1_700_000_100);
        acc.add(&record).unwrap();

        assert_eq!(acc.swap_count, 1);
        assert!(acc.fee1.is_zero());
    }

    #[test]
    fn empty_amounts_parse_as_zero() {
        let record = swap_record(
            "0x1111111111111111111111111111111111111111",
            1_700_000_000,
            100,
            "",
            "",
            500,
        );

        let mut acc = Accumulator::new(&record, 1_699_999_800, 1_700_000_100);
        acc.add(&record).unwrap();
        assert_eq!(acc.swap_count, 1);
        assert!(acc.volume0.is_zero());
    }

    #[test]
    fn non_swap_events_only_move_bookkeeping() {
        let mut record = swap_record(
            "0x1111111111111111111111111111111111111111",
            1_700_000_000,
            100,
            "-1000",
            "2000",
            500,
        );
        record.event_name = "Mint".to_string();
        record.decoded = serde_json::Value::Null;

        let mut acc = Accumulator::new(&record, 1_699_999_800, 1_700_000_100);
        acc.add(&record).unwrap();

        assert_eq!(acc.swap_count, 0);
        assert!(acc.volume0.is_zero());
        assert_eq!(acc.last_block, 100);
    }

    #[test]
    fn timestamp_ties_prefer_later_records() {
        let pool = "0x1111111111111111111111111111111111111111";
        let first = swap_record(pool, 1_700_000_000, 100, "-10", "20", 500);
        let tie = swap_record(pool, 1_700_000_000, 99, "-10", "20", 500);

        let mut acc = Accumulator::new(&first, 1_699_999_800, 1_700_000_100);
        acc.add(&first).unwrap();
        acc.add(&tie).unwrap();

        // Equal timestamps: input order wins, so the tie's block sticks.
        assert_eq!(acc.last_block, 99);
        // first_block tracks the monotone minimum.
        assert_eq!(acc.first_block, 99);
    }

    #[test]
    fn totals_are_invariant_under_permutation() {
        let pool = "0x1111111111111111111111111111111111111111";
        let records = [
            swap_record(pool, 1_700_000_010, 100, "-1000000000000000000", "2000000", 500),
            swap_record(pool, 1_700_000_020, 101, "3000000000000000000", "-5000000", 500),
            swap_record(pool, 1_700_000_030, 102, "-700000000000000000", "900000", 500),
        ];

        let permutations: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        let mut reference: Option<(u64, String, String, String, String)> = None;
        for order in permutations {
            let mut acc = Accumulator::new(&records[order[0]], 1_699_999_800, 1_700_000_100);
            for index in order {
                acc.add(&records[index]).unwrap();
            }

            let totals = (
                acc.swap_count,
                acc.volume0.to_string(),
                acc.volume1.to_string(),
                acc.fee0.to_string(),
                acc.fee1.to_string(),
            );
            match &reference {
                None => reference = Some(totals),
                Some(expected) => assert_eq!(expected, &totals),
            }
        }

        let (count, volume0, volume1, fee0, fee1) = reference.unwrap();
        assert_eq!(count, 3);
        assert_eq!(volume0, "4700000000000000000");
        assert_eq!(volume1, "7900000");
        // fee0: input side on the second swap, 3e18 * 500 / 1e6
        assert_eq!(fee0, "1500000000000000");
        // fee1: swaps one and three, (2_000_000 + 900_000) * 500 / 1e6
        assert_eq!(fee1, "1450");
    }
}
