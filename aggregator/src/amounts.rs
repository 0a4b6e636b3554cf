//! Exact decimal formatting and rate math.
//!
//! Everything stays on arbitrary-precision integers; fractional output is
//! produced by scaling and truncation toward zero at the final formatting
//! step.

use num_bigint::BigInt;
use num_traits::{pow, Signed, Zero};

/// Fractional digits used for fee rates and APR.
const RATIO_SCALE: u32 = 18;

const SECONDS_PER_YEAR: u64 = 365 * 86_400;

/// Formats `value` as a decimal string with exactly `decimals` fractional
/// digits, minus-prefixed when negative. `decimals == 0` yields the plain
/// integer form.
pub fn format_token_amount(value: &BigInt, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }

    let abs = value.abs();
    let denom = pow(BigInt::from(10), decimals as usize);
    let int_part = &abs / &denom;
    let frac_part = &abs % &denom;

    let text = format!(
        "{int_part}.{frac:0>width$}",
        frac = frac_part.to_string(),
        width = decimals as usize
    );

    if value.is_negative() {
        format!("-{text}")
    } else {
        text
    }
}

/// Fee/TVL ratio scaled by 10^18, or `None` when either side is zero or
/// the TVL is unknown.
pub fn compute_rate(fee: &BigInt, tvl: Option<&BigInt>) -> Option<BigInt> {
    let tvl = tvl?;
    if fee.is_zero() || tvl.is_zero() {
        return None;
    }

    Some((fee * pow(BigInt::from(10), RATIO_SCALE as usize)) / tvl)
}

/// Annualises a window fee rate: rate * (seconds_per_year / window).
///
/// Defined only when exactly one of the two rates is present. The
/// fee-tier approximation assigns fees to the input side of a swap, so a
/// window with both rates set has no single side to annualise.
pub fn compute_apr(
    rate0: Option<&BigInt>,
    rate1: Option<&BigInt>,
    window_seconds: u64,
) -> Option<BigInt> {
    if window_seconds == 0 {
        return None;
    }

    let rate = match (rate0, rate1) {
        (Some(rate), None) => rate,
        (None, Some(rate)) => rate,
        _ => return None,
    };

    Some((rate * BigInt::from(SECONDS_PER_YEAR)) / BigInt::from(window_seconds))
}

/// Renders a 10^18-scaled ratio with 18 fractional digits.
pub fn format_rate(scaled: &BigInt) -> String {
    format_token_amount(scaled, RATIO_SCALE as u8)
}
