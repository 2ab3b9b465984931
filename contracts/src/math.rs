//! # Fixed-Point & Scale Arithmetic
//!
//! Every conversion between assets of different decimal precision goes
//! through [`convert_scale`]. Rates are fixed point with
//! [`RATE_DECIMALS`](crate::config::RATE_DECIMALS) decimals, so turning a
//! funding amount into sale tokens is
//!
//! ```text
//! tokens = amount * rate * 10^sale_decimals / (10^RATE_DECIMALS * 10^fund_decimals)
//! ```
//!
//! All divisions floor. All multiplications are checked.

use thiserror::Error;

use crate::config::{BPS_DENOMINATOR, RATE_SCALE};
use crate::types::Amount;

/// Errors from checked arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    /// A multiplication or addition exceeded `u128::MAX`.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// A subtraction went below zero.
    #[error("arithmetic underflow in {0}")]
    Underflow(&'static str),

    /// A divisor was zero.
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    /// A decimal exponent is too large to represent.
    #[error("unsupported decimal precision: {0}")]
    Precision(u8),
}

/// `10^decimals`, checked.
pub fn pow10(decimals: u8) -> Result<u128, MathError> {
    10u128
        .checked_pow(u32::from(decimals))
        .ok_or(MathError::Precision(decimals))
}

/// `a * b / denom`, floored.
pub fn mul_div(a: Amount, b: Amount, denom: Amount) -> Result<Amount, MathError> {
    if denom == 0 {
        return Err(MathError::DivisionByZero("mul_div"));
    }
    a.checked_mul(b)
        .map(|product| product / denom)
        .ok_or(MathError::Overflow("mul_div"))
}

/// `amount * bps / 10_000`, floored.
pub fn apply_bps(amount: Amount, bps: u32) -> Result<Amount, MathError> {
    mul_div(amount, Amount::from(bps), BPS_DENOMINATOR)
}

/// Rescales `value` from `from_scale` to `to_scale`, flooring.
///
/// When one scale divides the other (always the case for powers of ten) the
/// conversion is a single multiply or divide, so large values do not
/// overflow an intermediate product.
pub fn convert_scale(value: Amount, from_scale: u128, to_scale: u128) -> Result<Amount, MathError> {
    if from_scale == 0 || to_scale == 0 {
        return Err(MathError::DivisionByZero("convert_scale"));
    }
    if to_scale % from_scale == 0 {
        value
            .checked_mul(to_scale / from_scale)
            .ok_or(MathError::Overflow("convert_scale"))
    } else if from_scale % to_scale == 0 {
        Ok(value / (from_scale / to_scale))
    } else {
        mul_div(value, to_scale, from_scale)
    }
}

/// Converts a `funding amount * rate` product into sale-asset units.
pub fn rate_product_to_tokens(
    product: Amount,
    fund_decimals: u8,
    sale_decimals: u8,
) -> Result<Amount, MathError> {
    let from_scale = RATE_SCALE
        .checked_mul(pow10(fund_decimals)?)
        .ok_or(MathError::Precision(fund_decimals))?;
    convert_scale(product, from_scale, pow10(sale_decimals)?)
}

/// Sale tokens bought by `amount` of the funding asset at `rate`.
pub fn tokens_for(
    amount: Amount,
    rate: Amount,
    fund_decimals: u8,
    sale_decimals: u8,
) -> Result<Amount, MathError> {
    let product = amount
        .checked_mul(rate)
        .ok_or(MathError::Overflow("tokens_for"))?;
    rate_product_to_tokens(product, fund_decimals, sale_decimals)
}

/// Integer square root (floor), used to size the first pool deposit.
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    // Newton iteration from an over-estimate converges monotonically down.
    let mut x = 1u128 << ((128 - n.leading_zeros()).div_ceil(2));
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Full 256-bit product of two `u128`s as `(high, low)` words.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let low = (ll & MASK) | (mid << 64);
    let high = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (high, low)
}

/// `floor(sqrt(a * b))` without overflowing on the intermediate product.
pub fn sqrt_product(a: u128, b: u128) -> u128 {
    if let Some(product) = a.checked_mul(b) {
        return isqrt(product);
    }
    let target = mul_wide(a, b);
    let (mut lo, mut hi) = (0u128, u128::MAX);
    while lo < hi {
        let mid = lo + (hi - lo) / 2 + 1;
        if mul_wide(mid, mid) <= target {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_decimals_divides_by_rate_scale() {
        // 100 units of an 18-decimal asset at rate 1e9 (0.1 token per unit).
        let raised = 100 * 10u128.pow(18);
        let tokens = tokens_for(raised, 1_000_000_000, 18, 18).unwrap();
        assert_eq!(tokens, raised * 1_000_000_000 / RATE_SCALE);
        assert_eq!(tokens, 10 * 10u128.pow(18));
    }

    #[test]
    fn fewer_sale_decimals_divides_once() {
        // 18-decimal funding, 9-decimal sale token: divisor 1e19.
        let raised = 50 * 10u128.pow(18);
        let rate = 1_000_000_000;
        let tokens = tokens_for(raised, rate, 18, 9).unwrap();
        assert_eq!(tokens, raised * rate / 10u128.pow(19));
    }

    #[test]
    fn more_sale_decimals_multiplies() {
        let tokens = tokens_for(5, RATE_SCALE, 6, 18).unwrap();
        assert_eq!(tokens, 5 * 10u128.pow(12));
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(
            tokens_for(u128::MAX, 2, 18, 18),
            Err(MathError::Overflow("tokens_for"))
        );
        assert!(convert_scale(u128::MAX, 1, 10).is_err());
    }

    #[test]
    fn bps_floors() {
        assert_eq!(apply_bps(199, 100).unwrap(), 1);
        assert_eq!(apply_bps(1_000, 10_000).unwrap(), 1_000);
        assert_eq!(apply_bps(1_000, 0).unwrap(), 0);
    }

    #[test]
    fn zero_divisor_rejected() {
        assert!(mul_div(1, 1, 0).is_err());
        assert!(convert_scale(1, 0, 1).is_err());
    }

    #[test]
    fn isqrt_floors() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(10u128.pow(36)), 10u128.pow(18));
        assert_eq!(isqrt(u128::MAX), u64::MAX as u128);
    }

    #[test]
    fn sqrt_product_handles_wide_products() {
        assert_eq!(sqrt_product(4, 9), 6);
        assert_eq!(sqrt_product(10u128.pow(21), 10u128.pow(21)), 10u128.pow(21));
        assert_eq!(sqrt_product(u128::MAX, u128::MAX), u128::MAX);
        assert_eq!(mul_wide(u128::MAX, 2), (1, u128::MAX - 1));
    }
}
