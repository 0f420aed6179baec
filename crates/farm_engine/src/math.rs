//! Checked arithmetic helpers - overflow is an error, never a wrap

use crate::error::{FarmError, Result};
use crate::state::U256;

/// Add u128, failing on overflow
pub fn add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(FarmError::ArithmeticOverflow)
}

/// Subtract u128, failing on underflow
pub fn sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(FarmError::ArithmeticOverflow)
}

/// Multiply u128, failing on overflow
pub fn mul(a: u128, b: u128) -> Result<u128> {
    a.checked_mul(b).ok_or(FarmError::ArithmeticOverflow)
}

/// floor(a * b / c) with a 256-bit intermediate; zero when c is zero.
/// Fails only when the quotient itself exceeds u128.
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 || a == 0 || b == 0 {
        return Ok(0);
    }
    narrow(mul_div_wide(U256::from(a), U256::from(b), U256::from(c))?)
}

/// floor(a * b / c) through a 256-bit product; zero when c is zero
pub fn mul_div_wide(a: U256, b: U256, c: U256) -> Result<U256> {
    if c.is_zero() {
        return Ok(U256::zero());
    }
    let product = a.checked_mul(b).ok_or(FarmError::ArithmeticOverflow)?;
    Ok(product / c)
}

/// Add U256, failing on overflow
pub fn add_wide(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(FarmError::ArithmeticOverflow)
}

/// Subtract U256, failing on underflow
pub fn sub_wide(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(FarmError::ArithmeticOverflow)
}

/// Narrow to u128, failing when the value does not fit
pub fn narrow(v: U256) -> Result<u128> {
    if v.bits() > 128 {
        return Err(FarmError::ArithmeticOverflow);
    }
    Ok(v.low_u128())
}

/// Add seconds to a timestamp, failing on overflow
pub fn add_time(t: u64, dt: u64) -> Result<u64> {
    t.checked_add(dt).ok_or(FarmError::ArithmeticOverflow)
}

/// Saturating sum used by invariant checks
pub fn sum_u128<I: IntoIterator<Item = u128>>(values: I) -> u128 {
    values.into_iter().fold(0u128, |acc, v| acc.saturating_add(v))
}

/// Minimum of two u128
pub fn min_u128(a: u128, b: u128) -> u128 {
    if a < b { a } else { b }
}
