//! # Fixed-Point Arithmetic
//!
//! Amounts are `u64` in smallest-unit denomination. Every product is taken
//! in `u128` and every quotient goes through [`mul_div`] with an explicit
//! [`Rounding`]. There is no other division in the fee and conversion paths,
//! which keeps rounding direction auditable in one place.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Arithmetic failures. Overflow is the only failure mode because every
/// denominator in the protocol is padded away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    /// An intermediate or final value does not fit its type.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// A division by zero was attempted.
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),
}

/// Direction in which a quotient is rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rounding {
    /// Toward zero.
    Floor,
    /// Away from zero whenever there is a remainder.
    Ceil,
}

/// Computes `x * y / denominator` in `u128`, rounded as requested.
pub fn mul_div_u128(
    x: u128,
    y: u128,
    denominator: u128,
    rounding: Rounding,
    context: &'static str,
) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero(context));
    }

    let product = x.checked_mul(y).ok_or(MathError::Overflow(context))?;
    let quotient = product / denominator;

    match rounding {
        Rounding::Ceil if product % denominator != 0 => quotient
            .checked_add(1)
            .ok_or(MathError::Overflow(context)),
        _ => Ok(quotient),
    }
}

/// Computes `x * y / denominator` and narrows the result back to `u64`.
pub fn mul_div(
    x: u64,
    y: u128,
    denominator: u128,
    rounding: Rounding,
    context: &'static str,
) -> Result<u64, MathError> {
    let wide = mul_div_u128(u128::from(x), y, denominator, rounding, context)?;
    narrow(wide, context)
}

/// Checked `u128 -> u64` conversion.
pub fn narrow(value: u128, context: &'static str) -> Result<u64, MathError> {
    u64::try_from(value).map_err(|_| MathError::Overflow(context))
}

/// Checked sum of several `u64` amounts.
pub fn checked_sum(values: &[u64], context: &'static str) -> Result<u64, MathError> {
    values.iter().try_fold(0u64, |acc, v| {
        acc.checked_add(*v).ok_or(MathError::Overflow(context))
    })
}
