//! Fixed-Point Amounts
//!
//! On-chain amounts are unsigned integers scaled by 10^18. They stay `U256`
//! through every contract call and are converted to `Decimal` only when a
//! price or USD figure is produced.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use thiserror::Error;

/// Decimals of the chain's native fixed-point convention
pub const CHAIN_DECIMALS: u32 = 18;

/// One whole unit (10^18 base units)
pub const ONE_UNIT: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FixedPointError {
    #[error("Amount {0} does not fit in a decimal")]
    OutOfRange(U256),

    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

/// Convert a raw 18-decimal amount into whole units.
///
/// Splits into integer and fractional parts first so that amounts above the
/// 96-bit decimal mantissa still convert as long as the whole part fits.
pub fn to_decimal(raw: U256) -> Result<Decimal, FixedPointError> {
    let whole = raw / ONE_UNIT;
    let frac = raw % ONE_UNIT;

    let whole: i128 = whole
        .try_into()
        .map_err(|_| FixedPointError::OutOfRange(raw))?;
    let whole = Decimal::try_from_i128_with_scale(whole, 0)
        .map_err(|_| FixedPointError::OutOfRange(raw))?;

    // frac < 10^18 always fits the low limb
    let frac = Decimal::new(frac.as_limbs()[0] as i64, CHAIN_DECIMALS);

    whole
        .checked_add(frac)
        .ok_or(FixedPointError::OutOfRange(raw))
}

/// Price of one token in base-asset units, from a buy quote.
///
/// `amount_out` tokens were quoted for `probe_amount` of the base asset. A zero
/// quote (illiquid or drained pool) yields a price of zero rather than an error.
pub fn base_per_token(amount_out: U256, probe_amount: U256) -> Result<Decimal, FixedPointError> {
    if amount_out.is_zero() {
        return Ok(Decimal::ZERO);
    }

    let tokens = to_decimal(amount_out)?;
    let probe = to_decimal(probe_amount)?;

    probe
        .checked_div(tokens)
        .ok_or(FixedPointError::Overflow("base-per-token price"))
}

/// Build a raw 18-decimal amount from whole units (tests and fixtures)
pub fn units(whole: u64) -> U256 {
    U256::from(whole) * ONE_UNIT
}
