//! Slippage Tolerance
//!
//! Minimum acceptable output for a quoted swap, floored so the bot never
//! promises more than the quote.

use alloy::primitives::U256;

/// Basis-point denominator (100% = 10_000)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Default tolerance: 5%
pub const DEFAULT_SLIPPAGE_BPS: u32 = 500;

/// floor(quoted * (10_000 - slippage_bps) / 10_000)
///
/// With the default 500 bps this equals `quoted * 95 / 100` floored.
pub fn min_amount_out(quoted: U256, slippage_bps: u32) -> U256 {
    let keep = U256::from(BPS_DENOMINATOR - slippage_bps.min(BPS_DENOMINATOR));
    let denominator = U256::from(BPS_DENOMINATOR);

    match quoted.checked_mul(keep) {
        Some(scaled) => scaled / denominator,
        // Only reachable for quotes near U256::MAX; dividing first still floors
        None => quoted / denominator * keep,
    }
}
