//! Market Snapshot
//!
//! Per-cycle, per-token view derived from a lens quote: unit price in the base
//! asset, market cap and owned value in USD.

use std::fmt;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;

use super::fixed_point::{to_decimal, FixedPointError};

/// Snapshot of one monitored token for one poll cycle
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    /// Display symbol (e.g. "TCG")
    pub symbol: String,
    /// Token contract address
    pub token: Address,
    /// Price of one token in base-asset units (0 when the pool quotes nothing)
    pub base_per_token: Decimal,
    /// Raw 18-decimal total supply
    pub total_supply: U256,
    /// Raw 18-decimal wallet balance
    pub balance: U256,
    /// base_per_token x supply x reference price
    pub market_cap_usd: Decimal,
    /// base_per_token x balance x reference price
    pub owned_value_usd: Decimal,
}

impl MarketSnapshot {
    /// True when the pool returned a zero quote
    pub fn is_unpriced(&self) -> bool {
        self.base_per_token.is_zero()
    }

    /// Whether the market cap meets or exceeds a threshold
    pub fn meets(&self, threshold_usd: Decimal) -> bool {
        self.market_cap_usd >= threshold_usd
    }
}

impl fmt::Display for MarketSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<6}  market cap: {:>16}  |  owned: {:>14}",
            self.symbol,
            format_usd(self.market_cap_usd),
            format_usd(self.owned_value_usd)
        )
    }
}

/// USD value of a raw token amount at a given unit price and reference price
pub fn usd_value(
    base_per_token: Decimal,
    raw_amount: U256,
    reference_usd: Decimal,
) -> Result<Decimal, FixedPointError> {
    let amount = to_decimal(raw_amount)?;

    base_per_token
        .checked_mul(amount)
        .and_then(|base| base.checked_mul(reference_usd))
        .ok_or(FixedPointError::Overflow("USD value"))
}

/// Format a USD amount as `$1,234,567.89`
pub fn format_usd(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}.{}", sign, grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixed_point::{base_per_token, units, ONE_UNIT};
    use rust_decimal_macros::dec;

    fn snapshot(market_cap: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "TCG".to_string(),
            token: Address::ZERO,
            base_per_token: dec!(0.001),
            total_supply: units(1_000_000),
            balance: U256::ZERO,
            market_cap_usd: market_cap,
            owned_value_usd: Decimal::ZERO,
        }
    }

    #[test]
    fn test_market_cap_reference_scenario() {
        // 1000 tokens per base unit, 1M supply, base asset at $125.40
        let price = base_per_token(units(1000), ONE_UNIT).unwrap();
        let cap = usd_value(price, units(1_000_000), dec!(125.40)).unwrap();

        assert_eq!(cap, dec!(125400));
        assert!(!snapshot(cap).meets(dec!(900000)));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(snapshot(dec!(900000)).meets(dec!(900000)));
        assert!(snapshot(dec!(900000.01)).meets(dec!(900000)));
        assert!(!snapshot(dec!(899999.99)).meets(dec!(900000)));
    }

    #[test]
    fn test_owned_value_uses_same_price() {
        let value = usd_value(dec!(0.001), units(2500), dec!(2)).unwrap();
        assert_eq!(value, dec!(5));
    }

    #[test]
    fn test_zero_price_gives_zero_value() {
        let value = usd_value(Decimal::ZERO, units(1_000_000), dec!(125.40)).unwrap();
        assert!(value.is_zero());
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(dec!(125400)), "$125,400.00");
        assert_eq!(format_usd(dec!(1234567.891)), "$1,234,567.89");
        assert_eq!(format_usd(dec!(999.5)), "$999.50");
        assert_eq!(format_usd(dec!(0)), "$0.00");
        assert_eq!(format_usd(dec!(-1500)), "-$1,500.00");
    }

    #[test]
    fn test_snapshot_display() {
        let line = snapshot(dec!(125400)).to_string();
        assert!(line.starts_with("TCG "));
        assert!(line.contains("$125,400.00"));
        assert!(line.contains("owned:"));
    }
}
