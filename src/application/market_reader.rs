//! Market Data Reader
//!
//! Turns a lens buy quote plus ERC-20 supply/balance into a `MarketSnapshot`.
//! Errors are returned to the caller untouched; nothing is retried here.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{base_per_token, usd_value, FixedPointError, MarketSnapshot, ONE_UNIT};
use crate::ports::{ChainError, ChainPort, QuoteSide};

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("Lens quote failed: {0}")]
    Lens(#[source] ChainError),

    #[error("totalSupply call failed: {0}")]
    TotalSupply(#[source] ChainError),

    #[error("balanceOf call failed: {0}")]
    Balance(#[source] ChainError),

    #[error("Amount conversion failed: {0}")]
    OutOfRange(#[from] FixedPointError),
}

pub struct MarketDataReader {
    chain: Arc<dyn ChainPort>,
    /// Base-asset amount quoted to derive the unit price
    probe_amount: U256,
}

impl MarketDataReader {
    /// Reader probing with one whole base-asset unit
    pub fn new(chain: Arc<dyn ChainPort>) -> Self {
        Self {
            chain,
            probe_amount: ONE_UNIT,
        }
    }

    pub fn with_probe_amount(mut self, probe_amount: U256) -> Self {
        self.probe_amount = probe_amount;
        self
    }

    pub fn probe_amount(&self) -> U256 {
        self.probe_amount
    }

    /// Read the token's market cap and the wallet's holding in USD
    pub async fn read_market_data(
        &self,
        symbol: &str,
        token: Address,
        reference_usd: Decimal,
    ) -> Result<MarketSnapshot, QuoteError> {
        let quote = self
            .chain
            .lens_quote(token, self.probe_amount, QuoteSide::Buy)
            .await
            .map_err(QuoteError::Lens)?;

        let price = base_per_token(quote.amount_out, self.probe_amount)?;
        if price.is_zero() {
            tracing::debug!("{} lens quote is zero, treating price as unavailable", symbol);
        }

        let total_supply = self
            .chain
            .total_supply(token)
            .await
            .map_err(QuoteError::TotalSupply)?;
        let market_cap_usd = usd_value(price, total_supply, reference_usd)?;

        let balance = self
            .chain
            .balance_of(token, self.chain.wallet_address())
            .await
            .map_err(QuoteError::Balance)?;
        let owned_value_usd = usd_value(price, balance, reference_usd)?;

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            token,
            base_per_token: price,
            total_supply,
            balance,
            market_cap_usd,
            owned_value_usd,
        })
    }
}
