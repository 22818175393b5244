//! Reference Price Port
//!
//! A reference price source returns the USD price of the chain's base asset.
//! Sources are interchangeable; the price cache decides the order.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No price for asset: {0}")]
    MissingAsset(String),

    #[error("Non-positive price: {0}")]
    NonPositive(Decimal),

    #[error("All reference price sources failed (primary: {primary}; secondary: {secondary})")]
    AllSourcesFailed { primary: String, secondary: String },
}

/// Source of the base asset's USD price
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> String;

    /// Fetch the current USD price. Implementations bound the call with a timeout.
    async fn fetch_usd_price(&self) -> Result<Decimal, PriceFeedError>;
}
