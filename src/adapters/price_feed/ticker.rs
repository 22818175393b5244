use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{check_status, http_client, DEFAULT_HTTP_TIMEOUT};
use crate::ports::{PriceFeed, PriceFeedError};

pub const BINANCE_TICKER_URL: &str = "https://api.binance.com/api/v3/ticker/price";

/// Exchange ticker: `GET {url}?symbol=MONUSDT`
#[derive(Debug, Clone)]
pub struct TickerPriceClient {
    http: Client,
    url: String,
    symbol: String,
}

impl TickerPriceClient {
    pub fn new(url: impl Into<String>, symbol: impl Into<String>) -> Result<Self, PriceFeedError> {
        Self::with_timeout(url, symbol, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(
        url: impl Into<String>,
        symbol: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PriceFeedError> {
        Ok(Self {
            http: http_client(timeout)?,
            url: url.into(),
            symbol: symbol.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: String,
}

fn parse_ticker(body: &str) -> Result<Decimal, PriceFeedError> {
    let ticker: TickerResponse =
        serde_json::from_str(body).map_err(|e| PriceFeedError::Parse(e.to_string()))?;
    Decimal::from_str(ticker.price.trim())
        .map_err(|e| PriceFeedError::Parse(format!("price {:?}: {}", ticker.price, e)))
}

#[async_trait]
impl PriceFeed for TickerPriceClient {
    fn name(&self) -> String {
        format!("ticker:{}", self.symbol)
    }

    async fn fetch_usd_price(&self) -> Result<Decimal, PriceFeedError> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("symbol", self.symbol.as_str())])
            .send()
            .await?;
        let body = check_status(response)?.text().await?;
        let price = parse_ticker(&body)?;

        tracing::debug!("{} returned {}", self.name(), price);
        Ok(price)
    }
}
