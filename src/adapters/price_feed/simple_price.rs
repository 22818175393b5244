use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;

use super::{check_status, http_client, DEFAULT_HTTP_TIMEOUT};
use crate::ports::{PriceFeed, PriceFeedError};

pub const COINGECKO_SIMPLE_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Aggregator simple price: `GET {url}?ids=monad&vs_currencies=usd`
#[derive(Debug, Clone)]
pub struct SimplePriceClient {
    http: Client,
    url: String,
    asset_id: String,
}

impl SimplePriceClient {
    pub fn new(url: impl Into<String>, asset_id: impl Into<String>) -> Result<Self, PriceFeedError> {
        Self::with_timeout(url, asset_id, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(
        url: impl Into<String>,
        asset_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PriceFeedError> {
        Ok(Self {
            http: http_client(timeout)?,
            url: url.into(),
            asset_id: asset_id.into(),
        })
    }
}

type SimplePriceResponse = HashMap<String, HashMap<String, Decimal>>;

fn parse_simple_price(body: &str, asset_id: &str) -> Result<Decimal, PriceFeedError> {
    let response: SimplePriceResponse =
        serde_json::from_str(body).map_err(|e| PriceFeedError::Parse(e.to_string()))?;

    response
        .get(asset_id)
        .and_then(|prices| prices.get("usd"))
        .copied()
        .ok_or_else(|| PriceFeedError::MissingAsset(asset_id.to_string()))
}

#[async_trait]
impl PriceFeed for SimplePriceClient {
    fn name(&self) -> String {
        format!("simple-price:{}", self.asset_id)
    }

    async fn fetch_usd_price(&self) -> Result<Decimal, PriceFeedError> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("ids", self.asset_id.as_str()), ("vs_currencies", "usd")])
            .send()
            .await?;
        let body = check_status(response)?.text().await?;
        let price = parse_simple_price(&body, &self.asset_id)?;

        tracing::debug!("{} returned {}", self.name(), price);
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_simple_price() {
        let body = r#"{"monad":{"usd":125.4}}"#;
        assert_eq!(parse_simple_price(body, "monad").unwrap(), dec!(125.4));
    }

    #[test]
    fn test_parse_integer_price() {
        let body = r#"{"monad":{"usd":2}}"#;
        assert_eq!(parse_simple_price(body, "monad").unwrap(), dec!(2));
    }

    #[test]
    fn test_missing_asset() {
        assert!(matches!(
            parse_simple_price("{}", "monad"),
            Err(PriceFeedError::MissingAsset(id)) if id == "monad"
        ));
        assert!(matches!(
            parse_simple_price(r#"{"monad":{"eur":1.0}}"#, "monad"),
            Err(PriceFeedError::MissingAsset(_))
        ));
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            parse_simple_price("<html>rate limited</html>", "monad"),
            Err(PriceFeedError::Parse(_))
        ));
    }
}
