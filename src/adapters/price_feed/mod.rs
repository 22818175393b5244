//! Reference price adapters
//!
//! REST clients for the base asset's USD price:
//! - `TickerPriceClient`: exchange ticker endpoint (`{"price": "125.40"}`)
//! - `SimplePriceClient`: aggregator simple-price endpoint (`{"monad": {"usd": 125.4}}`)

mod simple_price;
mod ticker;

pub use simple_price::{SimplePriceClient, COINGECKO_SIMPLE_PRICE_URL};
pub use ticker::{TickerPriceClient, BINANCE_TICKER_URL};

use std::time::Duration;

use reqwest::Client;

use crate::ports::PriceFeedError;

/// Default per-request timeout
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// User-Agent sent with every request
pub const USER_AGENT: &str = concat!("capwatch/", env!("CARGO_PKG_VERSION"));

fn http_client(timeout: Duration) -> Result<Client, PriceFeedError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Fail on non-2xx before trying to decode the body
fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PriceFeedError> {
    let status = response.status();
    if !status.is_success() {
        return Err(PriceFeedError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> reqwest::Response {
        http::Response::builder()
            .status(status)
            .body("{}")
            .unwrap()
            .into()
    }

    #[test]
    fn test_check_status_rejects_server_error() {
        let err = check_status(response(500)).unwrap_err();
        assert!(matches!(err, PriceFeedError::Status { status: 500, .. }));
    }

    #[test]
    fn test_check_status_passes_success() {
        let ok = check_status(response(200)).unwrap();
        assert_eq!(ok.status().as_u16(), 200);
    }
}
