//! Application Layer - Use cases built on the ports
//!
//! - `price_cache`: reference price with TTL and source fallback
//! - `market_reader`: lens quote to market cap snapshot
//! - `sell_executor`: approve-then-sell of a whole balance
//! - `controller`: polling loop, trigger evaluation and retries

pub mod controller;
pub mod market_reader;
pub mod price_cache;
pub mod sell_executor;

pub use controller::{
    CycleReport, MonitorState, MonitoredToken, SaleReport, SaleResult, StopHandle,
    TriggerController, DEFAULT_POLL_INTERVAL,
};
pub use market_reader::{MarketDataReader, QuoteError};
pub use price_cache::{
    Freshness, PriceReading, ReferencePrice, ReferencePriceCache, DEFAULT_PRICE_TTL,
};
pub use sell_executor::{SellExecutor, DEFAULT_DEADLINE_WINDOW};
