//! Domain Layer - Core trigger logic for capwatch
//!
//! Pure types and arithmetic with no I/O. All external interactions happen
//! through the ports layer.
//!
//! - `fixed_point`: 18-decimal on-chain integers to `Decimal`
//! - `market`: market cap / owned value math and `MarketSnapshot`
//! - `sell_state`: per-token sell state machine and retry policy
//! - `slippage`: minimum acceptable output for a quoted sell

pub mod fixed_point;
pub mod market;
pub mod sell_state;
pub mod slippage;

pub use fixed_point::{base_per_token, to_decimal, FixedPointError, CHAIN_DECIMALS, ONE_UNIT};
pub use market::{format_usd, usd_value, MarketSnapshot};
pub use sell_state::{RetryPolicy, SellState, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
pub use slippage::{min_amount_out, BPS_DENOMINATOR, DEFAULT_SLIPPAGE_BPS};
