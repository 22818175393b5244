//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Price feed: REST clients for the base asset's USD price
//! - EVM: alloy provider, contract bindings and wallet
//! - CLI: Command-line interface definitions

pub mod cli;
pub mod evm;
pub mod price_feed;

pub use cli::CliApp;
pub use evm::{EvmChain, EvmChainConfig, WalletManager};
pub use price_feed::{SimplePriceClient, TickerPriceClient};
