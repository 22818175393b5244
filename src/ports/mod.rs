//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Reference price feeds (base asset in USD)
//! - The EVM chain (lens quotes, ERC-20 reads, approve/sell transactions)
//! - Sell execution (the approve-then-sell sequence as one unit)

pub mod chain;
pub mod execution;
pub mod mocks;
pub mod price_feed;

pub use chain::{ChainError, ChainPort, LensQuote, QuoteSide, SellOrder, TxConfirmation};
pub use execution::{ExecutionError, SellExecution, SellOutcome, SellPlan, SellReceipt};
pub use price_feed::{PriceFeed, PriceFeedError};
