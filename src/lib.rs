//! capwatch - Market-cap trigger bot for EVM lens markets
//!
//! Polls a price lens for a fixed set of tokens, converts quotes to USD
//! market caps with an external reference price, and sells a token's whole
//! balance once its market cap crosses a configured threshold.
//!
//! # Modules
//!
//! - `domain`: Fixed-point conversion, market math, sell state machine, slippage
//! - `ports`: Trait abstractions (PriceFeed, ChainPort, SellExecution)
//! - `adapters`: External implementations (price feeds, EVM chain, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Price cache, market reader, sell executor, trigger controller

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
