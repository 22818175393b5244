//! EVM chain adapter
//!
//! alloy-backed implementation of `ChainPort`:
//! - `bindings`: `sol!` interfaces for the lens, ERC-20 and router
//! - `wallet`: private-key loading
//! - `client`: `EvmChain` (reads, approve/sell with confirmation) and the
//!   startup connectivity check

pub mod bindings;
mod client;
mod wallet;

pub use client::{ConnectivityError, EvmChain, EvmChainConfig};
pub use wallet::{WalletError, WalletManager, PRIVATE_KEY_ENV};
