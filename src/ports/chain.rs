//! Chain Port
//!
//! The slice of an EVM node the bot needs: lens quotes, ERC-20 reads, the
//! wallet nonce, and submit-and-confirm for `approve` and router `sell`.
//! Every amount is a raw 18-decimal `U256`.

use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("Timed out after {timeout:?} waiting for {operation}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Transaction {0} reverted")]
    Reverted(B256),

    #[error("Signer error: {0}")]
    Signer(String),
}

/// Direction of a lens quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteSide {
    /// Base asset in, token out
    Buy,
    /// Token in, base asset out
    Sell,
}

impl QuoteSide {
    pub fn is_buy(self) -> bool {
        matches!(self, QuoteSide::Buy)
    }
}

/// Lens answer for a hypothetical trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LensQuote {
    /// Router that would execute the trade
    pub router: Address,
    /// Expected output amount
    pub amount_out: U256,
}

/// Arguments of the router's `sell` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellOrder {
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub token: Address,
    pub to: Address,
    /// Unix timestamp after which the router rejects the trade
    pub deadline: u64,
}

/// A mined, successful transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxConfirmation {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait ChainPort: Send + Sync {
    /// Address of the signing wallet
    fn wallet_address(&self) -> Address;

    /// Lens `getAmountOut(token, amountIn, isBuy)`
    async fn lens_quote(
        &self,
        token: Address,
        amount_in: U256,
        side: QuoteSide,
    ) -> Result<LensQuote, ChainError>;

    /// ERC-20 `totalSupply()`
    async fn total_supply(&self, token: Address) -> Result<U256, ChainError>;

    /// ERC-20 `balanceOf(owner)`
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    /// Current transaction count of the wallet, read from the node
    async fn transaction_count(&self) -> Result<u64, ChainError>;

    /// Submit `approve(spender, amount)` and wait until it is mined.
    /// A reverted receipt is an error.
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
        nonce: u64,
    ) -> Result<TxConfirmation, ChainError>;

    /// Submit router `sell(order)` and wait until it is mined.
    /// A reverted receipt is an error.
    async fn sell(
        &self,
        router: Address,
        order: &SellOrder,
        nonce: u64,
    ) -> Result<TxConfirmation, ChainError>;
}
