//! Execution Port
//!
//! Sells a token's whole balance as one unit (approve, then router sell) and
//! reports which step failed when it does not complete.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use thiserror::Error;

use super::chain::{ChainError, TxConfirmation};

/// A failed step of the approve-then-sell sequence
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Balance read failed: {0}")]
    Balance(#[source] ChainError),
    #[error("Sell quote failed: {0}")]
    Quote(#[source] ChainError),
    #[error("Nonce read failed: {0}")]
    Nonce(#[source] ChainError),
    #[error("Approval failed: {0}")]
    Approval(#[source] ChainError),
    #[error("Sell transaction failed: {0}")]
    Sell(#[source] ChainError),
}

/// Parameters decided before any transaction is submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellPlan {
    pub token: Address,
    pub router: Address,
    pub amount_in: U256,
    pub quoted_out: U256,
    pub min_out: U256,
    pub deadline: u64,
}

/// Both confirmed transactions of a completed sell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellReceipt {
    pub plan: SellPlan,
    pub approval: TxConfirmation,
    pub sale: TxConfirmation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellOutcome {
    /// Approval and sell both confirmed
    Sold(SellReceipt),
    /// Wallet holds none of the token; nothing submitted
    NothingToSell,
    /// Paper mode: plan computed, nothing submitted
    Simulated(SellPlan),
}

#[async_trait]
pub trait SellExecution: Send + Sync {
    /// Sell the wallet's full balance of `token`
    async fn sell_all(&self, token: Address) -> Result<SellOutcome, ExecutionError>;
}
