//! Sell Executor
//!
//! Sells the wallet's whole balance of one token through the lens-selected
//! router. Strictly sequential: balance, sell quote, approve (confirmed),
//! fresh nonce, sell (confirmed). Any failed step aborts the sequence; the
//! controller owns retries.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::domain::{min_amount_out, to_decimal, DEFAULT_SLIPPAGE_BPS};
use crate::ports::{
    ChainPort, ExecutionError, QuoteSide, SellExecution, SellOrder, SellOutcome, SellPlan,
    SellReceipt,
};

/// How long the router accepts the sell after submission
pub const DEFAULT_DEADLINE_WINDOW: Duration = Duration::from_secs(300);

pub struct SellExecutor {
    chain: Arc<dyn ChainPort>,
    slippage_bps: u32,
    deadline_window: Duration,
    paper_mode: bool,
}

impl SellExecutor {
    pub fn new(chain: Arc<dyn ChainPort>) -> Self {
        Self {
            chain,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            deadline_window: DEFAULT_DEADLINE_WINDOW,
            paper_mode: false,
        }
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u32) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    pub fn with_deadline_window(mut self, window: Duration) -> Self {
        self.deadline_window = window;
        self
    }

    /// Compute the plan but submit nothing
    pub fn with_paper_mode(mut self, paper_mode: bool) -> Self {
        self.paper_mode = paper_mode;
        self
    }

    pub fn is_paper(&self) -> bool {
        self.paper_mode
    }

    fn deadline(&self) -> u64 {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        now.saturating_add(self.deadline_window.as_secs())
    }

    /// Steps 1-3: balance, sell quote, minimum output.
    /// Returns None when the wallet holds none of the token.
    async fn plan(&self, token: Address) -> Result<Option<SellPlan>, ExecutionError> {
        let wallet = self.chain.wallet_address();
        let balance = self
            .chain
            .balance_of(token, wallet)
            .await
            .map_err(ExecutionError::Balance)?;

        if balance.is_zero() {
            return Ok(None);
        }

        let quote = self
            .chain
            .lens_quote(token, balance, QuoteSide::Sell)
            .await
            .map_err(ExecutionError::Quote)?;

        Ok(Some(SellPlan {
            token,
            router: quote.router,
            amount_in: balance,
            quoted_out: quote.amount_out,
            min_out: min_amount_out(quote.amount_out, self.slippage_bps),
            deadline: self.deadline(),
        }))
    }
}

#[async_trait]
impl SellExecution for SellExecutor {
    async fn sell_all(&self, token: Address) -> Result<SellOutcome, ExecutionError> {
        let mut plan = match self.plan(token).await? {
            Some(plan) => plan,
            None => {
                tracing::info!("Balance of {} is zero, nothing to sell", token);
                return Ok(SellOutcome::NothingToSell);
            }
        };

        tracing::info!(
            "Selling {} tokens of {} via router {} (quoted {} base, min {} base)",
            display_amount(plan.amount_in),
            token,
            plan.router,
            display_amount(plan.quoted_out),
            display_amount(plan.min_out)
        );

        if self.paper_mode {
            tracing::info!("[PAPER] Skipping approve and sell transactions for {}", token);
            return Ok(SellOutcome::Simulated(plan));
        }

        let nonce = self
            .chain
            .transaction_count()
            .await
            .map_err(ExecutionError::Nonce)?;
        tracing::info!("Approving router {} (nonce {})", plan.router, nonce);
        let approval = self
            .chain
            .approve(token, plan.router, plan.amount_in, nonce)
            .await
            .map_err(ExecutionError::Approval)?;
        tracing::info!("Approval confirmed: {}", approval.tx_hash);

        // The approval consumed the previous nonce
        let nonce = self
            .chain
            .transaction_count()
            .await
            .map_err(ExecutionError::Nonce)?;

        // The approval wait may have eaten into the planned window
        plan.deadline = self.deadline();
        let order = SellOrder {
            amount_in: plan.amount_in,
            amount_out_min: plan.min_out,
            token,
            to: self.chain.wallet_address(),
            deadline: plan.deadline,
        };
        tracing::info!("Submitting sell (nonce {}, deadline {})", nonce, order.deadline);
        let sale = self
            .chain
            .sell(plan.router, &order, nonce)
            .await
            .map_err(ExecutionError::Sell)?;
        tracing::info!("Sell confirmed: {}", sale.tx_hash);

        Ok(SellOutcome::Sold(SellReceipt {
            plan,
            approval,
            sale,
        }))
    }
}

fn display_amount(raw: alloy::primitives::U256) -> String {
    to_decimal(raw)
        .map(|d| d.normalize().to_string())
        .unwrap_or_else(|_| format!("{} wei", raw))
}
