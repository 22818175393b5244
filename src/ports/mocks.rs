//! Scripted in-memory ports
//!
//! Deterministic stand-ins for the price feeds, the chain and the sell
//! executor. They record every call so tests can assert on what the bot did.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::time::Instant;

use super::chain::{ChainError, ChainPort, LensQuote, QuoteSide, SellOrder, TxConfirmation};
use super::execution::{ExecutionError, SellExecution, SellOutcome, SellPlan, SellReceipt};
use super::price_feed::{PriceFeed, PriceFeedError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn tx_hash(n: u64) -> B256 {
    B256::left_padding_from(&n.to_be_bytes())
}

// ============================================================================
// Price feed
// ============================================================================

#[derive(Debug, Default)]
struct FeedScript {
    queue: VecDeque<Result<Decimal, String>>,
    last: Option<Result<Decimal, String>>,
    calls: u32,
}

/// Price feed that replays queued responses, then repeats the last one
#[derive(Debug)]
pub struct ScriptedPriceFeed {
    name: &'static str,
    script: Mutex<FeedScript>,
}

impl ScriptedPriceFeed {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            script: Mutex::new(FeedScript::default()),
        }
    }

    /// Feed that always answers `price`
    pub fn fixed(name: &'static str, price: Decimal) -> Self {
        Self::new(name).then_price(price)
    }

    /// Feed that always fails
    pub fn failing(name: &'static str) -> Self {
        Self::new(name).then_error("source unavailable")
    }

    /// Queue a successful response
    pub fn then_price(self, price: Decimal) -> Self {
        lock(&self.script).queue.push_back(Ok(price));
        self
    }

    /// Queue a failed response
    pub fn then_error(self, message: &str) -> Self {
        lock(&self.script).queue.push_back(Err(message.to_string()));
        self
    }

    /// Number of fetches so far
    pub fn calls(&self) -> u32 {
        lock(&self.script).calls
    }
}

#[async_trait]
impl PriceFeed for ScriptedPriceFeed {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn fetch_usd_price(&self) -> Result<Decimal, PriceFeedError> {
        let mut script = lock(&self.script);
        script.calls += 1;

        let response = match script.queue.pop_front() {
            Some(response) => {
                script.last = Some(response.clone());
                response
            }
            None => script
                .last
                .clone()
                .unwrap_or_else(|| Err("no response configured".to_string())),
        };

        response.map_err(PriceFeedError::Parse)
    }
}

// ============================================================================
// Chain
// ============================================================================

/// A call made against [`ScriptedChain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    LensQuote {
        token: Address,
        amount_in: U256,
        side: QuoteSide,
    },
    TotalSupply(Address),
    BalanceOf(Address),
    TransactionCount,
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
        nonce: u64,
    },
    Sell {
        router: Address,
        order: SellOrder,
        nonce: u64,
    },
}

#[derive(Debug, Default)]
struct ChainScript {
    buy_quotes: HashMap<Address, U256>,
    sell_quotes: HashMap<Address, LensQuote>,
    supplies: HashMap<Address, U256>,
    balances: HashMap<Address, U256>,
    failing_tokens: HashSet<Address>,
    approval_failures: u32,
    sell_failures: u32,
    nonce: u64,
    mined: u64,
    calls: Vec<ChainCall>,
}

impl ChainScript {
    /// Mine the next transaction: consumes a nonce whether or not it reverts
    fn mine(&mut self) -> TxConfirmation {
        self.nonce += 1;
        self.mined += 1;
        TxConfirmation {
            tx_hash: tx_hash(self.mined),
            block_number: Some(1_000 + self.mined),
        }
    }

    fn check_reads(&self, token: Address) -> Result<(), ChainError> {
        if self.failing_tokens.contains(&token) {
            return Err(ChainError::Rpc("execution reverted".to_string()));
        }
        Ok(())
    }
}

/// In-memory chain with a single wallet
#[derive(Debug)]
pub struct ScriptedChain {
    wallet: Address,
    script: Mutex<ChainScript>,
}

impl ScriptedChain {
    pub fn new(wallet: Address) -> Self {
        Self {
            wallet,
            script: Mutex::new(ChainScript::default()),
        }
    }

    /// Tokens returned by a buy quote (any probe size)
    pub fn with_buy_quote(self, token: Address, amount_out: U256) -> Self {
        self.set_buy_quote(token, amount_out);
        self
    }

    /// Router and base-asset output returned by a sell quote
    pub fn with_sell_quote(self, token: Address, router: Address, amount_out: U256) -> Self {
        lock(&self.script)
            .sell_quotes
            .insert(token, LensQuote { router, amount_out });
        self
    }

    pub fn with_supply(self, token: Address, supply: U256) -> Self {
        lock(&self.script).supplies.insert(token, supply);
        self
    }

    pub fn with_balance(self, token: Address, balance: U256) -> Self {
        lock(&self.script).balances.insert(token, balance);
        self
    }

    /// Starting wallet nonce
    pub fn with_nonce(self, nonce: u64) -> Self {
        lock(&self.script).nonce = nonce;
        self
    }

    /// The next `count` approvals revert
    pub fn with_approval_failures(self, count: u32) -> Self {
        lock(&self.script).approval_failures = count;
        self
    }

    /// The next `count` sells revert
    pub fn with_sell_failures(self, count: u32) -> Self {
        lock(&self.script).sell_failures = count;
        self
    }

    /// Every read for `token` fails
    pub fn with_failing_reads(self, token: Address) -> Self {
        self.set_failing_reads(token, true);
        self
    }

    pub fn set_buy_quote(&self, token: Address, amount_out: U256) {
        lock(&self.script).buy_quotes.insert(token, amount_out);
    }

    pub fn set_failing_reads(&self, token: Address, failing: bool) {
        let mut script = lock(&self.script);
        if failing {
            script.failing_tokens.insert(token);
        } else {
            script.failing_tokens.remove(&token);
        }
    }

    pub fn balance(&self, token: Address) -> U256 {
        lock(&self.script).balances.get(&token).copied().unwrap_or_default()
    }

    pub fn nonce(&self) -> u64 {
        lock(&self.script).nonce
    }

    /// Every call in order
    pub fn calls(&self) -> Vec<ChainCall> {
        lock(&self.script).calls.clone()
    }

    /// Only the state-changing calls
    pub fn submitted(&self) -> Vec<ChainCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, ChainCall::Approve { .. } | ChainCall::Sell { .. }))
            .collect()
    }
}

#[async_trait]
impl ChainPort for ScriptedChain {
    fn wallet_address(&self) -> Address {
        self.wallet
    }

    async fn lens_quote(
        &self,
        token: Address,
        amount_in: U256,
        side: QuoteSide,
    ) -> Result<LensQuote, ChainError> {
        let mut script = lock(&self.script);
        script.calls.push(ChainCall::LensQuote { token, amount_in, side });
        script.check_reads(token)?;

        match side {
            QuoteSide::Buy => {
                let router = script
                    .sell_quotes
                    .get(&token)
                    .map(|quote| quote.router)
                    .unwrap_or_default();
                let amount_out = script.buy_quotes.get(&token).copied().unwrap_or_default();
                Ok(LensQuote { router, amount_out })
            }
            QuoteSide::Sell => script
                .sell_quotes
                .get(&token)
                .copied()
                .ok_or_else(|| ChainError::Rpc("no route for token".to_string())),
        }
    }

    async fn total_supply(&self, token: Address) -> Result<U256, ChainError> {
        let mut script = lock(&self.script);
        script.calls.push(ChainCall::TotalSupply(token));
        script.check_reads(token)?;
        Ok(script.supplies.get(&token).copied().unwrap_or_default())
    }

    async fn balance_of(&self, token: Address, _owner: Address) -> Result<U256, ChainError> {
        let mut script = lock(&self.script);
        script.calls.push(ChainCall::BalanceOf(token));
        script.check_reads(token)?;
        Ok(script.balances.get(&token).copied().unwrap_or_default())
    }

    async fn transaction_count(&self) -> Result<u64, ChainError> {
        let mut script = lock(&self.script);
        script.calls.push(ChainCall::TransactionCount);
        Ok(script.nonce)
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
        nonce: u64,
    ) -> Result<TxConfirmation, ChainError> {
        let mut script = lock(&self.script);
        script.calls.push(ChainCall::Approve { token, spender, amount, nonce });

        let confirmation = script.mine();
        if script.approval_failures > 0 {
            script.approval_failures -= 1;
            return Err(ChainError::Reverted(confirmation.tx_hash));
        }
        Ok(confirmation)
    }

    async fn sell(
        &self,
        router: Address,
        order: &SellOrder,
        nonce: u64,
    ) -> Result<TxConfirmation, ChainError> {
        let mut script = lock(&self.script);
        script.calls.push(ChainCall::Sell {
            router,
            order: order.clone(),
            nonce,
        });

        let confirmation = script.mine();
        if script.sell_failures > 0 {
            script.sell_failures -= 1;
            return Err(ChainError::Reverted(confirmation.tx_hash));
        }

        let remaining = script
            .balances
            .get(&order.token)
            .copied()
            .unwrap_or_default()
            .saturating_sub(order.amount_in);
        script.balances.insert(order.token, remaining);
        Ok(confirmation)
    }
}

// ============================================================================
// Sell executor
// ============================================================================

/// Result to play back for one `sell_all` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedSale {
    Sold,
    NothingToSell,
    Fail(String),
}

#[derive(Debug, Default)]
struct SellerScript {
    queue: VecDeque<ScriptedSale>,
    invocations: Vec<(Address, Instant)>,
}

/// Sell executor that plays back queued outcomes, then succeeds
#[derive(Debug, Default)]
pub struct ScriptedSeller {
    script: Mutex<SellerScript>,
}

impl ScriptedSeller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for the next invocations
    pub fn with_outcomes(self, outcomes: impl IntoIterator<Item = ScriptedSale>) -> Self {
        lock(&self.script).queue.extend(outcomes);
        self
    }

    /// Number of `sell_all` calls so far
    pub fn invocations(&self) -> usize {
        lock(&self.script).invocations.len()
    }

    /// Tokens and (tokio) instants of every call
    pub fn invocation_log(&self) -> Vec<(Address, Instant)> {
        lock(&self.script).invocations.clone()
    }
}

#[async_trait]
impl SellExecution for ScriptedSeller {
    async fn sell_all(&self, token: Address) -> Result<SellOutcome, ExecutionError> {
        let mut script = lock(&self.script);
        script.invocations.push((token, Instant::now()));
        let attempt = script.invocations.len() as u64;

        match script.queue.pop_front().unwrap_or(ScriptedSale::Sold) {
            ScriptedSale::Sold => {
                let plan = SellPlan {
                    token,
                    router: Address::ZERO,
                    amount_in: U256::from(1u64),
                    quoted_out: U256::from(1u64),
                    min_out: U256::ZERO,
                    deadline: 0,
                };
                Ok(SellOutcome::Sold(SellReceipt {
                    plan,
                    approval: TxConfirmation {
                        tx_hash: tx_hash(attempt * 2 - 1),
                        block_number: None,
                    },
                    sale: TxConfirmation {
                        tx_hash: tx_hash(attempt * 2),
                        block_number: None,
                    },
                }))
            }
            ScriptedSale::NothingToSell => Ok(SellOutcome::NothingToSell),
            ScriptedSale::Fail(message) => Err(ExecutionError::Sell(ChainError::Rpc(message))),
        }
    }
}
