//! Trigger Controller
//!
//! The polling loop. Each cycle:
//! 1. Get the reference price (cached, fresh, or stale)
//! 2. Read a snapshot of every monitored token, in configured order
//! 3. Sell any token whose market cap reached its threshold, with bounded retries
//!
//! then sleeps for the poll interval. Everything is awaited in sequence; a
//! stop request ends the loop between cycles, never inside one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use rust_decimal::Decimal;
use tokio::sync::watch;

use super::market_reader::MarketDataReader;
use super::price_cache::{Freshness, PriceReading, ReferencePriceCache};
use crate::domain::{format_usd, MarketSnapshot, RetryPolicy, SellState};
use crate::ports::{SellExecution, SellOutcome};

/// Default pause between cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(7);

/// A token the bot watches
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredToken {
    pub symbol: String,
    pub address: Address,
    /// Market cap (USD) at which the whole balance is sold; None = watch only
    pub sell_at_market_cap_usd: Option<Decimal>,
}

impl MonitoredToken {
    pub fn watch_only(symbol: impl Into<String>, address: Address) -> Self {
        Self {
            symbol: symbol.into(),
            address,
            sell_at_market_cap_usd: None,
        }
    }

    pub fn sell_at(symbol: impl Into<String>, address: Address, threshold_usd: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            address,
            sell_at_market_cap_usd: Some(threshold_usd),
        }
    }

    /// Threshold this snapshot crossed, if any
    fn crossed(&self, snapshot: &MarketSnapshot) -> Option<Decimal> {
        self.sell_at_market_cap_usd
            .filter(|threshold| snapshot.meets(*threshold))
    }
}

/// Mutable process state, owned by the caller and threaded through each cycle
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    /// Sell state per token symbol
    pub sell_states: HashMap<String, SellState>,
    /// Completed cycles
    pub cycles: u64,
}

impl MonitorState {
    /// Every token starts `NotTriggered`
    pub fn new(tokens: &[MonitoredToken]) -> Self {
        Self {
            sell_states: tokens
                .iter()
                .map(|t| (t.symbol.clone(), SellState::NotTriggered))
                .collect(),
            cycles: 0,
        }
    }

    pub fn sell_state(&self, symbol: &str) -> SellState {
        self.sell_states.get(symbol).copied().unwrap_or_default()
    }
}

/// How a triggered sell sequence ended
#[derive(Debug, Clone, PartialEq)]
pub enum SaleResult {
    /// An attempt completed (sold, nothing to sell, or simulated)
    Completed { attempts: u32, outcome: SellOutcome },
    /// Every attempt failed; the token re-arms on a later crossing
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaleReport {
    pub symbol: String,
    pub market_cap_usd: Decimal,
    pub threshold_usd: Decimal,
    pub result: SaleResult,
}

/// What one cycle saw and did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    /// None when no reference price was available at all
    pub reference_price: Option<PriceReading>,
    pub snapshots: Vec<MarketSnapshot>,
    /// Tokens not read this cycle, with the reason
    pub skipped: Vec<(String, String)>,
    pub sales: Vec<SaleReport>,
}

/// Requests a graceful stop of [`TriggerController::run`]
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
        tracing::info!("Stop requested, finishing current cycle");
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

pub struct TriggerController {
    tokens: Vec<MonitoredToken>,
    price_cache: ReferencePriceCache,
    reader: MarketDataReader,
    executor: Arc<dyn SellExecution>,
    retry: RetryPolicy,
    poll_interval: Duration,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl TriggerController {
    pub fn new(
        tokens: Vec<MonitoredToken>,
        price_cache: ReferencePriceCache,
        reader: MarketDataReader,
        executor: Arc<dyn SellExecution>,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            tokens,
            price_cache,
            reader,
            executor,
            retry: RetryPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn tokens(&self) -> &[MonitoredToken] {
        &self.tokens
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Poll until a stop is requested
    pub async fn run(&mut self, state: &mut MonitorState) {
        tracing::info!(
            "Monitoring {} tokens every {}s ({} sell-triggering)",
            self.tokens.len(),
            self.poll_interval.as_secs(),
            self.tokens
                .iter()
                .filter(|t| t.sell_at_market_cap_usd.is_some())
                .count()
        );

        while !self.stop_requested() {
            self.run_cycle(state).await;

            if self.stop_requested() {
                break;
            }

            let mut stop_rx = self.stop_rx.clone();
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = stop_rx.wait_for(|stopped| *stopped) => {}
            }
        }

        tracing::info!("Monitor stopped after {} cycles", state.cycles);
    }

    /// One full cycle: observe, then act on any crossed threshold
    pub async fn run_cycle(&mut self, state: &mut MonitorState) -> CycleReport {
        let (mut report, read) = self.observe_tokens(state).await;
        let mut sales = Vec::new();

        for (snapshot, &index) in report.snapshots.iter().zip(&read) {
            let token = &self.tokens[index];
            let Some(threshold) = token.crossed(snapshot) else {
                continue;
            };

            let sell_state = state.sell_states.entry(token.symbol.clone()).or_default();
            if !sell_state.arm() {
                tracing::debug!("{} already sold, ignoring threshold crossing", token.symbol);
                continue;
            }

            tracing::info!(
                "{} market cap {} reached threshold {}, selling",
                token.symbol,
                format_usd(snapshot.market_cap_usd),
                format_usd(threshold)
            );

            let result = self.sell_with_retry(token).await;
            match &result {
                SaleResult::Completed { .. } => sell_state.record_sold(),
                SaleResult::Exhausted { attempts, .. } => sell_state.record_failed(*attempts),
            }

            sales.push(SaleReport {
                symbol: token.symbol.clone(),
                market_cap_usd: snapshot.market_cap_usd,
                threshold_usd: threshold,
                result,
            });
        }

        report.sales = sales;
        report
    }

    /// Reference price plus a snapshot of every token. Never sells.
    pub async fn observe(&mut self, state: &mut MonitorState) -> CycleReport {
        self.observe_tokens(state).await.0
    }

    /// Like `observe`, plus the index into `tokens` of each snapshot
    async fn observe_tokens(&mut self, state: &mut MonitorState) -> (CycleReport, Vec<usize>) {
        let mut read = Vec::new();
        state.cycles += 1;
        let mut report = CycleReport {
            cycle: state.cycles,
            ..CycleReport::default()
        };

        let reading = match self.price_cache.get_reference_price().await {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!(
                    "No reference price available, skipping token reads this cycle: {}",
                    e
                );
                report.skipped = self
                    .tokens
                    .iter()
                    .map(|t| (t.symbol.clone(), "no reference price".to_string()))
                    .collect();
                return (report, read);
            }
        };

        match reading.freshness {
            Freshness::Stale => tracing::warn!(
                "Cycle {}: reference price ${} (stale, {}s old)",
                report.cycle,
                reading.value,
                reading.age.as_secs()
            ),
            _ => tracing::info!("Cycle {}: reference price ${}", report.cycle, reading.value),
        }
        report.reference_price = Some(reading);

        for (index, token) in self.tokens.iter().enumerate() {
            match self
                .reader
                .read_market_data(&token.symbol, token.address, reading.value)
                .await
            {
                Ok(snapshot) => {
                    tracing::info!("{}", snapshot);
                    report.snapshots.push(snapshot);
                    read.push(index);
                }
                Err(e) => {
                    tracing::error!("Failed to read {}: {}", token.symbol, e);
                    report.skipped.push((token.symbol.clone(), e.to_string()));
                }
            }
        }

        (report, read)
    }

    /// Up to `max_attempts` sells with a fixed pause between failures
    async fn sell_with_retry(&self, token: &MonitoredToken) -> SaleResult {
        let mut attempt = 1;
        loop {
            match self.executor.sell_all(token.address).await {
                Ok(outcome) => {
                    match &outcome {
                        SellOutcome::Sold(receipt) => tracing::info!(
                            "{} sold on attempt {} (tx {})",
                            token.symbol,
                            attempt,
                            receipt.sale.tx_hash
                        ),
                        SellOutcome::NothingToSell => {
                            tracing::info!("{}: nothing to sell", token.symbol)
                        }
                        SellOutcome::Simulated(_) => {
                            tracing::info!("[PAPER] {} sell simulated", token.symbol)
                        }
                    }
                    return SaleResult::Completed {
                        attempts: attempt,
                        outcome,
                    };
                }
                Err(e) => {
                    tracing::error!(
                        "{} sell attempt {}/{} failed: {}",
                        token.symbol,
                        attempt,
                        self.retry.max_attempts,
                        e
                    );
                    match self.retry.delay_after(attempt) {
                        Some(delay) => {
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => {
                            tracing::error!(
                                "{} sell gave up after {} attempts, will retry on next crossing",
                                token.symbol,
                                attempt
                            );
                            return SaleResult::Exhausted {
                                attempts: attempt,
                                last_error: e.to_string(),
                            };
                        }
                    }
                }
            }
        }
    }
}
