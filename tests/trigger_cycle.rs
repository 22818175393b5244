//! Trigger Cycle Integration Tests
//!
//! Drive full controller cycles through the public API:
//! price cache -> market reader -> trigger evaluation -> sell executor -> chain.
//!
//! All tests are deterministic (no real network calls) and use the scripted
//! in-memory ports.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use rust_decimal_macros::dec;

use capwatch::application::{
    Freshness, MarketDataReader, MonitorState, MonitoredToken, ReferencePriceCache, SaleResult,
    SellExecutor, TriggerController,
};
use capwatch::config::load_config;
use capwatch::domain::{fixed_point::units, SellState};
use capwatch::ports::mocks::{ChainCall, ScriptedChain, ScriptedPriceFeed};
use capwatch::ports::SellOutcome;

// ============================================================================
// Test Fixtures
// ============================================================================

const TCG: Address = Address::repeat_byte(0x94);
const FIRE: Address = Address::repeat_byte(0xce);
const MONA: Address = Address::repeat_byte(0x2c);
const ROUTER: Address = Address::repeat_byte(0x77);
const WALLET: Address = Address::repeat_byte(0xaa);

fn reference_tokens() -> Vec<MonitoredToken> {
    vec![
        MonitoredToken::sell_at("TCG", TCG, dec!(900000)),
        MonitoredToken::watch_only("FIRE", FIRE),
        MonitoredToken::watch_only("MONA", MONA),
    ]
}

/// Lens quotes 1000 tokens per MON for every token, 1M supply each
fn reference_chain() -> Arc<ScriptedChain> {
    let mut chain = ScriptedChain::new(WALLET).with_nonce(12);
    for token in [TCG, FIRE, MONA] {
        chain = chain
            .with_buy_quote(token, units(1000))
            .with_supply(token, units(1_000_000));
    }
    Arc::new(
        chain
            .with_balance(TCG, units(50_000))
            .with_sell_quote(TCG, ROUTER, units(40)),
    )
}

fn price_cache(primary: ScriptedPriceFeed, secondary: ScriptedPriceFeed) -> ReferencePriceCache {
    ReferencePriceCache::new(Box::new(primary), Box::new(secondary))
}

fn build(
    chain: Arc<ScriptedChain>,
    cache: ReferencePriceCache,
    paper: bool,
) -> TriggerController {
    let executor = SellExecutor::new(chain.clone()).with_paper_mode(paper);
    TriggerController::new(
        reference_tokens(),
        cache,
        MarketDataReader::new(chain),
        Arc::new(executor),
    )
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_reference_scenario_does_not_trigger() {
    let chain = reference_chain();
    let cache = price_cache(
        ScriptedPriceFeed::fixed("ticker", dec!(125.40)),
        ScriptedPriceFeed::failing("simple-price"),
    );
    let mut controller = build(chain.clone(), cache, false);
    let mut state = MonitorState::new(controller.tokens());

    let report = controller.run_cycle(&mut state).await;

    assert_eq!(report.reference_price.unwrap().value, dec!(125.40));
    assert_eq!(report.snapshots.len(), 3);
    for snapshot in &report.snapshots {
        assert_eq!(snapshot.market_cap_usd, dec!(125400));
    }
    assert!(report.sales.is_empty());
    assert!(chain.submitted().is_empty());
    assert_eq!(state.sell_state("TCG"), SellState::NotTriggered);
}

#[tokio::test]
async fn test_crossing_sells_whole_balance_once() {
    let chain = reference_chain();
    let cache = price_cache(
        ScriptedPriceFeed::fixed("ticker", dec!(125.40)),
        ScriptedPriceFeed::failing("simple-price"),
    );
    let mut controller = build(chain.clone(), cache, false);
    let mut state = MonitorState::new(controller.tokens());

    controller.run_cycle(&mut state).await;
    assert!(chain.submitted().is_empty());

    // Pool moves: 100 tokens per MON -> $1,254,000 market cap
    chain.set_buy_quote(TCG, units(100));
    let report = controller.run_cycle(&mut state).await;

    assert_eq!(report.sales.len(), 1);
    assert_eq!(report.sales[0].symbol, "TCG");
    assert_eq!(report.sales[0].market_cap_usd, dec!(1254000));
    let SaleResult::Completed { attempts: 1, outcome: SellOutcome::Sold(receipt) } =
        &report.sales[0].result
    else {
        panic!("expected a sale on the first attempt, got {:?}", report.sales[0].result);
    };
    assert_eq!(receipt.plan.amount_in, units(50_000));
    // 40 MON quoted, 5% slippage
    assert_eq!(receipt.plan.min_out, units(38));

    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 2);
    assert!(matches!(submitted[0], ChainCall::Approve { nonce: 12, spender: ROUTER, .. }));
    assert!(matches!(submitted[1], ChainCall::Sell { nonce: 13, router: ROUTER, .. }));
    assert_eq!(chain.balance(TCG), U256::ZERO);
    assert_eq!(state.sell_state("TCG"), SellState::Sold);

    // Still above the threshold, but never again
    for _ in 0..3 {
        let report = controller.run_cycle(&mut state).await;
        assert!(report.sales.is_empty());
    }
    assert_eq!(chain.submitted().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reverted_approvals_are_retried_with_fresh_nonces() {
    let chain = Arc::new(
        ScriptedChain::new(WALLET)
            .with_nonce(5)
            .with_buy_quote(TCG, units(1))
            .with_supply(TCG, units(1_000_000))
            .with_balance(TCG, units(10))
            .with_sell_quote(TCG, ROUTER, units(1))
            .with_approval_failures(2),
    );
    let cache = price_cache(
        ScriptedPriceFeed::fixed("ticker", dec!(1)),
        ScriptedPriceFeed::failing("simple-price"),
    );
    let mut controller = build(chain.clone(), cache, false);
    let mut state = MonitorState::new(controller.tokens());

    let start = tokio::time::Instant::now();
    let report = controller.run_cycle(&mut state).await;

    assert!(matches!(
        report.sales[0].result,
        SaleResult::Completed { attempts: 3, .. }
    ));
    assert_eq!(start.elapsed(), Duration::from_secs(6));
    assert_eq!(state.sell_state("TCG"), SellState::Sold);

    let nonces: Vec<u64> = chain
        .submitted()
        .iter()
        .map(|call| match call {
            ChainCall::Approve { nonce, .. } | ChainCall::Sell { nonce, .. } => *nonce,
            _ => unreachable!(),
        })
        .collect();
    // Three approvals (two reverted) then the sell, no nonce reused
    assert_eq!(nonces, vec![5, 6, 7, 8]);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_budget_rearms_on_next_cycle() {
    let chain = Arc::new(
        ScriptedChain::new(WALLET)
            .with_buy_quote(TCG, units(1))
            .with_supply(TCG, units(1_000_000))
            .with_balance(TCG, units(10))
            .with_sell_quote(TCG, ROUTER, units(1))
            .with_sell_failures(3),
    );
    let cache = price_cache(
        ScriptedPriceFeed::fixed("ticker", dec!(1)),
        ScriptedPriceFeed::failing("simple-price"),
    );
    let mut controller = build(chain.clone(), cache, false);
    let mut state = MonitorState::new(controller.tokens());

    let first = controller.run_cycle(&mut state).await;
    assert!(matches!(
        first.sales[0].result,
        SaleResult::Exhausted { attempts: 3, .. }
    ));
    assert_eq!(state.sell_state("TCG"), SellState::Failed { attempts: 3 });
    assert_eq!(chain.balance(TCG), units(10));

    let second = controller.run_cycle(&mut state).await;
    assert!(matches!(
        second.sales[0].result,
        SaleResult::Completed { attempts: 1, .. }
    ));
    assert_eq!(chain.balance(TCG), U256::ZERO);
}

#[tokio::test]
async fn test_paper_mode_never_submits() {
    let chain = reference_chain();
    chain.set_buy_quote(TCG, units(1));
    let cache = price_cache(
        ScriptedPriceFeed::fixed("ticker", dec!(125.40)),
        ScriptedPriceFeed::failing("simple-price"),
    );
    let mut controller = build(chain.clone(), cache, true);
    let mut state = MonitorState::new(controller.tokens());

    let report = controller.run_cycle(&mut state).await;
    assert!(matches!(
        report.sales[0].result,
        SaleResult::Completed { outcome: SellOutcome::Simulated(_), .. }
    ));

    controller.run_cycle(&mut state).await;
    assert!(chain.submitted().is_empty());
    assert_eq!(chain.balance(TCG), units(50_000));
    assert_eq!(state.sell_state("TCG"), SellState::Sold);
}

#[tokio::test]
async fn test_secondary_feed_covers_primary_outage() {
    let chain = reference_chain();
    let primary = ScriptedPriceFeed::failing("ticker");
    let cache = price_cache(primary, ScriptedPriceFeed::fixed("simple-price", dec!(125.40)));
    let mut controller = build(chain, cache, false);
    let mut state = MonitorState::new(controller.tokens());

    let report = controller.run_cycle(&mut state).await;
    let reading = report.reference_price.unwrap();
    assert_eq!(reading.value, dec!(125.40));
    assert_eq!(reading.freshness, Freshness::Fresh);
    assert_eq!(report.snapshots.len(), 3);
}

#[tokio::test]
async fn test_total_outage_on_cold_start_skips_cycle() {
    let chain = reference_chain();
    let cache = price_cache(
        ScriptedPriceFeed::failing("ticker"),
        ScriptedPriceFeed::failing("simple-price"),
    );
    let mut controller = build(chain.clone(), cache, false);
    let mut state = MonitorState::new(controller.tokens());

    let report = controller.run_cycle(&mut state).await;
    assert!(report.reference_price.is_none());
    assert_eq!(report.skipped.len(), 3);
    assert!(chain.calls().is_empty());
    assert_eq!(state.cycles, 1);
}

#[tokio::test]
async fn test_unpriced_token_is_reported_not_skipped() {
    let chain = reference_chain();
    chain.set_buy_quote(MONA, U256::ZERO);
    let cache = price_cache(
        ScriptedPriceFeed::fixed("ticker", dec!(125.40)),
        ScriptedPriceFeed::failing("simple-price"),
    );
    let mut controller = build(chain, cache, false);
    let mut state = MonitorState::new(controller.tokens());

    let report = controller.run_cycle(&mut state).await;
    let mona = report
        .snapshots
        .iter()
        .find(|s| s.symbol == "MONA")
        .unwrap();
    assert!(mona.is_unpriced());
    assert!(mona.market_cap_usd.is_zero());
    assert!(report.skipped.is_empty());
}

#[test]
fn test_sample_config_builds_token_set() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(include_str!("../config/monad.toml").as_bytes())
        .unwrap();

    let config = load_config(file.path()).unwrap();
    let tokens = config.monitored_tokens().unwrap();

    assert_eq!(tokens.len(), 3);
    assert_eq!(
        tokens
            .iter()
            .filter(|t| t.sell_at_market_cap_usd.is_some())
            .count(),
        1
    );
    assert_eq!(tokens[0].symbol, "TCG");
    assert_eq!(tokens[0].sell_at_market_cap_usd, Some(dec!(900000)));
}
