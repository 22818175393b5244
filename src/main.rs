//! capwatch - Market-cap trigger bot for EVM lens markets
//!
//! Watches a set of tokens through a price lens and sells a token once its
//! USD market cap crosses the configured threshold.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use capwatch::adapters::cli::{CheckConfigCmd, CliApp, Command, RunCmd, StatusCmd};
use capwatch::adapters::evm::{EvmChain, WalletError, WalletManager, PRIVATE_KEY_ENV};
use capwatch::adapters::price_feed::{SimplePriceClient, TickerPriceClient};
use capwatch::application::{
    MarketDataReader, MonitorState, ReferencePriceCache, SellExecutor, TriggerController,
};
use capwatch::config::{load_config, Config, FeedOrder};
use capwatch::domain::format_usd;
use capwatch::ports::{ChainPort, PriceFeed};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (PRIVATE_KEY goes here, not in the config)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let config = load_config(app.command.config_path());
    let config_level = config.as_ref().ok().map(|c| c.logging.level.clone());
    init_logging(app.verbose, app.debug, config_level.as_deref())?;

    let config = config.with_context(|| {
        format!(
            "Failed to load configuration from {}",
            app.command.config_path().display()
        )
    })?;

    match app.command {
        Command::Run(cmd) => run_command(cmd, config).await,
        Command::Status(cmd) => status_command(cmd, config).await,
        Command::CheckConfig(cmd) => check_config_command(cmd, config),
    }
}

/// Flags win over RUST_LOG, which wins over `[logging] level`
fn init_logging(verbose: bool, debug: bool, config_level: Option<&str>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config_level.unwrap_or("info")))
    };

    fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

/// Build the controller around a connected chain
fn build_controller(config: &Config, chain: Arc<dyn ChainPort>, paper: bool) -> Result<TriggerController> {
    let feeds = &config.price_feed;
    let primary = TickerPriceClient::with_timeout(
        feeds.primary_url.clone(),
        feeds.primary_symbol.clone(),
        feeds.timeout(),
    )
    .context("Failed to create primary price client")?;
    let secondary = SimplePriceClient::with_timeout(
        feeds.secondary_url.clone(),
        feeds.secondary_asset_id.clone(),
        feeds.timeout(),
    )
    .context("Failed to create secondary price client")?;

    let (first, second): (Box<dyn PriceFeed>, Box<dyn PriceFeed>) = match feeds.order {
        FeedOrder::TickerFirst => (Box::new(primary), Box::new(secondary)),
        FeedOrder::SimplePriceFirst => (Box::new(secondary), Box::new(primary)),
    };
    let price_cache = ReferencePriceCache::new(first, second).with_ttl(feeds.ttl());
    let reader =
        MarketDataReader::new(Arc::clone(&chain)).with_probe_amount(config.chain.probe_amount());
    let executor = SellExecutor::new(chain)
        .with_slippage_bps(config.sell.slippage_bps)
        .with_deadline_window(config.sell.deadline_window())
        .with_paper_mode(paper);

    Ok(TriggerController::new(
        config.monitored_tokens()?,
        price_cache,
        reader,
        Arc::new(executor),
    )
    .with_retry_policy(config.sell.retry_policy())
    .with_poll_interval(config.monitor.poll_interval()))
}

/// Read-only connection for a configured address when no key is available
async fn connect_read_only(config: &Config, reason: &WalletError) -> Result<EvmChain> {
    let Some(address) = config.sell.wallet()? else {
        bail!(
            "{}\n\nSet PRIVATE_KEY in .env, or set [sell] wallet_address for read-only use",
            reason
        );
    };
    tracing::warn!("{} - continuing read-only as {}", reason, address);
    EvmChain::connect_read_only(config.chain.evm_config()?, address)
        .await
        .context("RPC connectivity check failed")
}

async fn run_command(cmd: RunCmd, config: Config) -> Result<()> {
    tracing::info!("Starting capwatch...");
    tracing::info!("Config: {}", cmd.config.display());

    let chain = match WalletManager::from_env() {
        Ok(wallet) => EvmChain::connect(config.chain.evm_config()?, &wallet)
            .await
            .context("RPC connectivity check failed")?,
        Err(e) if cmd.paper => connect_read_only(&config, &e).await?,
        Err(e) => {
            return Err(e).context("A private key is required for live selling (or use --paper)")
        }
    };

    if cmd.paper {
        tracing::warn!("PAPER MODE - sells are quoted and logged, never submitted");
    }

    let mut controller = build_controller(&config, Arc::new(chain), cmd.paper)?;
    let mut state = MonitorState::new(controller.tokens());

    // Setup Ctrl+C handler
    let stop = controller.stop_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        stop.stop();
    });

    controller.run(&mut state).await;

    for token in controller.tokens() {
        tracing::info!("{}: {}", token.symbol, state.sell_state(&token.symbol));
    }
    tracing::info!("capwatch stopped");
    Ok(())
}

async fn status_command(cmd: StatusCmd, config: Config) -> Result<()> {
    tracing::info!("Reading status with {}", cmd.config.display());

    let wallet = match WalletManager::from_env() {
        Ok(wallet) => wallet.address(),
        Err(e) => config
            .sell
            .wallet()?
            .with_context(|| format!("{} and no [sell] wallet_address is configured", e))?,
    };
    let chain = EvmChain::connect_read_only(config.chain.evm_config()?, wallet)
        .await
        .context("RPC connectivity check failed")?;

    let mut controller = build_controller(&config, Arc::new(chain), true)?;
    let mut state = MonitorState::new(controller.tokens());
    let report = controller.observe(&mut state).await;

    println!("Wallet: {}", wallet);
    match report.reference_price {
        Some(reading) => println!("Reference price: ${} ({:?})", reading.value, reading.freshness),
        None => println!("Reference price: unavailable"),
    }
    for snapshot in &report.snapshots {
        let threshold = controller
            .tokens()
            .iter()
            .find(|t| t.address == snapshot.token)
            .and_then(|t| t.sell_at_market_cap_usd);
        match threshold {
            Some(threshold) => println!("{}  (sells at {})", snapshot, format_usd(threshold)),
            None => println!("{}", snapshot),
        }
    }
    for (symbol, reason) in &report.skipped {
        println!("{:<6}  unavailable: {}", symbol, reason);
    }

    Ok(())
}

fn check_config_command(cmd: CheckConfigCmd, config: Config) -> Result<()> {
    println!("✓ {} is valid", cmd.config.display());
    println!("  RPC: {}", config.chain.get_rpc_url());
    println!("  Lens: {}", config.chain.lens()?);
    println!(
        "  Poll every {}s, price TTL {}s, sources {:?}",
        config.monitor.poll_interval_secs, config.price_feed.ttl_secs, config.price_feed.order
    );
    println!(
        "  Sell: {} bps slippage, {} attempts, {}s back-off",
        config.sell.slippage_bps, config.sell.max_attempts, config.sell.retry_backoff_secs
    );

    for token in config.monitored_tokens()? {
        let action = match token.sell_at_market_cap_usd {
            Some(threshold) => format!("sell at {}", format_usd(threshold)),
            None => "watch only".to_string(),
        };
        println!("  {:<6} {}  {}", token.symbol, token.address, action);
    }

    if std::env::var(PRIVATE_KEY_ENV).is_err() {
        match config.sell.wallet()? {
            Some(address) => println!(
                "  ! {} is not set: status and run --paper only, as {}",
                PRIVATE_KEY_ENV, address
            ),
            None => println!(
                "  ! {} is not set and no wallet_address is configured: nothing can run",
                PRIVATE_KEY_ENV
            ),
        }
    }

    Ok(())
}
