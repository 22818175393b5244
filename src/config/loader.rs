//! Configuration Loader
//!
//! Loads and validates the TOML configuration. Every section except
//! `[[tokens]]` has defaults matching the Monad reference deployment.
//! Secrets never live here: the private key comes from `PRIVATE_KEY`.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::adapters::evm::EvmChainConfig;
use crate::application::MonitoredToken;
use crate::domain::{RetryPolicy, BPS_DENOMINATOR};

/// Overrides `[chain] rpc_url`
pub const RPC_URL_ENV: &str = "CAPWATCH_RPC_URL";

pub const DEFAULT_RPC_URL: &str = "https://rpc.monad.xyz";
pub const DEFAULT_LENS_ADDRESS: &str = "0x7e78A8DE94f21804F7a17F4E8BF9EC2c872187ea";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainSection,
    #[serde(default)]
    pub price_feed: PriceFeedSection,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub sell: SellSection,
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// EVM node and contract settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    pub rpc_url: String,
    /// Price lens contract
    pub lens_address: String,
    /// Base-asset amount (wei) quoted to price a token; 10^18 = one whole unit
    pub probe_amount_wei: u64,
    pub rpc_timeout_secs: u64,
    /// How long to wait for a transaction receipt
    pub confirmation_timeout_secs: u64,
    pub approve_gas_limit: u64,
    pub sell_gas_limit: u64,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            lens_address: DEFAULT_LENS_ADDRESS.to_string(),
            probe_amount_wei: 1_000_000_000_000_000_000,
            rpc_timeout_secs: 10,
            confirmation_timeout_secs: 120,
            approve_gas_limit: 100_000,
            sell_gas_limit: 200_000,
        }
    }
}

impl ChainSection {
    /// Get RPC URL with environment variable override
    /// Checks CAPWATCH_RPC_URL env var first, falls back to config value
    pub fn get_rpc_url(&self) -> String {
        std::env::var(RPC_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.rpc_url.clone())
    }

    pub fn lens(&self) -> Result<Address, ConfigError> {
        parse_address("chain.lens_address", &self.lens_address)
    }

    pub fn probe_amount(&self) -> U256 {
        U256::from(self.probe_amount_wei)
    }

    /// Adapter settings, with the RPC URL already resolved
    pub fn evm_config(&self) -> Result<EvmChainConfig, ConfigError> {
        Ok(EvmChainConfig {
            rpc_url: self.get_rpc_url(),
            lens_address: self.lens()?,
            rpc_timeout: Duration::from_secs(self.rpc_timeout_secs),
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            approve_gas_limit: self.approve_gas_limit,
            sell_gas_limit: self.sell_gas_limit,
        })
    }
}

/// Which reference source is asked first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedOrder {
    #[default]
    TickerFirst,
    SimplePriceFirst,
}

/// Reference price sources
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriceFeedSection {
    pub order: FeedOrder,
    /// Exchange ticker endpoint
    pub primary_url: String,
    pub primary_symbol: String,
    /// Aggregator simple-price endpoint
    pub secondary_url: String,
    pub secondary_asset_id: String,
    /// Per-request HTTP timeout
    pub timeout_secs: u64,
    /// How long a fetched price is served without refetching
    pub ttl_secs: u64,
}

impl Default for PriceFeedSection {
    fn default() -> Self {
        Self {
            order: FeedOrder::TickerFirst,
            primary_url: crate::adapters::price_feed::BINANCE_TICKER_URL.to_string(),
            primary_symbol: "MONUSDT".to_string(),
            secondary_url: crate::adapters::price_feed::COINGECKO_SIMPLE_PRICE_URL.to_string(),
            secondary_asset_id: "monad".to_string(),
            timeout_secs: 5,
            ttl_secs: 60,
        }
    }
}

impl PriceFeedSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub poll_interval_secs: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self { poll_interval_secs: 7 }
    }
}

impl MonitorSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Sell execution and retry settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SellSection {
    /// Slippage tolerance in basis points (5% = 500 bps)
    pub slippage_bps: u32,
    /// Sell attempts per triggered cycle
    pub max_attempts: u32,
    pub retry_backoff_secs: u64,
    /// Router deadline, seconds after submission
    pub deadline_secs: u64,
    /// Wallet to report on when no private key is loaded (`status`)
    pub wallet_address: Option<String>,
}

impl Default for SellSection {
    fn default() -> Self {
        Self {
            slippage_bps: crate::domain::DEFAULT_SLIPPAGE_BPS,
            max_attempts: crate::domain::DEFAULT_MAX_ATTEMPTS,
            retry_backoff_secs: crate::domain::DEFAULT_RETRY_BACKOFF.as_secs(),
            deadline_secs: 300,
            wallet_address: None,
        }
    }
}

impl SellSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_backoff_secs))
    }

    pub fn deadline_window(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn wallet(&self) -> Result<Option<Address>, ConfigError> {
        self.wallet_address
            .as_deref()
            .map(|raw| parse_address("sell.wallet_address", raw))
            .transpose()
    }
}

/// One `[[tokens]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    pub symbol: String,
    pub address: String,
    /// Sell the whole balance once the market cap reaches this (USD)
    #[serde(default)]
    pub sell_at_market_cap_usd: Option<Decimal>,
}

impl TokenEntry {
    pub fn to_monitored(&self) -> Result<MonitoredToken, ConfigError> {
        Ok(MonitoredToken {
            symbol: self.symbol.clone(),
            address: parse_address(&format!("tokens.{}.address", self.symbol), &self.address)?,
            sell_at_market_cap_usd: self.sell_at_market_cap_usd,
        })
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file (`~` is expanded)
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let raw = path.as_ref().to_string_lossy();
    let expanded = shellexpand::tilde(&raw).to_string();
    let content = std::fs::read_to_string(expanded)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

fn parse_address(field: &str, raw: &str) -> Result<Address, ConfigError> {
    Address::from_str(raw.trim()).map_err(|e| {
        ConfigError::ValidationError(format!("{} is not a valid address ({:?}): {}", field, raw, e))
    })
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate chain section
        let rpc_url = self.chain.get_rpc_url();
        if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "rpc_url must be an http(s) URL, got {:?}",
                rpc_url
            )));
        }

        self.chain.lens()?;

        if self.chain.probe_amount_wei == 0 {
            return Err(ConfigError::ValidationError(
                "probe_amount_wei must be > 0".to_string(),
            ));
        }

        if self.chain.rpc_timeout_secs == 0 || self.chain.confirmation_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "rpc_timeout_secs and confirmation_timeout_secs must be > 0".to_string(),
            ));
        }

        // Validate price feeds
        if self.price_feed.primary_url.is_empty() || self.price_feed.secondary_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "price feed URLs cannot be empty".to_string(),
            ));
        }

        if self.price_feed.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "price_feed.timeout_secs must be > 0".to_string(),
            ));
        }

        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        // Validate sell section
        if self.sell.slippage_bps > BPS_DENOMINATOR {
            return Err(ConfigError::ValidationError(format!(
                "slippage_bps must be 0-{}, got {}",
                BPS_DENOMINATOR, self.sell.slippage_bps
            )));
        }

        if self.sell.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "max_attempts must be >= 1".to_string(),
            ));
        }

        if self.sell.deadline_secs <= self.chain.confirmation_timeout_secs {
            return Err(ConfigError::ValidationError(format!(
                "sell.deadline_secs ({}) must exceed chain.confirmation_timeout_secs ({})",
                self.sell.deadline_secs, self.chain.confirmation_timeout_secs
            )));
        }

        self.sell.wallet()?;

        // Validate tokens
        if self.tokens.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[tokens]] entry is required".to_string(),
            ));
        }

        let mut symbols = HashSet::new();
        let mut addresses = HashSet::new();
        for token in &self.tokens {
            if token.symbol.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "token symbol cannot be empty".to_string(),
                ));
            }
            if !symbols.insert(token.symbol.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate token symbol {}",
                    token.symbol
                )));
            }
            if let Some(threshold) = token.sell_at_market_cap_usd {
                if threshold <= Decimal::ZERO {
                    return Err(ConfigError::ValidationError(format!(
                        "{} sell_at_market_cap_usd must be > 0, got {}",
                        token.symbol, threshold
                    )));
                }
            }
            let monitored = token.to_monitored()?;
            if !addresses.insert(monitored.address) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate token address {} ({})",
                    monitored.address, token.symbol
                )));
            }
        }

        // Validate logging
        if !matches!(
            self.logging.level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be trace/debug/info/warn/error, got {:?}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Monitored tokens in configured order
    pub fn monitored_tokens(&self) -> Result<Vec<MonitoredToken>, ConfigError> {
        self.tokens.iter().map(TokenEntry::to_monitored).collect()
    }
}
