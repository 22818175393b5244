use std::fmt::Display;
use std::future::IntoFuture;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use async_trait::async_trait;
use thiserror::Error;

use super::bindings::{IRouter, IERC20, ILens};
use super::wallet::WalletManager;
use crate::ports::{ChainError, ChainPort, LensQuote, QuoteSide, SellOrder, TxConfirmation};

/// The RPC endpoint could not be used at startup
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("Invalid RPC URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Cannot reach RPC endpoint {url}: {reason}")]
    Unreachable { url: String, reason: String },
}

/// Connection and transaction settings
#[derive(Debug, Clone)]
pub struct EvmChainConfig {
    pub rpc_url: String,
    pub lens_address: Address,
    /// Bound on every read and on transaction submission
    pub rpc_timeout: Duration,
    /// Bound on waiting for a receipt
    pub confirmation_timeout: Duration,
    pub approve_gas_limit: u64,
    pub sell_gas_limit: u64,
}

pub struct EvmChain {
    provider: DynProvider,
    wallet: Address,
    can_sign: bool,
    config: EvmChainConfig,
}

impl EvmChain {
    /// Connect with a signing wallet
    pub async fn connect(
        config: EvmChainConfig,
        wallet: &WalletManager,
    ) -> Result<Self, ConnectivityError> {
        let url = parse_url(&config.rpc_url)?;
        let provider = ProviderBuilder::new()
            .wallet(wallet.ethereum_wallet())
            .connect_http(url)
            .erased();
        Self::verified(provider, wallet.address(), true, config).await
    }

    /// Connect without a key; reads only, `approve`/`sell` fail
    pub async fn connect_read_only(
        config: EvmChainConfig,
        wallet: Address,
    ) -> Result<Self, ConnectivityError> {
        let url = parse_url(&config.rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Self::verified(provider, wallet, false, config).await
    }

    async fn verified(
        provider: DynProvider,
        wallet: Address,
        can_sign: bool,
        config: EvmChainConfig,
    ) -> Result<Self, ConnectivityError> {
        let unreachable = |reason: String| ConnectivityError::Unreachable {
            url: config.rpc_url.clone(),
            reason,
        };

        let block = match tokio::time::timeout(config.rpc_timeout, provider.get_block_number()).await
        {
            Ok(Ok(block)) => block,
            Ok(Err(e)) => return Err(unreachable(e.to_string())),
            Err(_) => return Err(unreachable(format!("no answer within {:?}", config.rpc_timeout))),
        };
        let chain_id = match tokio::time::timeout(config.rpc_timeout, provider.get_chain_id()).await {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => return Err(unreachable(e.to_string())),
            Err(_) => return Err(unreachable(format!("no answer within {:?}", config.rpc_timeout))),
        };

        tracing::info!(
            "Connected to {} (chain id {}, block {}) as {}{}",
            config.rpc_url,
            chain_id,
            block,
            wallet,
            if can_sign { "" } else { " [read-only]" }
        );

        Ok(Self {
            provider,
            wallet,
            can_sign,
            config,
        })
    }

    /// Run an RPC future under the read timeout
    async fn bounded<T, E, F>(&self, operation: &'static str, fut: F) -> Result<T, ChainError>
    where
        E: Display,
        F: IntoFuture<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.config.rpc_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ChainError::Rpc(format!("{}: {}", operation, e))),
            Err(_) => Err(ChainError::Timeout {
                operation,
                timeout: self.config.rpc_timeout,
            }),
        }
    }

    fn ensure_signer(&self) -> Result<(), ChainError> {
        if !self.can_sign {
            return Err(ChainError::Signer(
                "connected read-only, no private key loaded".to_string(),
            ));
        }
        Ok(())
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        self.bounded("eth_gasPrice", self.provider.get_gas_price()).await
    }

    /// Wait for the receipt; a failed status is a revert
    async fn confirm(
        &self,
        operation: &'static str,
        pending: PendingTransactionBuilder<Ethereum>,
    ) -> Result<TxConfirmation, ChainError> {
        let tx_hash = *pending.tx_hash();
        tracing::debug!("{} submitted: {}", operation, tx_hash);

        let receipt =
            match tokio::time::timeout(self.config.confirmation_timeout, pending.get_receipt()).await
            {
                Ok(Ok(receipt)) => receipt,
                Ok(Err(e)) => return Err(ChainError::Rpc(format!("{} receipt: {}", operation, e))),
                Err(_) => {
                    return Err(ChainError::Timeout {
                        operation,
                        timeout: self.config.confirmation_timeout,
                    })
                }
            };

        if !receipt.status() {
            return Err(ChainError::Reverted(tx_hash));
        }

        Ok(TxConfirmation {
            tx_hash,
            block_number: receipt.block_number,
        })
    }
}

#[async_trait]
impl ChainPort for EvmChain {
    fn wallet_address(&self) -> Address {
        self.wallet
    }

    async fn lens_quote(
        &self,
        token: Address,
        amount_in: U256,
        side: QuoteSide,
    ) -> Result<LensQuote, ChainError> {
        let lens = ILens::new(self.config.lens_address, self.provider.clone());
        let quote = self
            .bounded("getAmountOut", async {
                lens.getAmountOut(token, amount_in, side.is_buy()).call().await
            })
            .await?;

        Ok(LensQuote {
            router: quote.router,
            amount_out: quote.amountOut,
        })
    }

    async fn total_supply(&self, token: Address) -> Result<U256, ChainError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        self.bounded("totalSupply", async { erc20.totalSupply().call().await })
            .await
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        self.bounded("balanceOf", async { erc20.balanceOf(owner).call().await })
            .await
    }

    async fn transaction_count(&self) -> Result<u64, ChainError> {
        self.bounded(
            "eth_getTransactionCount",
            self.provider.get_transaction_count(self.wallet),
        )
        .await
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
        nonce: u64,
    ) -> Result<TxConfirmation, ChainError> {
        self.ensure_signer()?;
        let gas_price = self.gas_price().await?;
        let erc20 = IERC20::new(token, self.provider.clone());

        let pending = self
            .bounded("approve", async {
                erc20
                    .approve(spender, amount)
                    .from(self.wallet)
                    .nonce(nonce)
                    .gas(self.config.approve_gas_limit)
                    .gas_price(gas_price)
                    .send()
                    .await
            })
            .await?;

        self.confirm("approve", pending).await
    }

    async fn sell(
        &self,
        router: Address,
        order: &SellOrder,
        nonce: u64,
    ) -> Result<TxConfirmation, ChainError> {
        self.ensure_signer()?;
        let gas_price = self.gas_price().await?;
        let router = IRouter::new(router, self.provider.clone());
        let params = IRouter::SellParams {
            amountIn: order.amount_in,
            amountOutMin: order.amount_out_min,
            token: order.token,
            to: order.to,
            deadline: U256::from(order.deadline),
        };

        let pending = self
            .bounded("sell", async {
                router
                    .sell(params)
                    .from(self.wallet)
                    .nonce(nonce)
                    .gas(self.config.sell_gas_limit)
                    .gas_price(gas_price)
                    .send()
                    .await
            })
            .await?;

        self.confirm("sell", pending).await
    }
}

fn parse_url(raw: &str) -> Result<reqwest::Url, ConnectivityError> {
    raw.parse::<reqwest::Url>()
        .map_err(|e| ConnectivityError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })
}
