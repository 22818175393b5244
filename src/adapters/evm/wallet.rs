use std::str::FromStr;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use thiserror::Error;

/// Environment variable holding the hex private key
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("{0} is not set")]
    MissingKey(&'static str),
    #[error("Invalid private key: {0}")]
    InvalidKey(String),
}

/// Signing wallet loaded from a hex private key
#[derive(Clone)]
pub struct WalletManager {
    signer: PrivateKeySigner,
}

impl WalletManager {
    /// Load the key from `PRIVATE_KEY` (call `dotenvy::dotenv()` first to pick up `.env`)
    pub fn from_env() -> Result<Self, WalletError> {
        let key = std::env::var(PRIVATE_KEY_ENV)
            .map_err(|_| WalletError::MissingKey(PRIVATE_KEY_ENV))?;
        Self::from_hex(&key)
    }

    /// Parse a 32-byte hex key, with or without `0x`
    pub fn from_hex(key: &str) -> Result<Self, WalletError> {
        let signer = PrivateKeySigner::from_str(key.trim())
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        Ok(Self { signer })
    }

    /// Create a new random key (for testing)
    pub fn new_random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn ethereum_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
