//! Wallet provider capability.
//!
//! Both wallets are reached through the same [`WalletProvider`] trait. The
//! gate and the orchestrators are written once against it and pick the
//! concrete provider through the [`Wallet`] tag.

pub mod rpc;

pub use rpc::{JsonRpcWalletProvider, RpcDialect};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use xspace_sdk::objects::{Network, Wallet, WalletStatus};

/// Errors a wallet provider (or a signed ledger call) can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The user dismissed the wallet prompt (code 4001).
    #[error("user rejected the request")]
    UserRejected,

    /// The wallet does not know the requested chain (code 4902).
    #[error("chain has not been added to the wallet")]
    ChainNotAdded,

    /// Any other error reported by the provider.
    #[error("provider error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The provider could not be reached or answered garbage.
    #[error("provider unreachable: {0}")]
    Transport(String),
}

impl ProviderError {
    pub const USER_REJECTED_CODE: i64 = 4001;
    pub const CHAIN_NOT_ADDED_CODE: i64 = 4902;

    /// Classify a numeric rejection code.
    pub fn from_code(code: i64, message: impl Into<String>) -> Self {
        match code {
            Self::USER_REJECTED_CODE => ProviderError::UserRejected,
            Self::CHAIN_NOT_ADDED_CODE => ProviderError::ChainNotAdded,
            _ => ProviderError::Rpc {
                code,
                message: message.into(),
            },
        }
    }

    /// The numeric code of this error, if it has one.
    pub fn code(&self) -> Option<i64> {
        match self {
            ProviderError::UserRejected => Some(Self::USER_REJECTED_CODE),
            ProviderError::ChainNotAdded => Some(Self::CHAIN_NOT_ADDED_CODE),
            ProviderError::Rpc { code, .. } => Some(*code),
            ProviderError::Transport(_) => None,
        }
    }

    pub fn is_user_rejected(&self) -> bool {
        matches!(self, ProviderError::UserRejected)
    }
}

/// Uniform capability surface over a wallet provider.
///
/// Every call may suspend for as long as the user leaves a wallet prompt open.
/// There is no timeout; callers surface a pending state instead. The adapter
/// holds no state of its own: successful calls change provider state that is
/// observed again through [`status`](WalletProvider::status) and
/// [`chain_id`](WalletProvider::chain_id).
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Current connection status.
    async fn status(&self) -> WalletStatus;

    /// Chain the wallet is currently pointed at, if known.
    async fn chain_id(&self) -> Option<u64>;

    /// Ask the user to connect.
    async fn connect(&self) -> Result<(), ProviderError>;

    /// Ask the wallet to switch to `network`.
    async fn switch_chain(&self, network: &Network) -> Result<(), ProviderError>;

    /// Ask the wallet to add `network`.
    async fn add_chain(&self, network: &Network) -> Result<(), ProviderError>;

    /// Read status and chain id together.
    async fn observe(&self) -> WalletObservation {
        let status = self.status().await;
        let chain_id = self.chain_id().await;
        WalletObservation { status, chain_id }
    }
}

/// A point-in-time reading of one wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletObservation {
    pub status: WalletStatus,
    pub chain_id: Option<u64>,
}

impl WalletObservation {
    pub fn new(status: WalletStatus, chain_id: Option<u64>) -> Self {
        Self { status, chain_id }
    }

    /// Active and pointed at `network`.
    pub fn is_ready_for(&self, network: &Network) -> bool {
        self.status == WalletStatus::Active && self.chain_id == Some(network.network_id)
    }
}

/// Readings of both wallets taken together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observations {
    pub core: WalletObservation,
    pub bridge: WalletObservation,
}

impl Observations {
    pub fn get(&self, wallet: Wallet) -> WalletObservation {
        match wallet {
            Wallet::Core => self.core,
            Wallet::Bridge => self.bridge,
        }
    }
}

/// The two concrete providers, selected by [`Wallet`] tag.
#[derive(Clone)]
pub struct WalletProviders {
    core: Arc<dyn WalletProvider>,
    bridge: Arc<dyn WalletProvider>,
}

impl WalletProviders {
    pub fn new(core: Arc<dyn WalletProvider>, bridge: Arc<dyn WalletProvider>) -> Self {
        Self { core, bridge }
    }

    pub fn get(&self, wallet: Wallet) -> &Arc<dyn WalletProvider> {
        match wallet {
            Wallet::Core => &self.core,
            Wallet::Bridge => &self.bridge,
        }
    }

    /// Observe both wallets concurrently.
    pub async fn observe_all(&self) -> Observations {
        let (core, bridge) = tokio::join!(self.core.observe(), self.bridge.observe());
        Observations { core, bridge }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_classified() {
        assert_eq!(
            ProviderError::from_code(4001, "User rejected"),
            ProviderError::UserRejected
        );
        assert_eq!(
            ProviderError::from_code(4902, "Unrecognized chain"),
            ProviderError::ChainNotAdded
        );
        let other = ProviderError::from_code(-32603, "internal");
        assert_eq!(other.code(), Some(-32603));
        assert!(!other.is_user_rejected());
        assert_eq!(ProviderError::Transport("refused".into()).code(), None);
    }
}
