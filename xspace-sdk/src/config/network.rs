//! Network configuration.

use crate::objects::{Network, Wallet};

/// The network each wallet is expected to be pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworksConfig {
    /// Network the core wallet must be on.
    pub core: Network,
    /// Network the bridge wallet must be on.
    pub espace: Network,
}

impl NetworksConfig {
    /// Create a new NetworksConfig.
    pub fn new(core: Network, espace: Network) -> Self {
        Self { core, espace }
    }

    /// The network `wallet` is bound to.
    pub fn for_wallet(&self, wallet: Wallet) -> &Network {
        match wallet {
            Wallet::Core => &self.core,
            Wallet::Bridge => &self.espace,
        }
    }
}
