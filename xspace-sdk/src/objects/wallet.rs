use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Connection status reported by a wallet provider.
pub enum WalletStatus {
    NotInstalled,
    NotActive,
    InActivating,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The two ledgers an asset moves between.
pub enum Space {
    Core,
    ESpace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// A concrete wallet provider.
///
/// The core wallet is expected on the Core network, the bridge wallet on the
/// eSpace network.
pub enum Wallet {
    Core,
    Bridge,
}

impl Wallet {
    /// The space this wallet signs for.
    pub fn space(self) -> Space {
        match self {
            Wallet::Core => Space::Core,
            Wallet::Bridge => Space::ESpace,
        }
    }

    /// The other wallet of the pair.
    pub fn other(self) -> Wallet {
        match self {
            Wallet::Core => Wallet::Bridge,
            Wallet::Bridge => Wallet::Core,
        }
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wallet::Core => write!(f, "core-wallet"),
            Wallet::Bridge => write!(f, "bridge-wallet"),
        }
    }
}

/// Which wallet an action needs before it may run.
///
/// The `Either*` tags name a preferred wallet. It is used while it is active
/// and on its network; otherwise the gate acts on the other wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequiredWallet {
    Core,
    Bridge,
    EitherCorePreferred,
    EitherBridgePreferred,
}

impl RequiredWallet {
    pub const ALL: [RequiredWallet; 4] = [
        RequiredWallet::Core,
        RequiredWallet::Bridge,
        RequiredWallet::EitherCorePreferred,
        RequiredWallet::EitherBridgePreferred,
    ];
}

impl fmt::Display for RequiredWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequiredWallet::Core => "core",
            RequiredWallet::Bridge => "bridge",
            RequiredWallet::EitherCorePreferred => "either-core-preferred",
            RequiredWallet::EitherBridgePreferred => "either-bridge-preferred",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown required wallet: {0}")]
pub struct UnknownRequiredWallet(String);

impl FromStr for RequiredWallet {
    type Err = UnknownRequiredWallet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequiredWallet::ALL
            .into_iter()
            .find(|r| r.to_string() == s)
            .ok_or_else(|| UnknownRequiredWallet(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_wallet_round_trips_through_display() {
        for required in RequiredWallet::ALL {
            let parsed: RequiredWallet = required.to_string().parse().unwrap();
            assert_eq!(parsed, required);
        }
        assert!("both".parse::<RequiredWallet>().is_err());
    }

    #[test]
    fn test_wallet_status_wire_names() {
        let json = serde_json::to_string(&WalletStatus::InActivating).unwrap();
        assert_eq!(json, "\"in-activating\"");
        let status: WalletStatus = serde_json::from_str("\"not-installed\"").unwrap();
        assert_eq!(status, WalletStatus::NotInstalled);
    }
}
