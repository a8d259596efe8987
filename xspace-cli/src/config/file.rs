//! TOML file configuration structures.
//!
//! These structs directly map to the `xspace-config.toml` file format.

use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;
use xspace_sdk::config::ApprovalPolicy;
use xspace_sdk::objects::{NativeCurrency, Space};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub networks: NetworksConfig,
    pub tokens: TokensConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Wallet endpoint section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// URL the JSON-RPC wallet requests are POSTed to. Both wallets share it;
    /// they are told apart by method prefix.
    pub endpoint: Option<Url>,
    /// Milliseconds between gate re-evaluations in `watch`.
    #[serde(default = "default_gate_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            poll_interval_ms: default_gate_poll_interval_ms(),
        }
    }
}

fn default_gate_poll_interval_ms() -> u64 {
    1_000
}

/// Persistence section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON document per namespace.
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./xspace-data")
}

/// Expected network per wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworksConfig {
    pub core: NetworkConfig,
    pub espace: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network_id: u64,
    pub name: String,
    pub rpc_url: Url,
    pub explorer_url: Url,
    /// Defaults to Conflux / CFX / 18.
    #[serde(default)]
    pub native_currency: Option<NativeCurrency>,
}

/// Pinned tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensConfig {
    pub native: TokenConfig,
    pub inner: TokenConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub native_address: CompactString,
    #[serde(default)]
    pub mapped_address: CompactString,
    pub symbol: CompactString,
    pub decimals: u8,
    #[serde(default)]
    pub is_native: bool,
    #[serde(default)]
    pub is_bridge_managed: bool,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub native_space: Option<Space>,
}

/// Bridge parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Spender address approvals are granted to.
    #[serde(default)]
    pub spender: CompactString,
    #[serde(default)]
    pub approval: ApprovalPolicy,
    /// Native amount held back for gas, as a decimal string.
    #[serde(default)]
    pub native_gas_reserve: Decimal,
    /// Milliseconds between withdrawable balance reads.
    #[serde(default = "default_withdrawable_poll_interval_ms")]
    pub withdrawable_poll_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            spender: CompactString::default(),
            approval: ApprovalPolicy::default(),
            native_gas_reserve: Decimal::ZERO,
            withdrawable_poll_interval_ms: default_withdrawable_poll_interval_ms(),
        }
    }
}

fn default_withdrawable_poll_interval_ms() -> u64 {
    3_000
}

/// A complete configuration file, shared by the config tests.
#[cfg(test)]
pub(crate) const EXAMPLE_CONFIG: &str = r#"
[wallet]
endpoint = "http://127.0.0.1:8545"

[store]
dir = "/tmp/xspace"

[networks.core]
network_id = 1
name = "Conflux Core (Testnet)"
rpc_url = "https://test.confluxrpc.com"
explorer_url = "https://testnet.confluxscan.io"

[networks.espace]
network_id = 71
name = "Conflux eSpace (Testnet)"
rpc_url = "https://evmtestnet.confluxrpc.com"
explorer_url = "https://evmtestnet.confluxscan.io"

[networks.espace.native_currency]
name = "Conflux"
symbol = "CFX"
decimals = 18

[tokens.native]
native_address = "CFX"
symbol = "CFX"
decimals = 18
is_native = true
is_bridge_managed = true

[tokens.inner]
native_address = "cfx:achc8nxj7r451c223m18w2dwjnmhkd6rxawrvkvsy2"
mapped_address = "0xba2289fee4673ef00ee8d8dae260965ab543b68f"
symbol = "FC"
decimals = 18
is_bridge_managed = true
name = "FansCoin"
native_space = "core"

[bridge]
spender = "0x0888000000000000000000000000000000000006"
approval = "unlimited"
native_gas_reserve = "0.01"
"#;
