use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Native currency advertised when a wallet is asked to add a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: CompactString,
    pub symbol: CompactString,
    pub decimals: u8,
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self {
            name: CompactString::const_new("Conflux"),
            symbol: CompactString::const_new("CFX"),
            decimals: 18,
        }
    }
}

/// A network a wallet is expected to be pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub network_id: u64,
    pub name: String,
    pub rpc_url: Url,
    pub explorer_url: Url,
    #[serde(default)]
    pub native_currency: NativeCurrency,
}

impl Network {
    /// The `0x`-prefixed chain id wallets expect on the wire.
    pub fn hex_chain_id(&self) -> String {
        format!("{:#x}", self.network_id)
    }

    /// Parameters for a wallet `addChain` request.
    pub fn add_chain_params(&self) -> AddChainParams {
        AddChainParams {
            chain_id: self.hex_chain_id(),
            chain_name: self.name.clone(),
            native_currency: self.native_currency.clone(),
            rpc_urls: vec![self.rpc_url.to_string()],
            block_explorer_urls: vec![self.explorer_url.to_string()],
        }
    }
}

/// Wire shape of an add-chain request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

/// Parse a chain id as reported by a wallet, either `0x`-prefixed hex or decimal.
pub fn parse_chain_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn espace_testnet() -> Network {
        Network {
            network_id: 71,
            name: "Conflux eSpace (Testnet)".to_string(),
            rpc_url: Url::parse("https://evmtestnet.confluxrpc.com").unwrap(),
            explorer_url: Url::parse("https://evmtestnet.confluxscan.io").unwrap(),
            native_currency: NativeCurrency::default(),
        }
    }

    #[test]
    fn test_add_chain_params_shape() {
        let params = serde_json::to_value(espace_testnet().add_chain_params()).unwrap();
        assert_eq!(params["chainId"], "0x47");
        assert_eq!(params["chainName"], "Conflux eSpace (Testnet)");
        assert_eq!(params["nativeCurrency"]["symbol"], "CFX");
        assert_eq!(params["nativeCurrency"]["decimals"], 18);
        assert_eq!(params["rpcUrls"][0], "https://evmtestnet.confluxrpc.com/");
        assert_eq!(params["blockExplorerUrls"][0], "https://evmtestnet.confluxscan.io/");
    }

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(parse_chain_id("0x47"), Some(71));
        assert_eq!(parse_chain_id("1030"), Some(1030));
        assert_eq!(parse_chain_id("0xzz"), None);
        assert_eq!(parse_chain_id(""), None);
    }
}
