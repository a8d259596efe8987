//! JSON-RPC wallet provider.
//!
//! Talks EIP-1193 style JSON-RPC over HTTP to a wallet endpoint. The same
//! adapter serves both wallets; the [`RpcDialect`] picks the method names
//! (`cfx_*` for the Core wallet, `eth_*` for the bridge wallet).

use super::{ProviderError, WalletProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;
use xspace_sdk::objects::{Network, WalletStatus, parse_chain_id};

/// Method naming scheme spoken by a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcDialect {
    /// Conflux Core wallets (`cfx_*`, `wallet_*ConfluxChain`).
    Conflux,
    /// Ethereum-compatible wallets (`eth_*`, `wallet_*EthereumChain`).
    Ethereum,
}

impl RpcDialect {
    pub fn accounts(self) -> &'static str {
        match self {
            RpcDialect::Conflux => "cfx_accounts",
            RpcDialect::Ethereum => "eth_accounts",
        }
    }

    pub fn request_accounts(self) -> &'static str {
        match self {
            RpcDialect::Conflux => "cfx_requestAccounts",
            RpcDialect::Ethereum => "eth_requestAccounts",
        }
    }

    pub fn chain_id(self) -> &'static str {
        match self {
            RpcDialect::Conflux => "cfx_chainId",
            RpcDialect::Ethereum => "eth_chainId",
        }
    }

    pub fn switch_chain(self) -> &'static str {
        match self {
            RpcDialect::Conflux => "wallet_switchConfluxChain",
            RpcDialect::Ethereum => "wallet_switchEthereumChain",
        }
    }

    pub fn add_chain(self) -> &'static str {
        match self {
            RpcDialect::Conflux => "wallet_addConfluxChain",
            RpcDialect::Ethereum => "wallet_addEthereumChain",
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

impl<'a> RpcRequest<'a> {
    fn new(method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

impl RpcResponse {
    fn into_result(self) -> Result<Value, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError::from_code(error.code, error.message));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Wallet provider reached over JSON-RPC.
pub struct JsonRpcWalletProvider {
    dialect: RpcDialect,
    endpoint: Url,
    http_client: reqwest::Client,
}

impl JsonRpcWalletProvider {
    /// Create a new JsonRpcWalletProvider.
    ///
    /// # Arguments
    ///
    /// * `dialect` - Method naming scheme of the wallet behind `endpoint`
    /// * `endpoint` - URL the JSON-RPC requests are POSTed to
    pub fn new(dialect: RpcDialect, endpoint: Url) -> Self {
        Self {
            dialect,
            endpoint,
            http_client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        debug!(dialect = ?self.dialect, method, "Sending wallet request");
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&RpcRequest::new(method, params))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let response: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        response.into_result()
    }
}

/// Status implied by an accounts query.
fn status_from_accounts(result: Result<Value, ProviderError>) -> WalletStatus {
    match result {
        Ok(Value::Array(accounts)) if !accounts.is_empty() => WalletStatus::Active,
        Ok(_) => WalletStatus::NotActive,
        Err(ProviderError::Transport(_)) => WalletStatus::NotInstalled,
        Err(_) => WalletStatus::NotActive,
    }
}

#[async_trait]
impl WalletProvider for JsonRpcWalletProvider {
    async fn status(&self) -> WalletStatus {
        status_from_accounts(self.call(self.dialect.accounts(), json!([])).await)
    }

    async fn chain_id(&self) -> Option<u64> {
        let result = self.call(self.dialect.chain_id(), json!([])).await.ok()?;
        result.as_str().and_then(parse_chain_id)
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        self.call(self.dialect.request_accounts(), json!([]))
            .await
            .map(|_| ())
    }

    async fn switch_chain(&self, network: &Network) -> Result<(), ProviderError> {
        let params = json!([{ "chainId": network.hex_chain_id() }]);
        self.call(self.dialect.switch_chain(), params)
            .await
            .map(|_| ())
    }

    async fn add_chain(&self, network: &Network) -> Result<(), ProviderError> {
        let params = serde_json::to_value(network.add_chain_params())
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        self.call(self.dialect.add_chain(), Value::Array(vec![params]))
            .await
            .map(|_| ())
    }
}
