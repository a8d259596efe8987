//! Configuration module for xspace-cli.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{FileConfig, NetworkConfig as FileNetworkConfig, TokenConfig};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;
use xspace_sdk::config::{CrossSpaceConfig, NetworksConfig, TokensConfig};
use xspace_sdk::objects::{MAX_TOKEN_DECIMALS, Network, Token};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Values given on the command line (or through the environment) that win
/// over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub store_dir: Option<PathBuf>,
    pub endpoint: Option<Url>,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub runtime: CrossSpaceConfig,
    pub store_dir: PathBuf,
    pub endpoint: Option<Url>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    overrides: ConfigOverrides,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, overrides: ConfigOverrides) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            overrides,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    fn load_str(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(dir) = &self.overrides.store_dir {
            file_config.store.dir = dir.clone();
        }
        if let Some(endpoint) = &self.overrides.endpoint {
            file_config.wallet.endpoint = Some(endpoint.clone());
        }

        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let networks = &config.networks;
    if networks.core.network_id == networks.espace.network_id {
        return Err(ConfigError::ValidationError(format!(
            "core and espace networks share network id {}",
            networks.core.network_id
        )));
    }

    let tokens = &config.tokens;
    for token in [&tokens.native, &tokens.inner] {
        if token.decimals > MAX_TOKEN_DECIMALS {
            return Err(ConfigError::ValidationError(format!(
                "token {} has {} decimals, at most {} are supported",
                token.symbol, token.decimals, MAX_TOKEN_DECIMALS
            )));
        }
    }
    let mut addresses = HashSet::new();
    for token in [&tokens.native, &tokens.inner] {
        if !addresses.insert(token.native_address.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "native and inner tokens share address {}",
                token.native_address
            )));
        }
    }
    if !tokens.native.is_native {
        return Err(ConfigError::ValidationError(format!(
            "native token {} must set is_native",
            tokens.native.symbol
        )));
    }
    if tokens.inner.is_native {
        return Err(ConfigError::ValidationError(format!(
            "inner token {} must not set is_native",
            tokens.inner.symbol
        )));
    }

    if config.wallet.poll_interval_ms == 0 || config.bridge.withdrawable_poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "poll intervals must be greater than zero".to_string(),
        ));
    }
    if config.bridge.native_gas_reserve.is_sign_negative() {
        return Err(ConfigError::ValidationError(
            "native_gas_reserve must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let runtime = CrossSpaceConfig {
        networks: NetworksConfig::new(
            convert_network(file_config.networks.core),
            convert_network(file_config.networks.espace),
        ),
        tokens: TokensConfig {
            native: convert_token(file_config.tokens.native),
            inner: convert_token(file_config.tokens.inner),
            bridge_spender: file_config.bridge.spender,
            native_gas_reserve: file_config.bridge.native_gas_reserve,
        },
        approval: file_config.bridge.approval,
        withdrawable_poll_interval: Duration::from_millis(
            file_config.bridge.withdrawable_poll_interval_ms,
        ),
        gate_poll_interval: Duration::from_millis(file_config.wallet.poll_interval_ms),
    };

    LoadedConfig {
        runtime,
        store_dir: file_config.store.dir,
        endpoint: file_config.wallet.endpoint,
    }
}

fn convert_network(n: FileNetworkConfig) -> Network {
    Network {
        network_id: n.network_id,
        name: n.name,
        rpc_url: n.rpc_url,
        explorer_url: n.explorer_url,
        native_currency: n.native_currency.unwrap_or_default(),
    }
}

fn convert_token(t: TokenConfig) -> Token {
    Token {
        native_address: t.native_address,
        mapped_address: t.mapped_address,
        symbol: t.symbol,
        decimals: t.decimals,
        is_native: t.is_native,
        is_bridge_managed: t.is_bridge_managed,
        name: t.name,
        icon: t.icon,
        native_space: t.native_space,
    }
}
