//! xspace-cli
//!
//! Drives the cross-space wallet gate and the token selection from a terminal,
//! against a JSON-RPC wallet endpoint.

mod config;
mod shutdown;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use compact_str::CompactString;
use config::{ConfigLoader, ConfigOverrides, LoadedConfig};
use shutdown::spawn_shutdown_watch;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use xspace_core::events::{NoticeReceiver, NoticeSink, notice_channel};
use xspace_core::gate::{ChainGate, GateMonitor, GateView, StepOutcome};
use xspace_core::provider::{JsonRpcWalletProvider, RpcDialect, WalletProviders};
use xspace_core::tokens::{FileStore, TokenRegistry};
use xspace_sdk::objects::{MAX_TOKEN_DECIMALS, RequiredWallet, Token};

/// Cross-space wallet gate and token selection
#[derive(Parser, Debug)]
#[command(name = "xspace-cli")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./xspace-config.toml")]
    config: PathBuf,

    /// Override the directory the token selection is stored in
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Override the wallet JSON-RPC endpoint
    #[arg(long, env = "XSPACE_WALLET_ENDPOINT")]
    endpoint: Option<Url>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the gate state of every required wallet
    Status,
    /// Take one step towards getting a wallet onto its network
    Connect {
        /// core, bridge, either-core-preferred or either-bridge-preferred
        required: RequiredWallet,
    },
    /// Print gate states as they change, until interrupted
    Watch {
        #[arg(required = true)]
        required: Vec<RequiredWallet>,
    },
    /// Inspect or change the token selection
    Tokens {
        #[command(subcommand)]
        command: TokensCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TokensCommand {
    /// List pinned and recent tokens, marking the current one
    List,
    /// Make a token current
    ///
    /// Tokens not listed yet need at least a symbol and decimals.
    Select {
        address: CompactString,
        #[arg(long)]
        symbol: Option<CompactString>,
        #[arg(long)]
        decimals: Option<u8>,
        #[arg(long)]
        mapped_address: Option<CompactString>,
        #[arg(long)]
        bridge_managed: bool,
    },
    /// Forget a recent token
    Remove { address: CompactString },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::debug!("Starting xspace-cli v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let overrides = ConfigOverrides {
        store_dir: args.store_dir.clone(),
        endpoint: args.endpoint.clone(),
    };
    let loaded = ConfigLoader::new(&args.config, overrides)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    tracing::debug!("Configuration loaded from {:?}", args.config);

    let (notice_tx, notice_rx) = notice_channel();
    let notices = NoticeSink::new(notice_tx);

    match args.command {
        Command::Status => {
            let gate = build_gate(&loaded, notices)?;
            for view in gate.evaluate_many(&RequiredWallet::ALL).await {
                println!("{}", format_view(&view));
            }
        }
        Command::Connect { required } => {
            let gate = build_gate(&loaded, notices)?;
            let step = gate.request(required).await;
            print_notices(notice_rx);
            println!("{}", format_view(&step.view));
            println!("{}", describe_outcome(&step.outcome));
            if is_failure(&step.outcome) {
                bail!("{} did not become ready", required);
            }
        }
        Command::Watch { required } => {
            let gate = Arc::new(build_gate(&loaded, notices)?);
            let shutdown_rx = spawn_shutdown_watch();
            let monitor = GateMonitor::new(gate, required, loaded.runtime.gate_poll_interval);
            let (mut views_rx, handle) = monitor.spawn(shutdown_rx).await;

            loop {
                for view in views_rx.borrow_and_update().iter() {
                    println!("{}", format_view(view));
                }
                if views_rx.changed().await.is_err() {
                    break;
                }
            }
            handle.await.context("gate monitor task failed")?;
        }
        Command::Tokens { command } => {
            let store = Arc::new(FileStore::new(&loaded.store_dir));
            tracing::debug!("Token selection stored in {:?}", store.dir());
            let registry = TokenRegistry::load(loaded.runtime.tokens.clone(), store).await;
            run_tokens_command(&registry, command).await?;
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build a gate whose two wallets share the configured endpoint.
fn build_gate(loaded: &LoadedConfig, notices: NoticeSink) -> anyhow::Result<ChainGate> {
    let Some(endpoint) = loaded.endpoint.clone() else {
        bail!("no wallet endpoint configured, set [wallet].endpoint or --endpoint");
    };
    let providers = WalletProviders::new(
        Arc::new(JsonRpcWalletProvider::new(
            RpcDialect::Conflux,
            endpoint.clone(),
        )),
        Arc::new(JsonRpcWalletProvider::new(RpcDialect::Ethereum, endpoint)),
    );
    Ok(ChainGate::new(
        providers,
        loaded.runtime.networks.clone(),
        notices,
    ))
}

async fn run_tokens_command(
    registry: &TokenRegistry,
    command: TokensCommand,
) -> anyhow::Result<()> {
    match command {
        TokensCommand::List => {
            let current = registry.current().await;
            for token in registry.list().await {
                let marker = if token.same_as(&current) { "*" } else { " " };
                println!("{marker} {}", format_token(&token));
            }
        }
        TokensCommand::Select {
            address,
            symbol,
            decimals,
            mapped_address,
            bridge_managed,
        } => {
            let token = match registry.get(&address).await {
                Some(token) => token,
                None => {
                    let (Some(symbol), Some(decimals)) = (symbol, decimals) else {
                        bail!("token {address} is not listed, pass --symbol and --decimals");
                    };
                    if decimals > MAX_TOKEN_DECIMALS {
                        bail!("at most {MAX_TOKEN_DECIMALS} decimals are supported");
                    }
                    Token {
                        native_address: address,
                        mapped_address: mapped_address.unwrap_or_default(),
                        symbol,
                        decimals,
                        is_native: false,
                        is_bridge_managed: bridge_managed,
                        name: None,
                        icon: None,
                        native_space: None,
                    }
                }
            };
            registry.set_current(token).await;
            println!("current: {}", format_token(&registry.current().await));
        }
        TokensCommand::Remove { address } => {
            if registry.remove(&address).await {
                println!("removed {address}");
            } else {
                bail!("{address} is not a recent token");
            }
        }
    }
    Ok(())
}

fn print_notices(mut notice_rx: NoticeReceiver) {
    while let Ok(notice) = notice_rx.try_recv() {
        println!("> {notice}");
    }
}

fn format_view(view: &GateView) -> String {
    let chain = view
        .chain_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    format!(
        "{:<24} {:<14} {:<20} status={:?} chain={} expected={}",
        view.required.to_string(),
        view.wallet.to_string(),
        format!("{:?}", view.state),
        view.status,
        chain,
        view.expected_chain_id
    )
}

fn format_token(token: &Token) -> String {
    let mut line = format!("{:<8} {}", token.symbol, token.native_address);
    if !token.mapped_address.is_empty() {
        line.push_str(&format!(" -> {}", token.mapped_address));
    }
    line
}

fn describe_outcome(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::AlreadyReady => "ready".to_string(),
        StepOutcome::Connected => "connected".to_string(),
        StepOutcome::ConnectRejected => "connect request rejected".to_string(),
        StepOutcome::ConnectFailed(e) => format!("connect failed: {e}"),
        StepOutcome::Switched => "switched network".to_string(),
        StepOutcome::SwitchRejected => "switch request rejected".to_string(),
        StepOutcome::SwitchFailed(e) => format!("switch failed: {e}"),
        StepOutcome::ChainAdded => "network added, run connect again to switch".to_string(),
        StepOutcome::AddChainRejected => "add network request rejected".to_string(),
        StepOutcome::AddChainFailed(e) => format!("add network failed: {e}"),
        StepOutcome::Busy => "another request is outstanding".to_string(),
        StepOutcome::Unavailable => "wallet unavailable".to_string(),
        StepOutcome::Detached => "detached".to_string(),
    }
}

fn is_failure(outcome: &StepOutcome) -> bool {
    matches!(
        outcome,
        StepOutcome::ConnectRejected
            | StepOutcome::ConnectFailed(_)
            | StepOutcome::SwitchRejected
            | StepOutcome::SwitchFailed(_)
            | StepOutcome::AddChainRejected
            | StepOutcome::AddChainFailed(_)
            | StepOutcome::Unavailable
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_watch_args() {
        let args = Args::try_parse_from([
            "xspace-cli",
            "--endpoint",
            "http://127.0.0.1:8545",
            "watch",
            "core",
            "either-bridge-preferred",
        ])
        .unwrap();
        match args.command {
            Command::Watch { required } => assert_eq!(
                required,
                vec![RequiredWallet::Core, RequiredWallet::EitherBridgePreferred]
            ),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Args::try_parse_from(["xspace-cli", "connect", "both"]).is_err());
    }

    #[test]
    fn test_parse_tokens_select() {
        let args = Args::try_parse_from([
            "xspace-cli",
            "tokens",
            "select",
            "cfx:usdt",
            "--symbol",
            "USDT",
            "--decimals",
            "6",
        ])
        .unwrap();
        let Command::Tokens {
            command: TokensCommand::Select {
                address, decimals, ..
            },
        } = args.command
        else {
            panic!("unexpected command");
        };
        assert_eq!(address, "cfx:usdt");
        assert_eq!(decimals, Some(6));
    }

    #[test]
    fn test_failure_outcomes() {
        assert!(!is_failure(&StepOutcome::ChainAdded));
        assert!(!is_failure(&StepOutcome::Busy));
        assert!(is_failure(&StepOutcome::SwitchRejected));
    }
}
