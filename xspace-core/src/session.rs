//! CrossSpaceSession.
//!
//! Wires the gate, the token registry and both orchestrators together for one
//! user session. Every action first checks each wallet it touches through the
//! gate and only then hands over to its orchestrator, which re-validates
//! against fresh balances.
//!
//! The eSpace to Core direction has two modes. In advanced mode the connected
//! eSpace wallet is bypassed and the user is shown the eSpace mirror address
//! of their Core account instead.

use crate::events::NoticeSink;
use crate::gate::{ChainGate, GateView};
use crate::ledger::BridgeLedger;
use crate::orchestrators::{
    TransferError, TransferOrchestrator, TransferReceipt, TransferRequest, WithdrawError,
    WithdrawOrchestrator, WithdrawReceipt, WithdrawablePoller, withdraw_required_wallets,
};
use crate::provider::{ProviderError, WalletProvider, WalletProviders};
use crate::tokens::{KeyValueStore, TokenRegistry, TransferMode, TransferModeSetting};
use compact_str::CompactString;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use xspace_sdk::config::CrossSpaceConfig;
use xspace_sdk::objects::{RequiredWallet, Space, Token, Wallet};

/// Wallets a transfer to the bridge touches.
pub const TRANSFER_REQUIRED_WALLETS: [RequiredWallet; 2] =
    [RequiredWallet::Bridge, RequiredWallet::Core];

#[derive(Debug, Error)]
pub enum SessionError {
    /// A wallet the action needs is not connected to its network.
    #[error("{} is not ready ({:?})", .0.wallet, .0.state)]
    GateNotReady(GateView),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Withdraw(#[from] WithdrawError),

    /// Advanced mode is on, funds go to the mirror address instead.
    #[error("advanced transfer mode is on, send to the mirror address instead")]
    AdvancedMode,

    /// Reading the mirror address failed.
    #[error("failed to read the mirror address: {0}")]
    MirrorAddress(#[source] ProviderError),
}

pub struct CrossSpaceSession {
    config: CrossSpaceConfig,
    gate: Arc<ChainGate>,
    registry: Arc<TokenRegistry>,
    transfer_mode: TransferModeSetting,
    ledger: Arc<dyn BridgeLedger>,
    transfer: TransferOrchestrator,
    withdraw: Arc<WithdrawOrchestrator>,
}

impl CrossSpaceSession {
    /// Create a new session, loading the token selection from `store`.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated runtime configuration
    /// * `providers` - The core and bridge wallet providers
    /// * `ledger` - Balance reads and signed bridge calls
    /// * `store` - Persistence for the token selection
    /// * `notices` - Where user-facing results are reported
    pub async fn new(
        config: CrossSpaceConfig,
        providers: WalletProviders,
        ledger: Arc<dyn BridgeLedger>,
        store: Arc<dyn KeyValueStore>,
        notices: NoticeSink,
    ) -> Self {
        let gate = Arc::new(ChainGate::new(
            providers,
            config.networks.clone(),
            notices.clone(),
        ));
        let registry = Arc::new(TokenRegistry::load(config.tokens.clone(), store.clone()).await);
        let transfer_mode = TransferModeSetting::load(store).await;
        transfer_mode.on_token_changed(&registry.current().await).await;
        let transfer = TransferOrchestrator::new(
            ledger.clone(),
            &config.tokens,
            config.approval,
            notices.clone(),
        );
        let withdraw = Arc::new(WithdrawOrchestrator::new(ledger.clone(), notices));

        Self {
            config,
            gate,
            registry,
            transfer_mode,
            ledger,
            transfer,
            withdraw,
        }
    }

    pub fn config(&self) -> &CrossSpaceConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<ChainGate> {
        &self.gate
    }

    pub fn registry(&self) -> &Arc<TokenRegistry> {
        &self.registry
    }

    pub fn transfer_orchestrator(&self) -> &TransferOrchestrator {
        &self.transfer
    }

    pub fn withdraw_orchestrator(&self) -> &Arc<WithdrawOrchestrator> {
        &self.withdraw
    }

    /// Select `token` as the current token.
    ///
    /// The withdrawable amount belongs to the previous token and is dropped.
    pub async fn select_token(&self, token: Token) {
        self.transfer_mode.on_token_changed(&token).await;
        self.registry.set_current(token).await;
        self.withdraw.clear_withdrawable();
    }

    /// Apply the bridge wallet's current status to the token selection.
    pub async fn sync_bridge_wallet(&self) {
        let status = self.gate.providers().get(Wallet::Bridge).status().await;
        self.registry.on_bridge_wallet_status(status).await;
        let current = self.registry.current().await;
        self.transfer_mode.on_token_changed(&current).await;
    }

    pub async fn transfer_mode(&self) -> TransferMode {
        self.transfer_mode.current().await
    }

    /// Flip the transfer mode. Only the native token has an advanced mode.
    pub async fn toggle_transfer_mode(&self) -> TransferMode {
        let token = self.registry.current().await;
        self.transfer_mode.toggle(&token).await
    }

    /// eSpace address to send native CFX to in advanced mode.
    ///
    /// Needs the core wallet, whose account the address mirrors.
    pub async fn advanced_transfer_address(&self) -> Result<CompactString, SessionError> {
        self.require_ready(&[RequiredWallet::Core]).await?;
        self.ledger
            .espace_mirror_address()
            .await
            .map_err(SessionError::MirrorAddress)
    }

    /// Transfer `amount` of the current token to the bridge.
    ///
    /// Refused in advanced mode, where the eSpace wallet takes no part.
    pub async fn transfer(
        &self,
        amount: Decimal,
        source_space: Space,
    ) -> Result<TransferReceipt, SessionError> {
        if self.transfer_mode.current().await == TransferMode::Advanced {
            return Err(SessionError::AdvancedMode);
        }
        self.require_ready(&TRANSFER_REQUIRED_WALLETS).await?;
        let token = self.registry.current().await;
        let request = TransferRequest::new(token, amount, source_space);
        Ok(self.transfer.submit(&request).await?)
    }

    /// Withdraw the bridged balance of the current token.
    pub async fn withdraw(&self) -> Result<WithdrawReceipt, SessionError> {
        let token = self.registry.current().await;
        self.require_ready(&withdraw_required_wallets(&token)).await?;
        Ok(self.withdraw.submit(&token).await?)
    }

    /// Whether the withdraw action is currently clickable.
    pub async fn withdraw_enabled(&self) -> bool {
        let token = self.registry.current().await;
        let views = self
            .gate
            .evaluate_many(&withdraw_required_wallets(&token))
            .await;
        self.withdraw.is_enabled(&token, &views)
    }

    /// Start refreshing the withdrawable amount in the background.
    pub fn spawn_withdrawable_poller(&self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        WithdrawablePoller::new(
            self.withdraw.clone(),
            self.registry.clone(),
            self.config.withdrawable_poll_interval,
        )
        .spawn(shutdown_rx)
    }

    /// Stop acting on gate requests, transfers and withdrawals still in
    /// flight. Their results are dropped without notices.
    pub fn detach(&self) {
        info!("Session detached");
        self.gate.detach();
        self.transfer.detach();
        self.withdraw.detach();
    }

    async fn require_ready(&self, required: &[RequiredWallet]) -> Result<(), SessionError> {
        let views = self.gate.evaluate_many(required).await;
        match views.into_iter().find(|v| !v.is_ready()) {
            Some(view) => {
                debug!(required = %view.required, state = ?view.state, "Action gated");
                Err(SessionError::GateNotReady(view))
            }
            None => Ok(()),
        }
    }
}
