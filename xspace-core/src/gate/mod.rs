//! ChainGate.
//!
//! The ChainGate is responsible for:
//! - Resolving a [`RequiredWallet`] to the one concrete wallet to act on
//! - Deriving that wallet's [`GateState`] from what the providers report
//! - Driving connect / switch / add-chain requests when the user clicks a
//!   gated action, and reporting the result as a [`GateStep`]
//!
//! Derivation is level-triggered: every evaluation reads the providers again,
//! so a wallet that drifts away from its network leaves `Ready` on the next
//! evaluation, and a wallet connected from its own UI becomes `Ready` without
//! going through the gate. The only state the gate keeps is the request it
//! currently has outstanding.

pub mod monitor;
pub mod resolve;

pub use monitor::GateMonitor;
pub use resolve::{GateState, derive_state, resolve_wallet};

use crate::events::{Notice, NoticeSink};
use crate::provider::{Observations, ProviderError, WalletProviders};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};
use xspace_sdk::config::NetworksConfig;
use xspace_sdk::objects::{Network, RequiredWallet, Wallet, WalletStatus};

/// What the gate shows for one required wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateView {
    pub required: RequiredWallet,
    pub wallet: Wallet,
    pub state: GateState,
    pub status: WalletStatus,
    pub chain_id: Option<u64>,
    pub expected_chain_id: u64,
}

impl GateView {
    pub fn is_ready(&self) -> bool {
        self.state == GateState::Ready
    }
}

/// Result of one click on a gated action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do, the action may run.
    AlreadyReady,
    Connected,
    ConnectRejected,
    ConnectFailed(ProviderError),
    Switched,
    SwitchRejected,
    SwitchFailed(ProviderError),
    /// The network was added. The wallet is still on the wrong chain until
    /// the user clicks again.
    ChainAdded,
    AddChainRejected,
    AddChainFailed(ProviderError),
    /// A connect or switch request is already outstanding, either from this
    /// gate or from the wallet's own activation prompt.
    Busy,
    /// The wallet is not installed.
    Unavailable,
    /// The gate was detached while the request was outstanding.
    Detached,
}

/// A click's outcome together with the view after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateStep {
    pub view: GateView,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    wallet: Wallet,
    state: GateState,
}

/// Wallet-authentication state machine shared by every gated action.
pub struct ChainGate {
    providers: WalletProviders,
    networks: NetworksConfig,
    notices: NoticeSink,
    pending: Mutex<Option<PendingRequest>>,
    epoch: AtomicU64,
}

/// Clears the gate's outstanding request when dropped.
struct PendingGuard<'a> {
    gate: &'a ChainGate,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        *self
            .gate
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl ChainGate {
    /// Create a new ChainGate.
    ///
    /// # Arguments
    ///
    /// * `providers` - The core and bridge wallet providers
    /// * `networks` - The network each wallet is expected on
    /// * `notices` - Where connect/switch results are reported
    pub fn new(providers: WalletProviders, networks: NetworksConfig, notices: NoticeSink) -> Self {
        Self {
            providers,
            networks,
            notices,
            pending: Mutex::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn networks(&self) -> &NetworksConfig {
        &self.networks
    }

    pub fn providers(&self) -> &WalletProviders {
        &self.providers
    }

    /// Read both wallets and derive the view for `required`.
    pub async fn evaluate(&self, required: RequiredWallet) -> GateView {
        let observations = self.providers.observe_all().await;
        self.view_from(required, &observations)
    }

    /// Derive views for several required wallets from a single reading.
    pub async fn evaluate_many(&self, required: &[RequiredWallet]) -> Vec<GateView> {
        let observations = self.providers.observe_all().await;
        required
            .iter()
            .map(|r| self.view_from(*r, &observations))
            .collect()
    }

    /// Derive the view for `required` from `observations`.
    ///
    /// The steady state comes from the observations alone. An outstanding
    /// request on the resolved wallet shows as `Connecting`/`Switching` unless
    /// the wallet is already observed ready.
    pub fn view_from(&self, required: RequiredWallet, observations: &Observations) -> GateView {
        let wallet = resolve_wallet(required, observations, &self.networks);
        let observation = observations.get(wallet);
        let expected = self.networks.for_wallet(wallet);
        let mut state = derive_state(&observation, expected);
        if state != GateState::Ready
            && let Some(pending) = self.pending()
            && pending.wallet == wallet
        {
            state = pending.state;
        }
        GateView {
            required,
            wallet,
            state,
            status: observation.status,
            chain_id: observation.chain_id,
            expected_chain_id: expected.network_id,
        }
    }

    /// Handle a click on an action gated on `required`.
    ///
    /// Connects a disconnected wallet or switches a wallet on the wrong
    /// network, then re-derives the view. Nothing is retried; a rejected or
    /// failed request leaves the wallet where it was.
    pub async fn request(&self, required: RequiredWallet) -> GateStep {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let view = self.evaluate(required).await;

        let outcome = match view.state {
            GateState::Ready => StepOutcome::AlreadyReady,
            GateState::Connecting | GateState::Switching => StepOutcome::Busy,
            GateState::Disconnected if view.status == WalletStatus::NotInstalled => {
                StepOutcome::Unavailable
            }
            GateState::Disconnected => {
                let Some(pending) = self.begin(view.wallet, GateState::Connecting) else {
                    return GateStep {
                        view,
                        outcome: StepOutcome::Busy,
                    };
                };
                let outcome = self.connect(view.wallet).await;
                drop(pending);
                outcome
            }
            GateState::ConnectedWrongChain => {
                let Some(pending) = self.begin(view.wallet, GateState::Switching) else {
                    return GateStep {
                        view,
                        outcome: StepOutcome::Busy,
                    };
                };
                let outcome = self.switch(view.wallet, epoch).await;
                drop(pending);
                outcome
            }
        };

        match outcome {
            StepOutcome::AlreadyReady | StepOutcome::Busy | StepOutcome::Unavailable => {
                return GateStep { view, outcome };
            }
            _ => {}
        }

        if self.is_detached(epoch) {
            debug!(wallet = %view.wallet, ?outcome, "Gate detached, ignoring request result");
            return GateStep {
                view,
                outcome: StepOutcome::Detached,
            };
        }

        self.report(view.wallet, &outcome);
        let view = self.evaluate(required).await;
        info!(
            required = %required,
            wallet = %view.wallet,
            state = ?view.state,
            ?outcome,
            "Gate request finished"
        );
        GateStep { view, outcome }
    }

    /// Stop reacting to requests already in flight.
    ///
    /// The outstanding provider call is not aborted. Its result is dropped
    /// without notices and the request reports [`StepOutcome::Detached`].
    pub fn detach(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    // -- Private helpers ----------------------------------------------------

    fn pending(&self) -> Option<PendingRequest> {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the request slot. Returns `None` if a request is outstanding.
    fn begin(&self, wallet: Wallet, state: GateState) -> Option<PendingGuard<'_>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.is_some() {
            return None;
        }
        *pending = Some(PendingRequest { wallet, state });
        Some(PendingGuard { gate: self })
    }

    fn is_detached(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch
    }

    async fn connect(&self, wallet: Wallet) -> StepOutcome {
        info!(wallet = %wallet, "Requesting wallet connection");
        match self.providers.get(wallet).connect().await {
            Ok(()) => StepOutcome::Connected,
            Err(e) if e.is_user_rejected() => StepOutcome::ConnectRejected,
            Err(e) => {
                debug!(wallet = %wallet, code = ?e.code(), error = %e, "Wallet connection failed");
                StepOutcome::ConnectFailed(e)
            }
        }
    }

    async fn switch(&self, wallet: Wallet, epoch: u64) -> StepOutcome {
        let network = self.networks.for_wallet(wallet);
        let provider = self.providers.get(wallet);
        info!(wallet = %wallet, network = %network.name, "Requesting network switch");

        match provider.switch_chain(network).await {
            Ok(()) => StepOutcome::Switched,
            Err(ProviderError::ChainNotAdded) => {
                if self.is_detached(epoch) {
                    return StepOutcome::Detached;
                }
                self.add_chain(wallet, network).await
            }
            Err(e) if e.is_user_rejected() => StepOutcome::SwitchRejected,
            Err(e) => {
                debug!(wallet = %wallet, code = ?e.code(), error = %e, "Network switch failed");
                StepOutcome::SwitchFailed(e)
            }
        }
    }

    async fn add_chain(&self, wallet: Wallet, network: &Network) -> StepOutcome {
        info!(wallet = %wallet, network = %network.name, "Network unknown to wallet, requesting add");
        match self.providers.get(wallet).add_chain(network).await {
            Ok(()) => StepOutcome::ChainAdded,
            Err(e) if e.is_user_rejected() => StepOutcome::AddChainRejected,
            Err(e) => {
                debug!(wallet = %wallet, code = ?e.code(), error = %e, "Adding network failed");
                StepOutcome::AddChainFailed(e)
            }
        }
    }

    fn report(&self, wallet: Wallet, outcome: &StepOutcome) {
        let notice = match outcome {
            StepOutcome::Connected => Notice::ConnectSucceeded { wallet },
            StepOutcome::ConnectRejected => Notice::ConnectRejected { wallet },
            StepOutcome::Switched => Notice::SwitchSucceeded {
                wallet,
                network: self.networks.for_wallet(wallet).name.clone(),
            },
            StepOutcome::SwitchRejected => Notice::SwitchRejected { wallet },
            StepOutcome::AddChainRejected => Notice::AddChainRejected { wallet },
            _ => return,
        };
        self.notices.emit(notice);
    }
}
