//! WithdrawOrchestrator and WithdrawablePoller.
//!
//! Bridged funds wait on the bridge until the user withdraws them. The
//! orchestrator holds the last known withdrawable amount for the current token
//! and drives the withdrawal call; the poller keeps that amount fresh.
//!
//! The withdrawable amount is only ever written by a read from the ledger.
//! A submission reads it again itself and withdraws exactly that, so a second
//! click after a finished withdrawal finds nothing left instead of replaying
//! the cached amount.

use super::single_flight::{FlightGuard, SingleFlight};
use crate::events::{Notice, NoticeSink};
use crate::gate::GateView;
use crate::ledger::BridgeLedger;
use crate::provider::ProviderError;
use crate::tokens::TokenRegistry;
use compact_str::CompactString;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use xspace_sdk::objects::{RequiredWallet, Token};

/// Last withdrawable amount read for a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawableBalance {
    pub native_address: CompactString,
    pub amount: Decimal,
}

#[derive(Debug, Error)]
pub enum WithdrawError {
    /// The ledger reports nothing withdrawable.
    #[error("nothing to withdraw")]
    NothingToWithdraw,

    /// Another withdrawal is still in flight.
    #[error("a withdrawal is already in progress")]
    ConcurrencyRejected,

    /// The user dismissed the wallet prompt.
    #[error("user rejected the withdrawal")]
    UserRejected,

    /// The withdrawal call failed.
    #[error("withdrawal failed: {0}")]
    Provider(#[source] ProviderError),

    /// The orchestrator was detached while the withdrawal was outstanding.
    #[error("withdrawal detached before it finished")]
    Detached,
}

impl From<ProviderError> for WithdrawError {
    fn from(error: ProviderError) -> Self {
        if error.is_user_rejected() {
            WithdrawError::UserRejected
        } else {
            WithdrawError::Provider(error)
        }
    }
}

/// A finished withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawReceipt {
    pub amount: Decimal,
}

/// Wallets that must be ready before `token` can be withdrawn.
///
/// The native asset only needs the core wallet. Anything else is mirrored, so
/// both wallets have to confirm.
pub fn withdraw_required_wallets(token: &Token) -> Vec<RequiredWallet> {
    if token.is_native {
        vec![RequiredWallet::Core]
    } else {
        vec![RequiredWallet::Core, RequiredWallet::Bridge]
    }
}

// ---------------------------------------------------------------------------
// WithdrawOrchestrator
// ---------------------------------------------------------------------------

pub struct WithdrawOrchestrator {
    ledger: Arc<dyn BridgeLedger>,
    withdrawable: watch::Sender<Option<WithdrawableBalance>>,
    notices: NoticeSink,
    flight: SingleFlight,
}

impl WithdrawOrchestrator {
    /// Create a new WithdrawOrchestrator with an unknown withdrawable amount.
    pub fn new(ledger: Arc<dyn BridgeLedger>, notices: NoticeSink) -> Self {
        let (withdrawable, _) = watch::channel(None);
        Self {
            ledger,
            withdrawable,
            notices,
            flight: SingleFlight::new(),
        }
    }

    /// Subscribe to withdrawable amount changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<WithdrawableBalance>> {
        self.withdrawable.subscribe()
    }

    /// Known withdrawable amount of `token`.
    pub fn withdrawable(&self, token: &Token) -> Option<Decimal> {
        self.withdrawable
            .borrow()
            .as_ref()
            .filter(|w| w.native_address == token.native_address)
            .map(|w| w.amount)
    }

    pub fn update_withdrawable(&self, token: &Token, amount: Decimal) {
        let balance = WithdrawableBalance {
            native_address: token.native_address.clone(),
            amount,
        };
        self.withdrawable.send_if_modified(|current| {
            if current.as_ref() == Some(&balance) {
                return false;
            }
            debug!(token = %token.symbol, %amount, "Withdrawable balance updated");
            *current = Some(balance);
            true
        });
    }

    /// Forget the withdrawable amount, e.g. after the current token changed.
    pub fn clear_withdrawable(&self) {
        self.withdrawable.send_if_modified(|current| current.take().is_some());
    }

    /// Read the withdrawable amount of `token` from the ledger.
    ///
    /// A failed read keeps the previous value.
    pub async fn refresh(&self, token: &Token) -> Result<Decimal, ProviderError> {
        let amount = self.ledger.get_withdrawable(token).await?;
        self.update_withdrawable(token, amount);
        Ok(amount)
    }

    /// Whether a withdrawal is running.
    pub fn in_flight(&self) -> bool {
        self.flight.is_busy()
    }

    /// Whether the withdraw action should be clickable.
    ///
    /// `views` are the gate views for [`withdraw_required_wallets`].
    pub fn is_enabled(&self, token: &Token, views: &[GateView]) -> bool {
        views.iter().all(GateView::is_ready)
            && !self.in_flight()
            && self.withdrawable(token).is_some_and(|w| w > Decimal::ZERO)
    }

    /// Stop reacting to the withdrawal currently in flight.
    ///
    /// The outstanding ledger call is not aborted. Its result is dropped
    /// without notices and the submission returns [`WithdrawError::Detached`].
    pub fn detach(&self) {
        self.flight.detach();
    }

    /// Withdraw everything currently withdrawable of `token`.
    ///
    /// The amount is read from the ledger under the in-flight flag, never
    /// taken from the cached value.
    pub async fn submit(&self, token: &Token) -> Result<WithdrawReceipt, WithdrawError> {
        let flight = self.begin()?;
        let amount = match self.ledger.get_withdrawable(token).await {
            Ok(amount) => amount,
            Err(e) => {
                warn!(token = %token.symbol, error = %e, "Failed to read withdrawable balance");
                return Err(settle(&flight, WithdrawError::from(e)));
            }
        };
        if flight.is_detached() {
            return Err(WithdrawError::Detached);
        }
        self.update_withdrawable(token, amount);
        if amount <= Decimal::ZERO {
            debug!(token = %token.symbol, "Nothing to withdraw");
            return Err(WithdrawError::NothingToWithdraw);
        }

        info!(token = %token.symbol, %amount, "Submitting withdrawal");
        let result = self.ledger.withdraw(token, amount).await;
        if flight.is_detached() {
            debug!(token = %token.symbol, ok = result.is_ok(), "Withdrawal detached, ignoring result");
            return Err(WithdrawError::Detached);
        }
        match result {
            Ok(()) => {
                self.notices.emit(Notice::WithdrawSucceeded {
                    symbol: token.symbol.to_string(),
                    amount,
                });
                Ok(WithdrawReceipt { amount })
            }
            Err(e) => {
                warn!(token = %token.symbol, error = %e, "Withdrawal failed");
                let error = WithdrawError::from(e);
                self.notices.emit(Notice::WithdrawFailed {
                    symbol: token.symbol.to_string(),
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    fn begin(&self) -> Result<FlightGuard<'_>, WithdrawError> {
        self.flight.try_begin().ok_or_else(|| {
            debug!("Withdrawal already in flight, ignoring submission");
            WithdrawError::ConcurrencyRejected
        })
    }
}

fn settle(flight: &FlightGuard<'_>, error: WithdrawError) -> WithdrawError {
    if flight.is_detached() {
        WithdrawError::Detached
    } else {
        error
    }
}

// ---------------------------------------------------------------------------
// WithdrawablePoller
// ---------------------------------------------------------------------------

/// Refreshes the withdrawable amount of the current token on an interval.
pub struct WithdrawablePoller {
    orchestrator: Arc<WithdrawOrchestrator>,
    registry: Arc<TokenRegistry>,
    interval: Duration,
}

impl WithdrawablePoller {
    /// Create a new WithdrawablePoller.
    ///
    /// # Arguments
    ///
    /// * `orchestrator` - Holds the withdrawable amount being refreshed
    /// * `registry` - Supplies the current token on every tick
    /// * `interval` - Time between reads
    pub fn new(
        orchestrator: Arc<WithdrawOrchestrator>,
        registry: Arc<TokenRegistry>,
        interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            registry,
            interval,
        }
    }

    pub fn spawn(self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown_rx))
    }

    /// Run the polling loop until shutdown is signaled.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "WithdrawablePoller started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("WithdrawablePoller received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let token = self.registry.current().await;
                    if let Err(e) = self.orchestrator.refresh(&token).await {
                        warn!(token = %token.symbol, error = %e, "Failed to read withdrawable balance");
                    }
                }
            }
        }

        info!("WithdrawablePoller shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateState;
    use crate::testing::{self, LedgerCall, MockLedger, erc20_token, native_token};
    use crate::tokens::MemoryStore;
    use xspace_sdk::objects::{Wallet, WalletStatus};

    fn orchestrator(ledger: &Arc<MockLedger>) -> WithdrawOrchestrator {
        WithdrawOrchestrator::new(ledger.clone(), NoticeSink::disabled())
    }

    fn view(wallet: Wallet, state: GateState) -> GateView {
        GateView {
            required: match wallet {
                Wallet::Core => RequiredWallet::Core,
                Wallet::Bridge => RequiredWallet::Bridge,
            },
            wallet,
            state,
            status: WalletStatus::Active,
            chain_id: None,
            expected_chain_id: 0,
        }
    }

    #[tokio::test]
    async fn test_nothing_to_withdraw_is_a_no_op() {
        let ledger = Arc::new(MockLedger::new());
        let token = native_token();
        let orchestrator = orchestrator(&ledger);

        // Nothing on the ledger.
        assert!(matches!(
            orchestrator.submit(&token).await,
            Err(WithdrawError::NothingToWithdraw)
        ));

        orchestrator.refresh(&token).await.unwrap();
        assert_eq!(orchestrator.withdrawable(&token), Some(Decimal::ZERO));
        assert!(matches!(
            orchestrator.submit(&token).await,
            Err(WithdrawError::NothingToWithdraw)
        ));
        assert!(ledger.submissions().is_empty());
        assert!(!orchestrator.in_flight());
    }

    #[tokio::test]
    async fn test_withdraws_exactly_once() {
        let ledger = Arc::new(MockLedger::new());
        let token = native_token();
        ledger.set_withdrawable(&token, Decimal::from(3));
        let orchestrator = orchestrator(&ledger);
        orchestrator.refresh(&token).await.unwrap();

        let receipt = orchestrator.submit(&token).await.unwrap();
        assert_eq!(receipt.amount, Decimal::from(3));

        // The cache still says 3, but the second click reads the ledger.
        assert_eq!(orchestrator.withdrawable(&token), Some(Decimal::from(3)));
        assert!(matches!(
            orchestrator.submit(&token).await,
            Err(WithdrawError::NothingToWithdraw)
        ));
        assert_eq!(
            ledger.submissions(),
            vec![LedgerCall::Withdraw(Decimal::from(3))]
        );
        assert_eq!(orchestrator.withdrawable(&token), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_submit_withdraws_the_fresh_amount() {
        let ledger = Arc::new(MockLedger::new());
        let token = native_token();
        let orchestrator = orchestrator(&ledger);

        // Never polled.
        assert_eq!(orchestrator.withdrawable(&token), None);
        ledger.set_withdrawable(&token, Decimal::from(5));
        let receipt = orchestrator.submit(&token).await.unwrap();
        assert_eq!(receipt.amount, Decimal::from(5));
        assert_eq!(
            ledger.submissions(),
            vec![LedgerCall::Withdraw(Decimal::from(5))]
        );
    }

    #[tokio::test]
    async fn test_detach_drops_withdraw_result() {
        let ledger = Arc::new(MockLedger::new());
        let token = native_token();
        ledger.set_withdrawable(&token, Decimal::from(3));
        let (tx, mut notices) = crate::events::notice_channel();
        let orchestrator = WithdrawOrchestrator::new(ledger.clone(), NoticeSink::new(tx));
        ledger.latch.arm();

        let first = orchestrator.submit(&token);
        let detach = async {
            ledger.latch.started().await;
            orchestrator.detach();
            ledger.latch.release();
        };
        let (result, ()) = tokio::join!(first, detach);

        assert!(matches!(result, Err(WithdrawError::Detached)));
        assert_eq!(ledger.submissions().len(), 1);
        assert!(notices.try_recv().is_err());
        assert!(!orchestrator.in_flight());
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight_is_rejected() {
        let ledger = Arc::new(MockLedger::new());
        let token = native_token();
        ledger.set_withdrawable(&token, Decimal::from(3));
        let orchestrator = orchestrator(&ledger);
        orchestrator.refresh(&token).await.unwrap();
        ledger.latch.arm();

        let first = orchestrator.submit(&token);
        let second = async {
            ledger.latch.started().await;
            assert!(orchestrator.in_flight());
            let second = orchestrator.submit(&token).await;
            ledger.latch.release();
            second
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert!(matches!(second, Err(WithdrawError::ConcurrencyRejected)));
        assert_eq!(ledger.submissions().len(), 1);
        assert!(!orchestrator.in_flight());
    }

    #[tokio::test]
    async fn test_failure_clears_flag_and_keeps_amount() {
        let ledger = Arc::new(MockLedger::new());
        let token = native_token();
        ledger.set_withdrawable(&token, Decimal::from(3));
        ledger.fail_withdraw(ProviderError::UserRejected);
        let (tx, mut notices) = crate::events::notice_channel();
        let orchestrator = WithdrawOrchestrator::new(ledger.clone(), NoticeSink::new(tx));
        orchestrator.refresh(&token).await.unwrap();

        assert!(matches!(
            orchestrator.submit(&token).await,
            Err(WithdrawError::UserRejected)
        ));
        assert!(!orchestrator.in_flight());
        assert_eq!(orchestrator.withdrawable(&token), Some(Decimal::from(3)));
        assert!(matches!(
            notices.try_recv().unwrap(),
            Notice::WithdrawFailed { .. }
        ));

        orchestrator.submit(&token).await.unwrap();
        assert_eq!(
            notices.try_recv().unwrap(),
            Notice::WithdrawSucceeded {
                symbol: "CFX".into(),
                amount: Decimal::from(3)
            }
        );
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_value() {
        let ledger = Arc::new(MockLedger::new());
        let token = native_token();
        ledger.set_withdrawable(&token, Decimal::from(2));
        let orchestrator = orchestrator(&ledger);
        orchestrator.refresh(&token).await.unwrap();

        ledger.fail_reads(ProviderError::Transport("timeout".into()));
        assert!(orchestrator.refresh(&token).await.is_err());
        assert_eq!(orchestrator.withdrawable(&token), Some(Decimal::from(2)));
    }

    #[tokio::test]
    async fn test_enabled_rule() {
        let ledger = Arc::new(MockLedger::new());
        let native = native_token();
        let erc20 = erc20_token(1);
        ledger.set_withdrawable(&native, Decimal::from(1));
        let orchestrator = orchestrator(&ledger);

        assert_eq!(withdraw_required_wallets(&native), vec![RequiredWallet::Core]);
        assert_eq!(
            withdraw_required_wallets(&erc20),
            vec![RequiredWallet::Core, RequiredWallet::Bridge]
        );

        let core_ready = [view(Wallet::Core, GateState::Ready)];
        // Unknown amount.
        assert!(!orchestrator.is_enabled(&native, &core_ready));

        orchestrator.refresh(&native).await.unwrap();
        assert!(orchestrator.is_enabled(&native, &core_ready));
        assert!(!orchestrator.is_enabled(
            &native,
            &[view(Wallet::Core, GateState::ConnectedWrongChain)]
        ));
        // The stored amount belongs to another token.
        assert!(!orchestrator.is_enabled(&erc20, &core_ready));

        ledger.set_withdrawable(&erc20, Decimal::from(1));
        orchestrator.refresh(&erc20).await.unwrap();
        assert!(!orchestrator.is_enabled(
            &erc20,
            &[
                view(Wallet::Core, GateState::Ready),
                view(Wallet::Bridge, GateState::Disconnected)
            ]
        ));
        assert!(orchestrator.is_enabled(
            &erc20,
            &[
                view(Wallet::Core, GateState::Ready),
                view(Wallet::Bridge, GateState::Ready)
            ]
        ));
    }

    #[tokio::test]
    async fn test_poller_follows_current_token() {
        let ledger = Arc::new(MockLedger::new());
        let orchestrator = Arc::new(orchestrator(&ledger));
        let registry = Arc::new(
            TokenRegistry::load(testing::tokens_config(), Arc::new(MemoryStore::new())).await,
        );
        let token = erc20_token(1);
        registry.set_current(token.clone()).await;
        ledger.set_withdrawable(&token, Decimal::from(4));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut updates = orchestrator.subscribe();
        let handle = WithdrawablePoller::new(
            orchestrator.clone(),
            registry,
            Duration::from_millis(5),
        )
        .spawn(shutdown_rx);

        tokio::time::timeout(
            Duration::from_secs(5),
            updates.wait_for(|w| w.is_some()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(orchestrator.withdrawable(&token), Some(Decimal::from(4)));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_poller_stops_when_shutdown_sender_dropped() {
        let ledger = Arc::new(MockLedger::new());
        let registry = Arc::new(
            TokenRegistry::load(testing::tokens_config(), Arc::new(MemoryStore::new())).await,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        let handle = WithdrawablePoller::new(
            Arc::new(orchestrator(&ledger)),
            registry,
            Duration::from_millis(5),
        )
        .spawn(shutdown_rx);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
