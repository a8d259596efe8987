//! GateMonitor.
//!
//! Wallets change on their own: the user locks the wallet, picks another
//! account, or moves to another network from the wallet UI. The GateMonitor
//! re-evaluates a fixed set of required wallets on an interval and publishes
//! the views on a `watch` channel whenever any of them changes.

use super::{ChainGate, GateView};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use xspace_sdk::objects::RequiredWallet;

/// Receiver of the latest gate views, in the order they were requested.
pub type GateViewReceiver = watch::Receiver<Vec<GateView>>;

pub struct GateMonitor {
    gate: Arc<ChainGate>,
    required: Vec<RequiredWallet>,
    interval: Duration,
}

impl GateMonitor {
    /// Create a new GateMonitor.
    ///
    /// # Arguments
    ///
    /// * `gate` - The gate to evaluate
    /// * `required` - Required wallets to keep views for
    /// * `interval` - Time between evaluations
    pub fn new(gate: Arc<ChainGate>, required: Vec<RequiredWallet>, interval: Duration) -> Self {
        Self {
            gate,
            required,
            interval,
        }
    }

    /// Evaluate once, then keep evaluating in a background task until
    /// shutdown is signaled.
    pub async fn spawn(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (GateViewReceiver, JoinHandle<()>) {
        let initial = self.gate.evaluate_many(&self.required).await;
        let (views_tx, views_rx) = watch::channel(initial);
        let handle = tokio::spawn(self.run(shutdown_rx, views_tx));
        (views_rx, handle)
    }

    /// Run the monitor loop until shutdown is signaled, the shutdown sender
    /// is dropped, or every view receiver is gone.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        views_tx: watch::Sender<Vec<GateView>>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(required = ?self.required, interval = ?self.interval, "GateMonitor started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("GateMonitor received shutdown signal");
                        break;
                    }
                }

                _ = views_tx.closed() => {
                    debug!("All gate view receivers dropped");
                    break;
                }

                _ = ticker.tick() => {
                    let views = self.gate.evaluate_many(&self.required).await;
                    views_tx.send_if_modified(|current| {
                        if *current == views {
                            return false;
                        }
                        for view in &views {
                            debug!(
                                required = %view.required,
                                wallet = %view.wallet,
                                state = ?view.state,
                                "Gate view"
                            );
                        }
                        *current = views;
                        true
                    });
                }
            }
        }

        info!("GateMonitor shutdown complete");
    }
}
