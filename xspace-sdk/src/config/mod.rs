//! Configuration types for the cross-space bridge gate.
//!
//! These types represent the validated runtime configuration used by the core
//! and can be shared across crates. The actual config loading/parsing is
//! handled by the binary crate.

mod network;
mod tokens;

pub use network::NetworksConfig;
pub use tokens::TokensConfig;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How much allowance an approve call grants the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    /// Approve exactly the amount about to be transferred.
    #[default]
    Exact,
    /// Approve the maximum allowance so later transfers skip the approve step.
    Unlimited,
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossSpaceConfig {
    /// Expected network per wallet.
    pub networks: NetworksConfig,
    /// Pinned tokens and bridge parameters.
    pub tokens: TokensConfig,
    /// Approval sufficiency rule.
    pub approval: ApprovalPolicy,
    /// How often the withdrawable balance is refreshed.
    pub withdrawable_poll_interval: Duration,
    /// How often a watched gate re-derives its state.
    pub gate_poll_interval: Duration,
}

impl CrossSpaceConfig {
    pub const DEFAULT_WITHDRAWABLE_POLL_INTERVAL: Duration = Duration::from_secs(3);
    pub const DEFAULT_GATE_POLL_INTERVAL: Duration = Duration::from_secs(1);
}
