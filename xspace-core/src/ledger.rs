//! Balance, allowance and signed bridge calls.
//!
//! The core never talks to a chain itself. Everything it needs to read or
//! submit goes through [`BridgeLedger`], and every call is an opaque
//! asynchronous operation that either succeeds or fails.

use crate::provider::ProviderError;
use async_trait::async_trait;
use compact_str::CompactString;
use rust_decimal::Decimal;
use std::fmt;
use xspace_sdk::config::ApprovalPolicy;
use xspace_sdk::objects::{Space, Token};

/// Allowance requested by an approve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproveAmount {
    Exact(Decimal),
    Unlimited,
}

impl ApproveAmount {
    /// The approve amount `policy` asks for when `amount` is about to be
    /// transferred.
    pub fn for_policy(policy: ApprovalPolicy, amount: Decimal) -> Self {
        match policy {
            ApprovalPolicy::Exact => ApproveAmount::Exact(amount),
            ApprovalPolicy::Unlimited => ApproveAmount::Unlimited,
        }
    }
}

impl fmt::Display for ApproveAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApproveAmount::Exact(amount) => write!(f, "{amount}"),
            ApproveAmount::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Ledger capability consumed by the orchestrators.
#[async_trait]
pub trait BridgeLedger: Send + Sync {
    /// Balance of `token` held by the user on `space`.
    async fn get_balance(&self, token: &Token, space: Space) -> Result<Decimal, ProviderError>;

    /// Amount `spender` may currently pull from the user's `token` balance.
    async fn get_allowance(&self, token: &Token, spender: &str) -> Result<Decimal, ProviderError>;

    /// Amount of `token` already bridged and waiting to be withdrawn.
    async fn get_withdrawable(&self, token: &Token) -> Result<Decimal, ProviderError>;

    /// eSpace address mirroring the connected Core account. Native CFX sent
    /// there from any eSpace wallet becomes withdrawable to Core.
    async fn espace_mirror_address(&self) -> Result<CompactString, ProviderError>;

    /// Raise `spender`'s allowance over `token`.
    async fn approve(
        &self,
        token: &Token,
        spender: &str,
        amount: ApproveAmount,
    ) -> Result<(), ProviderError>;

    /// Send `amount` of `token` to the bridge.
    async fn transfer_to_bridge(&self, token: &Token, amount: Decimal)
    -> Result<(), ProviderError>;

    /// Withdraw `amount` of bridged `token`.
    async fn withdraw(&self, token: &Token, amount: Decimal) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_amount_for_policy() {
        let five = Decimal::from(5);
        assert_eq!(
            ApproveAmount::for_policy(ApprovalPolicy::Exact, five),
            ApproveAmount::Exact(five)
        );
        assert_eq!(
            ApproveAmount::for_policy(ApprovalPolicy::Unlimited, five),
            ApproveAmount::Unlimited
        );
        assert_eq!(ApproveAmount::Exact(five).to_string(), "5");
        assert_eq!(ApproveAmount::Unlimited.to_string(), "unlimited");
    }
}
