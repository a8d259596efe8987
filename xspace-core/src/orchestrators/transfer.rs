//! TransferOrchestrator.
//!
//! Sends tokens to the bridge in two phases: raise the bridge's allowance if
//! it does not cover the amount, then transfer. Every phase validates the
//! request against freshly read balances first, and every phase runs under
//! the orchestrator's single in-flight flag, so repeated clicks never produce
//! a second on-chain submission. After [`TransferOrchestrator::detach`] a phase
//! still waiting on the ledger drops its result without notices.

use super::single_flight::{FlightGuard, SingleFlight};
use crate::events::{Notice, NoticeSink};
use crate::ledger::{ApproveAmount, BridgeLedger};
use crate::provider::ProviderError;
use compact_str::CompactString;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use xspace_sdk::config::{ApprovalPolicy, TokensConfig};
use xspace_sdk::objects::{Space, Token};

// ---------------------------------------------------------------------------
// Public data types
// ---------------------------------------------------------------------------

/// Where a transfer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// The allowance does not cover the amount.
    NeedsApprove,
    /// Ready to transfer.
    NeedsTransfer,
    /// Transferred.
    Done,
}

/// The call a transfer failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    ReadBalance,
    ReadAllowance,
    Approve,
    Transfer,
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStep::ReadBalance => "read balance",
            TransferStep::ReadAllowance => "read allowance",
            TransferStep::Approve => "approve",
            TransferStep::Transfer => "transfer",
        };
        f.write_str(s)
    }
}

/// A request to move `amount` of `token` out of `source_space`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub token: Token,
    pub amount: Decimal,
    pub source_space: Space,
}

impl TransferRequest {
    pub fn new(token: Token, amount: Decimal, source_space: Space) -> Self {
        Self {
            token,
            amount,
            source_space,
        }
    }
}

/// Reasons a request is refused before anything is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The amount is zero or negative.
    #[error("amount must be greater than zero")]
    NotPositive,

    /// The amount is smaller than one unit of the token.
    #[error("amount is below the smallest unit {min}")]
    BelowMinUnit { min: Decimal },

    /// The amount has more fractional digits than the token.
    #[error("amount has more than {decimals} decimal places")]
    TooPrecise { decimals: u8 },

    /// The amount is above what the user can send.
    #[error("amount {amount} exceeds the available {max}")]
    ExceedsMax { amount: Decimal, max: Decimal },

    /// Bridged native funds are still waiting to be withdrawn.
    #[error("{withdrawable} already bridged, withdraw it first")]
    WithdrawablePending { withdrawable: Decimal },

    /// The bridge may not pull the amount yet.
    #[error("allowance {allowance} does not cover {amount}")]
    InsufficientAllowance { allowance: Decimal, amount: Decimal },
}

#[derive(Debug, Error)]
pub enum TransferError {
    /// The request was refused before any submission.
    #[error("invalid transfer: {0}")]
    Validation(#[from] ValidationError),

    /// Another submission on this orchestrator is still in flight.
    #[error("a transfer is already in progress")]
    ConcurrencyRejected,

    /// The user dismissed the wallet prompt.
    #[error("user rejected the {step} request")]
    UserRejected { step: TransferStep },

    /// A ledger call failed.
    #[error("{step} failed: {source}")]
    Provider {
        step: TransferStep,
        #[source]
        source: ProviderError,
    },

    /// The orchestrator was detached while the phase was waiting on the
    /// ledger.
    #[error("transfer detached before it finished")]
    Detached,

    /// The approve call went through but the allowance still does not cover
    /// the amount.
    #[error("allowance {allowance} still below {amount} after approval")]
    AllowanceNotRaised { allowance: Decimal, amount: Decimal },
}

impl TransferError {
    /// Whether the caller should clear the amount input. Never after a
    /// failure, so the user can retry with the same entry.
    pub fn clear_amount(&self) -> bool {
        false
    }

    fn from_provider(step: TransferStep, error: ProviderError) -> Self {
        if error.is_user_rejected() {
            TransferError::UserRejected { step }
        } else {
            TransferError::Provider {
                step,
                source: error,
            }
        }
    }
}

/// A finished transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub amount: Decimal,
    /// Whether an approve call was submitted on the way.
    pub approved: bool,
}

impl TransferReceipt {
    pub fn phase(&self) -> TransferPhase {
        TransferPhase::Done
    }

    /// Whether the caller should clear the amount input.
    pub fn clear_amount(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// TransferOrchestrator
// ---------------------------------------------------------------------------

pub struct TransferOrchestrator {
    ledger: Arc<dyn BridgeLedger>,
    spender: CompactString,
    policy: ApprovalPolicy,
    native_gas_reserve: Decimal,
    notices: NoticeSink,
    flight: SingleFlight,
}

impl TransferOrchestrator {
    /// Create a new TransferOrchestrator.
    ///
    /// # Arguments
    ///
    /// * `ledger` - Balance reads and signed bridge calls
    /// * `tokens` - Supplies the bridge spender and the native gas reserve
    /// * `policy` - How much allowance an approve call asks for
    /// * `notices` - Where results are reported
    pub fn new(
        ledger: Arc<dyn BridgeLedger>,
        tokens: &TokensConfig,
        policy: ApprovalPolicy,
        notices: NoticeSink,
    ) -> Self {
        Self {
            ledger,
            spender: tokens.bridge_spender.clone(),
            policy,
            native_gas_reserve: tokens.native_gas_reserve,
            notices,
            flight: SingleFlight::new(),
        }
    }

    /// Whether a phase is currently running.
    pub fn in_flight(&self) -> bool {
        self.flight.is_busy()
    }

    /// Stop reacting to the phase currently in flight.
    ///
    /// The outstanding ledger call is not aborted. Its result is dropped
    /// without notices and the phase returns [`TransferError::Detached`].
    pub fn detach(&self) {
        self.flight.detach();
    }

    /// Largest amount of `token` that can leave `space`.
    ///
    /// For the native asset the configured gas reserve is held back.
    pub async fn max_available_balance(
        &self,
        token: &Token,
        space: Space,
    ) -> Result<Decimal, ProviderError> {
        let balance = self.ledger.get_balance(token, space).await?;
        if token.is_native {
            Ok((balance - self.native_gas_reserve).max(Decimal::ZERO))
        } else {
            Ok(balance)
        }
    }

    /// Work out which phase `request` is in.
    pub async fn check(&self, request: &TransferRequest) -> Result<TransferPhase, TransferError> {
        let flight = self.begin()?;
        validate_amount(request)?;
        let phase = self.allowance_phase(request).await;
        settle(&flight, phase)
    }

    /// Run the approve phase.
    ///
    /// Submits nothing if the allowance already covers the amount. Otherwise
    /// approves and reads the allowance again, which must now cover the
    /// amount.
    pub async fn approve(&self, request: &TransferRequest) -> Result<TransferPhase, TransferError> {
        let flight = self.begin()?;
        let result = self.run_approve(request, &flight).await;
        settle(&flight, result)
    }

    /// Run the transfer phase.
    pub async fn transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, TransferError> {
        let flight = self.begin()?;
        let result = self.run_transfer(request, &flight).await;
        settle(&flight, result)
    }

    /// Run every remaining phase of `request`.
    pub async fn submit(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        let flight = self.begin()?;
        let result = self.run_submit(request, &flight).await;
        settle(&flight, result)
    }

    // -- Private helpers ----------------------------------------------------

    async fn run_approve(
        &self,
        request: &TransferRequest,
        flight: &FlightGuard<'_>,
    ) -> Result<TransferPhase, TransferError> {
        self.validate(request, flight).await?;
        if self.allowance_phase(request).await? == TransferPhase::NeedsApprove {
            self.approve_and_confirm(request, flight).await?;
        }
        Ok(TransferPhase::NeedsTransfer)
    }

    async fn run_transfer(
        &self,
        request: &TransferRequest,
        flight: &FlightGuard<'_>,
    ) -> Result<TransferReceipt, TransferError> {
        self.validate(request, flight).await?;
        if self.allowance_phase(request).await? == TransferPhase::NeedsApprove {
            let allowance = self.read_allowance(request).await?;
            return Err(ValidationError::InsufficientAllowance {
                allowance,
                amount: request.amount,
            }
            .into());
        }
        self.send(request, false, flight).await
    }

    async fn run_submit(
        &self,
        request: &TransferRequest,
        flight: &FlightGuard<'_>,
    ) -> Result<TransferReceipt, TransferError> {
        self.validate(request, flight).await?;

        let mut approved = false;
        if self.allowance_phase(request).await? == TransferPhase::NeedsApprove {
            self.approve_and_confirm(request, flight).await?;
            approved = true;
            // Balances may have moved while the approval was pending.
            self.validate(request, flight).await?;
        }
        self.send(request, approved, flight).await
    }

    fn begin(&self) -> Result<FlightGuard<'_>, TransferError> {
        self.flight.try_begin().ok_or_else(|| {
            debug!("Transfer already in flight, ignoring submission");
            TransferError::ConcurrencyRejected
        })
    }

    /// Full validation against current balances.
    async fn validate(
        &self,
        request: &TransferRequest,
        flight: &FlightGuard<'_>,
    ) -> Result<(), TransferError> {
        validate_amount(request)?;
        let token = &request.token;

        if token.is_native && token.is_bridge_managed {
            let withdrawable = self
                .ledger
                .get_withdrawable(token)
                .await
                .map_err(|e| TransferError::from_provider(TransferStep::ReadBalance, e))?;
            if withdrawable > Decimal::ZERO {
                if flight.is_detached() {
                    return Err(TransferError::Detached);
                }
                info!(token = %token.symbol, %withdrawable, "Withdrawable balance pending, refusing transfer");
                self.notices.emit(Notice::WithdrawablePending {
                    symbol: token.symbol.to_string(),
                    withdrawable,
                });
                return Err(ValidationError::WithdrawablePending { withdrawable }.into());
            }
        }

        let max = self
            .max_available_balance(token, request.source_space)
            .await
            .map_err(|e| TransferError::from_provider(TransferStep::ReadBalance, e))?;
        if request.amount > max {
            return Err(ValidationError::ExceedsMax {
                amount: request.amount,
                max,
            }
            .into());
        }
        Ok(())
    }

    async fn read_allowance(&self, request: &TransferRequest) -> Result<Decimal, TransferError> {
        self.ledger
            .get_allowance(&request.token, &self.spender)
            .await
            .map_err(|e| TransferError::from_provider(TransferStep::ReadAllowance, e))
    }

    async fn allowance_phase(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferPhase, TransferError> {
        if request.token.is_native {
            return Ok(TransferPhase::NeedsTransfer);
        }
        let allowance = self.read_allowance(request).await?;
        if allowance < request.amount {
            Ok(TransferPhase::NeedsApprove)
        } else {
            Ok(TransferPhase::NeedsTransfer)
        }
    }

    async fn approve_and_confirm(
        &self,
        request: &TransferRequest,
        flight: &FlightGuard<'_>,
    ) -> Result<(), TransferError> {
        if flight.is_detached() {
            return Err(TransferError::Detached);
        }
        let token = &request.token;
        let amount = ApproveAmount::for_policy(self.policy, request.amount);
        info!(token = %token.symbol, %amount, spender = %self.spender, "Submitting approve");

        let approved = self.ledger.approve(token, &self.spender, amount).await;
        if flight.is_detached() {
            debug!(token = %token.symbol, "Transfer detached, ignoring approve result");
            return Err(TransferError::Detached);
        }
        if let Err(e) = approved {
            warn!(token = %token.symbol, error = %e, "Approve failed");
            return Err(TransferError::from_provider(TransferStep::Approve, e));
        }
        self.notices.emit(Notice::ApproveSucceeded {
            symbol: token.symbol.to_string(),
        });

        let allowance = self.read_allowance(request).await?;
        if allowance < request.amount {
            warn!(token = %token.symbol, %allowance, amount = %request.amount, "Allowance not raised by approve");
            return Err(TransferError::AllowanceNotRaised {
                allowance,
                amount: request.amount,
            });
        }
        Ok(())
    }

    async fn send(
        &self,
        request: &TransferRequest,
        approved: bool,
        flight: &FlightGuard<'_>,
    ) -> Result<TransferReceipt, TransferError> {
        if flight.is_detached() {
            return Err(TransferError::Detached);
        }
        let token = &request.token;
        info!(token = %token.symbol, amount = %request.amount, space = ?request.source_space, "Submitting transfer to bridge");

        let sent = self.ledger.transfer_to_bridge(token, request.amount).await;
        if flight.is_detached() {
            debug!(token = %token.symbol, ok = sent.is_ok(), "Transfer detached, ignoring bridge result");
            return Err(TransferError::Detached);
        }
        match sent {
            Ok(()) => {
                self.notices.emit(Notice::TransferSucceeded {
                    symbol: token.symbol.to_string(),
                    amount: request.amount,
                });
                Ok(TransferReceipt {
                    amount: request.amount,
                    approved,
                })
            }
            Err(e) => {
                warn!(token = %token.symbol, error = %e, "Transfer to bridge failed");
                let error = TransferError::from_provider(TransferStep::Transfer, e);
                self.notices.emit(Notice::TransferFailed {
                    symbol: token.symbol.to_string(),
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }
}

/// A detached phase reports `Detached` whatever its own result was.
fn settle<T>(
    flight: &FlightGuard<'_>,
    result: Result<T, TransferError>,
) -> Result<T, TransferError> {
    if flight.is_detached() {
        Err(TransferError::Detached)
    } else {
        result
    }
}

/// Checks that need no network call.
fn validate_amount(request: &TransferRequest) -> Result<(), ValidationError> {
    if request.amount <= Decimal::ZERO {
        return Err(ValidationError::NotPositive);
    }
    let min = request.token.min_unit();
    if request.amount < min {
        return Err(ValidationError::BelowMinUnit { min });
    }
    if !request.token.fits_precision(request.amount) {
        return Err(ValidationError::TooPrecise {
            decimals: request.token.decimals,
        });
    }
    Ok(())
}
