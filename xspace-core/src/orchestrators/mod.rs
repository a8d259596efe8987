//! Transfer and withdraw orchestration.
//!
//! Each orchestrator owns one in-flight flag. A submission that arrives while
//! another one on the same orchestrator is outstanding is rejected before any
//! call goes out.

pub mod single_flight;
pub mod transfer;
pub mod withdraw;

pub use single_flight::{FlightGuard, SingleFlight};
pub use transfer::{
    TransferError, TransferOrchestrator, TransferPhase, TransferReceipt, TransferRequest,
    TransferStep, ValidationError,
};
pub use withdraw::{
    WithdrawError, WithdrawOrchestrator, WithdrawReceipt, WithdrawableBalance,
    WithdrawablePoller, withdraw_required_wallets,
};
