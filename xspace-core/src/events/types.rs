//! Notice type definitions.
//!
//! Notices are transient, user-facing messages. They carry just enough to
//! render a toast; nothing downstream depends on their delivery.

use rust_decimal::Decimal;
use std::fmt;
use xspace_sdk::objects::Wallet;

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A wallet connected.
    ConnectSucceeded { wallet: Wallet },
    /// The user dismissed the connect prompt.
    ConnectRejected { wallet: Wallet },
    /// A wallet switched to its expected network.
    SwitchSucceeded { wallet: Wallet, network: String },
    /// The user dismissed the switch prompt.
    SwitchRejected { wallet: Wallet },
    /// The user dismissed the add-network prompt.
    AddChainRejected { wallet: Wallet },
    /// A transfer was refused because bridged funds are still waiting to be
    /// withdrawn.
    WithdrawablePending { symbol: String, withdrawable: Decimal },
    /// The bridge allowance was raised.
    ApproveSucceeded { symbol: String },
    /// Tokens were transferred to the bridge.
    TransferSucceeded { symbol: String, amount: Decimal },
    /// The transfer call failed or was rejected.
    TransferFailed { symbol: String, reason: String },
    /// Bridged funds were withdrawn.
    WithdrawSucceeded { symbol: String, amount: Decimal },
    /// The withdrawal call failed or was rejected.
    WithdrawFailed { symbol: String, reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ConnectSucceeded { wallet } => write!(f, "Connected to {wallet}"),
            Notice::ConnectRejected { wallet } => {
                write!(f, "You cancelled the {wallet} connection request")
            }
            Notice::SwitchSucceeded { wallet, network } => {
                write!(f, "Switched {wallet} to {network}")
            }
            Notice::SwitchRejected { wallet } => {
                write!(f, "You cancelled the {wallet} switch network request")
            }
            Notice::AddChainRejected { wallet } => {
                write!(f, "You cancelled the {wallet} add network request")
            }
            Notice::WithdrawablePending {
                symbol,
                withdrawable,
            } => write!(
                f,
                "You have {withdrawable} {symbol} withdrawable, please withdraw it first"
            ),
            Notice::ApproveSucceeded { symbol } => write!(f, "Approved {symbol}"),
            Notice::TransferSucceeded { symbol, amount } => {
                write!(f, "Transferred {amount} {symbol} to the bridge")
            }
            Notice::TransferFailed { symbol, reason } => {
                write!(f, "Transfer of {symbol} failed: {reason}")
            }
            Notice::WithdrawSucceeded { symbol, amount } => {
                write!(f, "Withdrew {amount} {symbol}")
            }
            Notice::WithdrawFailed { symbol, reason } => {
                write!(f, "Withdrawal of {symbol} failed: {reason}")
            }
        }
    }
}
