//! User-facing notices.
//!
//! The gate and the orchestrators report outcomes worth a toast through a
//! [`NoticeSink`]. The receiving end belongs to whatever renders them.
//!
//! # Notice sources
//!
//! 1. `ChainGate`: connect, switch and add-chain results
//! 2. `TransferOrchestrator`: approve, transfer and the pending-withdrawal guard
//! 3. `WithdrawOrchestrator`: withdrawal results

pub mod channels;
pub mod types;

pub use channels::{DEFAULT_CHANNEL_BUFFER, NoticeReceiver, NoticeSender, NoticeSink, notice_channel};
pub use types::Notice;
