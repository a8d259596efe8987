//! Notice channel factory and handles.

use super::types::Notice;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

/// Default buffer size for the notice channel.
///
/// Notices are dropped rather than queued once the buffer is full.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for notices.
pub type NoticeSender = mpsc::Sender<Notice>;
/// Receiver handle for notices.
pub type NoticeReceiver = mpsc::Receiver<Notice>;

/// Create a new notice channel.
///
/// Returns a (sender, receiver) pair. Multiple senders can be cloned from the
/// returned sender.
pub fn notice_channel() -> (NoticeSender, NoticeReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Best-effort notice emitter shared by the gate and the orchestrators.
///
/// Never waits: a full or closed channel drops the notice.
#[derive(Clone, Default)]
pub struct NoticeSink {
    sender: Option<NoticeSender>,
}

impl NoticeSink {
    /// Create a sink that delivers into `sender`.
    pub fn new(sender: NoticeSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create a sink that discards everything.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, notice: Notice) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(notice)) => {
                warn!(notice = %notice, "Notice channel full, dropping notice");
            }
            Err(TrySendError::Closed(notice)) => {
                warn!(notice = %notice, "Notice channel closed, dropping notice");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xspace_sdk::objects::Wallet;

    #[test]
    fn test_emit_delivers_and_never_blocks() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = NoticeSink::new(tx);
        sink.emit(Notice::ConnectSucceeded {
            wallet: Wallet::Core,
        });
        // Second one is dropped, the buffer only holds one.
        sink.emit(Notice::ConnectRejected {
            wallet: Wallet::Bridge,
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            Notice::ConnectSucceeded {
                wallet: Wallet::Core
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disabled_sink_is_silent() {
        NoticeSink::disabled().emit(Notice::ApproveSucceeded {
            symbol: "USDT".into(),
        });
    }
}
