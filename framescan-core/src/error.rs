//! Error types for the scanning pipeline.
//!
//! Only setup-time and explicit lifecycle operations surface a
//! [`ScanError`] to the caller. Per-frame problems are converted into
//! [`DecodeFailure`](crate::events::DecodeFailure) callbacks by the
//! scheduler and never stop the loop.

use std::time::Duration;
use thiserror::Error;

use crate::decode::RequestId;

/// The canonical error type for `framescan-core`.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Setup Errors ─────────────────────────────────────────────
    /// An option or collaborator handed to the builder is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The frame source refused to bind (no device access).
    #[error("source access denied")]
    AccessDenied,

    // ── Decode Errors ────────────────────────────────────────────
    /// No reply arrived from the decode worker before the deadline.
    #[error("decode timed out after {0:?}")]
    DecodeTimeout(Duration),

    /// The decode worker faulted or went away.
    #[error("decode transport failure: {0}")]
    DecodeTransport(String),

    /// A request was submitted while another one was still pending.
    #[error("decode channel busy with request {0}")]
    ChannelBusy(RequestId),

    // ── Lifecycle Errors ─────────────────────────────────────────
    /// The scanner task is no longer running.
    #[error("channel closed")]
    ChannelClosed,

    /// A session state transition was rejected.
    #[error("invalid session transition: {0}")]
    InvalidTransition(&'static str),

    // ── Source Errors ────────────────────────────────────────────
    /// The frame source could not produce pixel data.
    #[error("frame capture failed: {0}")]
    Capture(String),

    /// The decode worker thread could not be started.
    #[error("worker error: {0}")]
    Worker(#[from] std::io::Error),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ScanError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ScanError::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for ScanError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        ScanError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = ScanError::DecodeTimeout(Duration::from_millis(1000));
        assert!(e.to_string().contains("1s"));

        let e = ScanError::ChannelBusy(RequestId::new(7));
        assert!(e.to_string().contains('7'));

        let e = ScanError::Configuration("scan_rate must be positive".into());
        assert!(e.to_string().contains("scan_rate"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "no threads");
        let e: ScanError = io_err.into();
        assert!(matches!(e, ScanError::Worker(_)));
    }

    #[tokio::test]
    async fn from_closed_mpsc() {
        let (tx, rx) = tokio::sync::mpsc::channel::<u8>(1);
        drop(rx);
        let e: ScanError = tx.send(1).await.unwrap_err().into();
        assert!(matches!(e, ScanError::ChannelClosed));
    }
}
