//! Single-flight request/reply correlation over a [`DecodeWorker`].
//!
//! ```text
//!   submit(frame) ──► pending = #n ──► worker
//!                          │
//!          ┌───────────────┼────────────────────┐
//!          ▼               ▼                    ▼
//!   reply #n arrives   reply #m (m≠n)      deadline passes
//!   → Found / Absent   → discarded         → Timeout
//!   / TransportFailure   (stay pending)      (late #n discarded)
//! ```
//!
//! The pending entry is registered before the request leaves, so a
//! worker that answers immediately can never race the bookkeeping.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

use super::protocol::{DecodedSymbol, RequestId, WorkerReply, WorkerRequest};
use super::worker::DecodeWorker;
use crate::error::ScanError;
use crate::frame::PixelBuffer;

/// Deadline applied to each request unless configured otherwise.
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_millis(1000);

// ── PendingDecode ────────────────────────────────────────────────

/// The one request currently awaiting a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDecode {
    pub id: RequestId,
    /// When the request was handed to the worker.
    pub sent_at: Instant,
    pub deadline: Duration,
}

impl PendingDecode {
    pub fn expires_at(&self) -> Instant {
        self.sent_at + self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.sent_at.elapsed()
    }
}

// ── DecodeOutcome ────────────────────────────────────────────────

/// How a submitted request was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Found(DecodedSymbol),
    /// The decoder ran and saw nothing.
    Absent,
    /// No correlated reply before the deadline.
    Timeout(Duration),
    /// The worker faulted or is gone.
    TransportFailure(String),
}

impl DecodeOutcome {
    /// Fold timeouts and transport failures into [`ScanError`].
    pub fn into_result(self) -> Result<Option<DecodedSymbol>, ScanError> {
        match self {
            Self::Found(symbol) => Ok(Some(symbol)),
            Self::Absent => Ok(None),
            Self::Timeout(after) => Err(ScanError::DecodeTimeout(after)),
            Self::TransportFailure(reason) => Err(ScanError::DecodeTransport(reason)),
        }
    }
}

enum Wake {
    Reply(Option<WorkerReply>),
    Deadline,
}

// ── DecodeChannel ────────────────────────────────────────────────

/// Correlates replies from a [`DecodeWorker`] with the single pending
/// request and enforces its deadline.
#[derive(Debug)]
pub struct DecodeChannel {
    worker: DecodeWorker,
    timeout: Duration,
    next_id: u64,
    pending: Option<PendingDecode>,
}

impl DecodeChannel {
    pub fn new(worker: DecodeWorker, timeout: Duration) -> Self {
        Self {
            worker,
            timeout,
            next_id: 1,
            pending: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_id(&self) -> Option<RequestId> {
        self.pending.map(|p| p.id)
    }

    /// Ship `frame` to the worker under a fresh id.
    ///
    /// Fails with [`ScanError::ChannelBusy`] while another request is
    /// pending, and with [`ScanError::DecodeTransport`] if the worker
    /// cannot take the request. Nothing is left pending on failure.
    pub fn submit(&mut self, frame: PixelBuffer) -> Result<RequestId, ScanError> {
        if let Some(pending) = &self.pending {
            return Err(ScanError::ChannelBusy(pending.id));
        }

        let id = RequestId::new(self.next_id);
        self.next_id += 1;
        self.pending = Some(PendingDecode {
            id,
            sent_at: Instant::now(),
            deadline: self.timeout,
        });

        if let Err(e) = self.worker.dispatch(WorkerRequest {
            id,
            frame: Some(frame),
        }) {
            self.pending = None;
            return Err(e);
        }

        debug!(%id, "decode request submitted");
        Ok(id)
    }

    /// Wait for the pending request to resolve.
    ///
    /// Returns `None` immediately when nothing is pending. Replies that do
    /// not carry the pending id are dropped without resolving anything.
    ///
    /// Cancel safe: dropping the future keeps the request pending.
    pub async fn outcome(&mut self) -> Option<DecodeOutcome> {
        loop {
            let pending = self.pending?;

            let wake = tokio::select! {
                reply = self.worker.recv() => Wake::Reply(reply),
                _ = sleep_until(pending.expires_at()) => Wake::Deadline,
            };

            let outcome = match wake {
                Wake::Reply(Some(reply)) if reply.id() != pending.id => {
                    trace!(stale = %reply.id(), pending = %pending.id, "discarding stale decode reply");
                    continue;
                }
                Wake::Reply(Some(WorkerReply::Decoded { symbol, .. })) => match symbol {
                    Some(symbol) => DecodeOutcome::Found(symbol),
                    None => DecodeOutcome::Absent,
                },
                Wake::Reply(Some(WorkerReply::Fault { reason, .. })) => {
                    DecodeOutcome::TransportFailure(reason)
                }
                Wake::Reply(None) => DecodeOutcome::TransportFailure("decode worker is gone".into()),
                Wake::Deadline => DecodeOutcome::Timeout(pending.deadline),
            };

            self.pending = None;
            debug!(id = %pending.id, elapsed = ?pending.elapsed(), ?outcome, "decode resolved");
            return Some(outcome);
        }
    }

    /// Submit and wait in one step.
    pub async fn decode(&mut self, frame: PixelBuffer) -> Result<DecodeOutcome, ScanError> {
        self.submit(frame)?;
        self.outcome()
            .await
            .ok_or_else(|| ScanError::DecodeTransport("request lost".into()))
    }

    /// Forget any pending request and release the worker.
    pub fn shutdown(&mut self) {
        self.pending = None;
        self.worker.terminate();
    }

    pub fn is_shut_down(&self) -> bool {
        self.worker.is_terminated()
    }
}
