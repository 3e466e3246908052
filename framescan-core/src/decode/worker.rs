//! The decode worker: an owned execution resource running a [`Decoder`].
//!
//! A [`DecodeWorker`] is the scanner-side half of a request/reply pair.
//! The other half either lives on a dedicated thread started by
//! [`DecodeWorker::spawn`], or is handed to the caller as a
//! [`WorkerEndpoint`] by [`DecodeWorker::endpoint`] so that any task
//! (an async service, a test double) can answer requests.

use std::thread;

use tokio::sync::mpsc;
use tracing::debug;

use super::protocol::{self, Decoder, WorkerReply, WorkerRequest};
use crate::error::ScanError;

/// Requests that may queue up behind a slow decoder before submissions
/// are refused.
const QUEUE_DEPTH: usize = 4;

// ── DecodeWorker ─────────────────────────────────────────────────

/// Scanner-side handle to a decode worker.
///
/// Created once per scanner and released by [`terminate`](Self::terminate)
/// when the session is destroyed.
#[derive(Debug)]
pub struct DecodeWorker {
    requests: Option<mpsc::Sender<WorkerRequest>>,
    replies: mpsc::Receiver<WorkerReply>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DecodeWorker {
    /// Run `decoder` on a dedicated thread.
    ///
    /// The thread exits once the worker is terminated or dropped.
    pub fn spawn<D: Decoder>(mut decoder: D) -> Result<Self, ScanError> {
        let (request_tx, mut request_rx) = mpsc::channel::<WorkerRequest>(QUEUE_DEPTH);
        let (reply_tx, reply_rx) = mpsc::channel::<WorkerReply>(QUEUE_DEPTH);

        let thread = thread::Builder::new()
            .name("framescan-decode".into())
            .spawn(move || {
                while let Some(request) = request_rx.blocking_recv() {
                    let reply = protocol::answer(&mut decoder, request);
                    if reply_tx.blocking_send(reply).is_err() {
                        break;
                    }
                }
                debug!("decode worker thread exiting");
            })?;

        Ok(Self {
            requests: Some(request_tx),
            replies: reply_rx,
            thread: Some(thread),
        })
    }

    /// Create a worker whose far side is driven by the caller.
    pub fn endpoint() -> (Self, WorkerEndpoint) {
        let (request_tx, request_rx) = mpsc::channel(QUEUE_DEPTH);
        let (reply_tx, reply_rx) = mpsc::channel(QUEUE_DEPTH);
        (
            Self {
                requests: Some(request_tx),
                replies: reply_rx,
                thread: None,
            },
            WorkerEndpoint {
                requests: request_rx,
                replies: reply_tx,
            },
        )
    }

    /// Hand a request to the worker without waiting.
    pub(crate) fn dispatch(&self, request: WorkerRequest) -> Result<(), ScanError> {
        let Some(requests) = &self.requests else {
            return Err(ScanError::DecodeTransport("worker terminated".into()));
        };
        requests.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                ScanError::DecodeTransport("worker queue full".into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                ScanError::DecodeTransport("worker stopped".into())
            }
        })
    }

    /// Next reply from the worker; `None` once it has gone away.
    ///
    /// Cancel safe.
    pub(crate) async fn recv(&mut self) -> Option<WorkerReply> {
        self.replies.recv().await
    }

    /// Release the worker. Replies still in flight are dropped.
    pub fn terminate(&mut self) {
        if self.requests.take().is_some() {
            self.replies.close();
            if let Some(thread) = self.thread.take() {
                debug!(thread = ?thread.thread().name(), "detaching decode worker thread");
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.requests.is_none()
    }
}

// ── WorkerEndpoint ───────────────────────────────────────────────

/// The far side of a [`DecodeWorker`] created with
/// [`DecodeWorker::endpoint`].
#[derive(Debug)]
pub struct WorkerEndpoint {
    requests: mpsc::Receiver<WorkerRequest>,
    replies: mpsc::Sender<WorkerReply>,
}

impl WorkerEndpoint {
    /// Next request; `None` once the worker is terminated.
    pub async fn recv(&mut self) -> Option<WorkerRequest> {
        self.requests.recv().await
    }

    /// Send a reply, correlated or not.
    pub async fn reply(&self, reply: WorkerReply) -> Result<(), ScanError> {
        self.replies.send(reply).await?;
        Ok(())
    }

    /// Answer every request with `decoder` until the worker goes away.
    ///
    /// Intended to be spawned on the Tokio runtime:
    ///
    /// ```no_run
    /// # use framescan_core::decode::{DecodeWorker, DecodedSymbol, DecoderFault};
    /// # use framescan_core::frame::PixelBuffer;
    /// # async fn example() {
    /// let (worker, endpoint) = DecodeWorker::endpoint();
    /// tokio::spawn(endpoint.serve(|_: &PixelBuffer| -> Result<Option<DecodedSymbol>, DecoderFault> {
    ///     Ok(None)
    /// }));
    /// # drop(worker);
    /// # }
    /// ```
    pub async fn serve<D: Decoder>(mut self, mut decoder: D) {
        while let Some(request) = self.requests.recv().await {
            let reply = protocol::answer(&mut decoder, request);
            if self.replies.send(reply).await.is_err() {
                break;
            }
        }
        debug!("decode endpoint finished");
    }
}
