//! Messages exchanged with the decode worker.
//!
//! The transport is fire-and-forget message passing: every
//! [`WorkerRequest`] carries a [`RequestId`] and the worker echoes it in
//! its [`WorkerReply`]. Correlation happens entirely on the channel side.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::frame::PixelBuffer;
use crate::geometry::Point;

// ── RequestId ────────────────────────────────────────────────────

/// Correlation token linking a request to its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Payloads ─────────────────────────────────────────────────────

/// A symbol found by the decoder.
///
/// `corner_points` are in the pixel space of the buffer that was
/// decoded, ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSymbol {
    pub raw_value: String,
    /// Symbology name, e.g. `"qr_code"`.
    pub format: String,
    pub corner_points: [Point; 4],
}

/// Request to decode one cropped frame.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub id: RequestId,
    /// `None` asks the worker for an empty reply.
    pub frame: Option<PixelBuffer>,
}

/// The worker's answer to a [`WorkerRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerReply {
    /// Decoding ran; `symbol` is `None` when nothing was found.
    Decoded {
        id: RequestId,
        symbol: Option<DecodedSymbol>,
    },
    /// The decoder failed internally.
    Fault { id: RequestId, reason: String },
}

impl WorkerReply {
    pub fn id(&self) -> RequestId {
        match self {
            Self::Decoded { id, .. } | Self::Fault { id, .. } => *id,
        }
    }
}

// ── Decoder ──────────────────────────────────────────────────────

/// Internal failure of a [`Decoder`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("decoder fault: {0}")]
pub struct DecoderFault(pub String);

/// The pattern-recognition capability run by the worker.
pub trait Decoder: Send + 'static {
    fn decode(&mut self, frame: &PixelBuffer) -> Result<Option<DecodedSymbol>, DecoderFault>;
}

impl<F> Decoder for F
where
    F: FnMut(&PixelBuffer) -> Result<Option<DecodedSymbol>, DecoderFault> + Send + 'static,
{
    fn decode(&mut self, frame: &PixelBuffer) -> Result<Option<DecodedSymbol>, DecoderFault> {
        self(frame)
    }
}

/// Run one request through `decoder`, turning panics into faults.
pub(crate) fn answer<D: Decoder + ?Sized>(decoder: &mut D, request: WorkerRequest) -> WorkerReply {
    let id = request.id;
    let Some(frame) = request.frame else {
        return WorkerReply::Decoded { id, symbol: None };
    };

    match panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(&frame))) {
        Ok(Ok(symbol)) => WorkerReply::Decoded { id, symbol },
        Ok(Err(fault)) => WorkerReply::Fault {
            id,
            reason: fault.0,
        },
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "decoder panicked".to_string());
            WorkerReply::Fault { id, reason }
        }
    }
}
