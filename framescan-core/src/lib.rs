//! # framescan-core
//!
//! Live frame scanning: sample frames from a video source, crop a scan
//! area, decode it off the scheduling task, and map results back into the
//! space the caller renders in.
//!
//! This crate contains:
//! - **Geometry**: `Rect`, `RenderLayout`, and the source/render/crop transforms
//! - **Frame**: `PixelBuffer`, the `FrameSource` / `SourceControl` boundary, `MemoryFrameSource`
//! - **Decode**: `DecodeWorker` and the single-flight `DecodeChannel` with timeouts
//! - **Scheduler**: `FrameScheduler`, the per-tick sample/crop/dispatch state machine
//! - **Session**: `SessionPhase` with validated transitions
//! - **Scanner**: the lifecycle controller task and its `ScannerHandle`
//! - **Error**: `ScanError`, a `thiserror`-based error type

pub mod clock;
pub mod config;
pub mod decode;
pub mod error;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod scanner;
pub mod scheduler;
pub mod session;
pub mod visibility;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use clock::{FrameClock, IntervalClock};
pub use config::ScanConfig;
pub use decode::{
    DecodeChannel, DecodeOutcome, DecodeWorker, DecodedSymbol, Decoder, DecoderFault, RequestId,
    WorkerEndpoint,
};
pub use error::ScanError;
pub use events::{DecodeFailure, Detection, Overlay};
pub use frame::{
    FacingMode, FrameSource, MemoryFrameSource, PixelBuffer, PixelFormat, ReadyState,
    SourceControl,
};
pub use geometry::{Anchor, LayoutMode, PixelRect, Point, Rect, RenderLayout, Size};
pub use scanner::{Scanner, ScannerBuilder, ScannerHandle};
pub use scheduler::{FrameScheduler, ScanAreaFn, TickOutcome};
pub use session::{SessionPhase, SessionState};
pub use visibility::{Visibility, VisibilityHub, VisibilitySubscription};
