//! A frame source backed by one still frame held in memory.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{FacingMode, FrameSource, PixelBuffer, ReadyState, SourceControl};
use crate::error::ScanError;
use crate::geometry::{Anchor, LayoutMode, PixelRect, Size};

#[derive(Debug)]
struct MemoryState {
    frame: PixelBuffer,
    display: Size,
    mode: LayoutMode,
    anchor: Anchor,
    mirrored: bool,
    ready: ReadyState,
    ended: bool,
    access: bool,
    bound: bool,
    playing: bool,
    facing: Option<FacingMode>,
    poster: Option<PixelBuffer>,
}

/// Serves the same frame for as long as it is bound and playing.
///
/// Useful for scanning image files and as a stand-in camera in tests.
/// Readiness, end-of-stream, access, and layout are all adjustable.
///
/// Clones share state, so a caller can keep one to drive and inspect the
/// source after handing another to a scanner.
#[derive(Debug, Clone)]
pub struct MemoryFrameSource {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFrameSource {
    /// Display box defaults to the frame's own size.
    pub fn new(frame: PixelBuffer) -> Self {
        let display = frame.size();
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                frame,
                display,
                mode: LayoutMode::Fit,
                anchor: Anchor::CENTER,
                mirrored: false,
                ready: ReadyState::HaveEnoughData,
                ended: false,
                access: true,
                bound: false,
                playing: false,
                facing: None,
                poster: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_display(self, display: Size) -> Self {
        self.set_display(display);
        self
    }

    pub fn with_layout(self, mode: LayoutMode, anchor: Anchor) -> Self {
        {
            let mut state = self.state();
            state.mode = mode;
            state.anchor = anchor;
        }
        self
    }

    /// Make every [`request_access`](SourceControl::request_access) fail.
    pub fn deny_access(self) -> Self {
        self.set_access(false);
        self
    }

    pub fn set_access(&self, granted: bool) {
        self.state().access = granted;
    }

    /// Replace the frame, e.g. to simulate a resolution change.
    pub fn set_frame(&self, frame: PixelBuffer) {
        self.state().frame = frame;
    }

    pub fn set_display(&self, display: Size) {
        self.state().display = display;
    }

    pub fn set_ready_state(&self, ready: ReadyState) {
        self.state().ready = ready;
    }

    pub fn set_ended(&self, ended: bool) {
        self.state().ended = ended;
    }

    /// The still image currently shown in place of the stream.
    pub fn poster(&self) -> Option<PixelBuffer> {
        self.state().poster.clone()
    }

    /// Facing mode of the last successful bind.
    pub fn facing(&self) -> Option<FacingMode> {
        self.state().facing
    }
}

impl FrameSource for MemoryFrameSource {
    fn frame_size(&self) -> Size {
        self.state().frame.size()
    }

    fn display_size(&self) -> Size {
        self.state().display
    }

    fn layout_mode(&self) -> LayoutMode {
        self.state().mode
    }

    fn anchor(&self) -> Anchor {
        self.state().anchor
    }

    fn is_mirrored(&self) -> bool {
        self.state().mirrored
    }

    fn ready_state(&self) -> ReadyState {
        let state = self.state();
        if state.bound {
            state.ready
        } else {
            ReadyState::HaveNothing
        }
    }

    fn is_ended(&self) -> bool {
        self.state().ended
    }

    fn is_paused(&self) -> bool {
        !self.state().playing
    }

    fn read_pixels(&mut self, area: PixelRect) -> Result<PixelBuffer, ScanError> {
        let state = self.state();
        if !state.bound {
            return Err(ScanError::Capture("no stream bound".into()));
        }
        state.frame.crop(area)
    }
}

#[async_trait]
impl SourceControl for MemoryFrameSource {
    async fn request_access(&mut self) -> bool {
        self.state().access
    }

    fn is_bound(&self) -> bool {
        self.state().bound
    }

    async fn bind(&mut self, facing: FacingMode) -> Result<(), ScanError> {
        let mut state = self.state();
        if !state.access {
            return Err(ScanError::AccessDenied);
        }
        state.bound = true;
        state.playing = false;
        state.facing = Some(facing);
        Ok(())
    }

    async fn play(&mut self) -> Result<(), ScanError> {
        let mut state = self.state();
        if !state.bound {
            return Err(ScanError::Capture("play without a bound stream".into()));
        }
        state.playing = true;
        Ok(())
    }

    fn release(&mut self) {
        let mut state = self.state();
        state.bound = false;
        state.playing = false;
    }

    fn set_mirrored(&mut self, mirrored: bool) {
        self.state().mirrored = mirrored;
    }

    fn set_poster(&mut self, poster: Option<PixelBuffer>) {
        self.state().poster = poster;
    }
}
