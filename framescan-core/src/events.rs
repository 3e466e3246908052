//! What the scanner reports to its caller.
//!
//! Results are delivered through callbacks registered on the builder;
//! the overlay geometry is published on a `watch` channel so a renderer
//! can always read the latest rectangles without subscribing to events.

use std::fmt;
use std::time::Duration;

use crate::frame::PixelBuffer;
use crate::geometry::{Point, Rect};

// ── Detection ────────────────────────────────────────────────────

/// A symbol found in the scan area, mapped out of crop space.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub raw_value: String,
    pub format: String,
    /// Corner points in source-pixel space.
    pub corner_points: [Point; 4],
    /// Bounding box of the corners in source-pixel space.
    pub source_area: Rect,
    /// The same box in render space; `None` if the source has no valid
    /// display geometry.
    pub render_area: Option<Rect>,
}

// ── DecodeFailure ────────────────────────────────────────────────

/// Why a sampled frame produced no [`Detection`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeFailure {
    /// The decoder ran and found nothing. Not an error.
    NoSymbol,
    Timeout(Duration),
    Transport(String),
    /// The frame could not be cropped or read.
    Capture(String),
}

impl DecodeFailure {
    /// `false` for the ordinary "nothing in view" result.
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::NoSymbol)
    }
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSymbol => write!(f, "no symbol found"),
            Self::Timeout(after) => write!(f, "decode timed out after {after:?}"),
            Self::Transport(reason) => write!(f, "decode transport failure: {reason}"),
            Self::Capture(reason) => write!(f, "frame capture failed: {reason}"),
        }
    }
}

// ── Overlay ──────────────────────────────────────────────────────

/// Latest geometry for drawing on top of the rendered frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    /// Scan area in source-pixel space.
    pub scan_area: Option<Rect>,
    /// Scan area in render space.
    pub scan_area_render: Option<Rect>,
    /// Last detection box in source-pixel space.
    pub detected: Option<Rect>,
    /// Last detection box in render space.
    pub detected_render: Option<Rect>,
}

impl Overlay {
    pub fn clear_detection(&mut self) {
        self.detected = None;
        self.detected_render = None;
    }
}

// ── Callbacks ────────────────────────────────────────────────────

pub type SuccessCallback = Box<dyn FnMut(&Detection) + Send + 'static>;
pub type FailureCallback = Box<dyn FnMut(&DecodeFailure) + Send + 'static>;
/// Debug hook: receives every cropped frame handed to the decoder.
pub type FrameCallback = Box<dyn FnMut(&PixelBuffer) + Send + 'static>;

/// The caller's event sinks.
pub struct ScanEvents {
    pub(crate) on_success: SuccessCallback,
    pub(crate) on_failure: Option<FailureCallback>,
    pub(crate) on_frame: Option<FrameCallback>,
}

impl ScanEvents {
    pub fn new(on_success: SuccessCallback) -> Self {
        Self {
            on_success,
            on_failure: None,
            on_frame: None,
        }
    }

    pub(crate) fn success(&mut self, detection: &Detection) {
        (self.on_success)(detection);
    }

    pub(crate) fn failure(&mut self, failure: &DecodeFailure) {
        if let Some(on_failure) = self.on_failure.as_mut() {
            on_failure(failure);
        }
    }

    pub(crate) fn frame(&mut self, frame: &PixelBuffer) {
        if let Some(on_frame) = self.on_frame.as_mut() {
            on_frame(frame);
        }
    }
}

impl fmt::Debug for ScanEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanEvents")
            .field("on_failure", &self.on_failure.is_some())
            .field("on_frame", &self.on_frame.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn no_symbol_is_not_an_error() {
        assert!(!DecodeFailure::NoSymbol.is_error());
        assert!(DecodeFailure::Timeout(Duration::from_secs(1)).is_error());
        assert!(DecodeFailure::Transport("gone".into()).is_error());
        assert!(DecodeFailure::Capture("unbound".into()).is_error());
    }

    #[test]
    fn optional_sinks_are_skipped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut events = ScanEvents::new(Box::new(move |d: &Detection| {
            sink.lock().unwrap().push(d.raw_value.clone());
        }));

        events.failure(&DecodeFailure::NoSymbol);
        events.frame(&PixelBuffer::solid(1, 1, [0, 0, 0, 255]));
        events.success(&Detection {
            raw_value: "hello".into(),
            format: "qr_code".into(),
            corner_points: [Point::default(); 4],
            source_area: Rect::default(),
            render_area: None,
        });

        assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn clearing_detection_keeps_scan_area() {
        let mut overlay = Overlay {
            scan_area: Some(Rect::new(1.0, 1.0, 2.0, 2.0)),
            scan_area_render: Some(Rect::new(1.0, 1.0, 2.0, 2.0)),
            detected: Some(Rect::new(0.0, 0.0, 1.0, 1.0)),
            detected_render: Some(Rect::new(0.0, 0.0, 1.0, 1.0)),
        };
        overlay.clear_detection();
        assert!(overlay.detected.is_none());
        assert!(overlay.scan_area.is_some());
    }
}
