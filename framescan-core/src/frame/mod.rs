//! Frame source boundary and pixel buffer types.
//!
//! The scanner never owns a camera. It talks to one through two traits:
//!
//! - [`FrameSource`]: the read side: sizes, layout, readiness, and
//!   cropping pixels out of the current frame.
//! - [`SourceControl`]: the binding side used by the lifecycle: access
//!   checks, bind/resume, release, mirroring, and the still poster shown
//!   while paused.
//!
//! [`MemoryFrameSource`] implements both over a single still frame.

mod memory;

pub use memory::MemoryFrameSource;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::geometry::{Anchor, LayoutMode, PixelRect, RenderLayout, Size};

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 4 bytes per pixel: Blue, Green, Red, Alpha.
    Bgra8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
    /// 1 byte per pixel: luminance.
    Luma8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Luma8 => 1,
        }
    }
}

// ── PixelBuffer ──────────────────────────────────────────────────

/// An uncompressed frame or frame region.
///
/// `data` holds `height` rows of `stride` bytes each. Cloning is cheap:
/// the bytes are reference counted, so the same crop can go to the
/// decoder and to the debug hook.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row pitch in **bytes** (may exceed `width * bpp`).
    pub stride: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Raw pixel data, at least `stride * height` bytes.
    pub data: Bytes,
}

impl PixelBuffer {
    /// Wrap tightly packed pixel data, checking its length.
    pub fn packed(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<Bytes>,
    ) -> Result<Self, ScanError> {
        let data = data.into();
        let stride = width as usize * format.bytes_per_pixel();
        let expected = stride * height as usize;
        if data.len() < expected {
            return Err(ScanError::Capture(format!(
                "pixel buffer too small: {} bytes for {width}x{height}, need {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride: stride as u32,
            format,
            data,
        })
    }

    /// A frame filled with one RGBA colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data: Vec<u8> = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            stride: width * 4,
            format: PixelFormat::Rgba8,
            data: Bytes::from(data),
        }
    }

    /// Frame dimensions as a geometry [`Size`].
    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    /// Total byte size the bitmap occupies.
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Returns a row slice (including possible padding bytes).
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        let end = start + self.stride as usize;
        &self.data[start..end]
    }

    /// Returns the pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride as usize + x as usize * bpp;
        &self.data[offset..offset + bpp]
    }

    /// Luminance of the pixel at `(x, y)` (ITU-R BT.601 weights).
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let p = self.pixel(x, y);
        let (r, g, b) = match self.format {
            PixelFormat::Rgba8 | PixelFormat::Rgb8 => (p[0], p[1], p[2]),
            PixelFormat::Bgra8 => (p[2], p[1], p[0]),
            PixelFormat::Luma8 => return p[0],
        };
        ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
    }

    /// Copy `area` out into a new tightly packed buffer.
    pub fn crop(&self, area: PixelRect) -> Result<PixelBuffer, ScanError> {
        if area.width == 0
            || area.height == 0
            || area.x.checked_add(area.width).is_none_or(|r| r > self.width)
            || area.y.checked_add(area.height).is_none_or(|b| b > self.height)
        {
            return Err(ScanError::Capture(format!(
                "crop {area:?} outside {}x{} frame",
                self.width, self.height
            )));
        }

        let bpp = self.format.bytes_per_pixel();
        let row_bytes = area.width as usize * bpp;
        let mut out = Vec::with_capacity(row_bytes * area.height as usize);
        for y in area.y..area.y + area.height {
            let start = area.x as usize * bpp;
            out.extend_from_slice(&self.row(y)[start..start + row_bytes]);
        }

        Ok(PixelBuffer {
            width: area.width,
            height: area.height,
            stride: row_bytes as u32,
            format: self.format,
            data: Bytes::from(out),
        })
    }
}

// ── ReadyState ───────────────────────────────────────────────────

/// How much data the source holds for its current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ReadyState {
    #[default]
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    /// Pixels for the current frame are available.
    pub fn has_current_data(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

// ── FacingMode ───────────────────────────────────────────────────

/// Which camera to bind; the user-facing one is shown mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    #[default]
    Environment,
    User,
}

impl FacingMode {
    pub fn mirrors(self) -> bool {
        matches!(self, FacingMode::User)
    }
}

// ── Traits ───────────────────────────────────────────────────────

/// Read access to a live frame source.
pub trait FrameSource: Send {
    /// Native frame size in pixels. Zero until metadata is known.
    fn frame_size(&self) -> Size;

    /// Size of the box the frame is displayed in.
    fn display_size(&self) -> Size;

    fn layout_mode(&self) -> LayoutMode {
        LayoutMode::Fit
    }

    fn anchor(&self) -> Anchor {
        Anchor::CENTER
    }

    fn is_mirrored(&self) -> bool;

    fn ready_state(&self) -> ReadyState;

    fn is_ended(&self) -> bool {
        false
    }

    fn is_paused(&self) -> bool {
        false
    }

    /// Copy `area` of the current frame at native resolution.
    fn read_pixels(&mut self, area: PixelRect) -> Result<PixelBuffer, ScanError>;

    /// Snapshot of the current display geometry.
    fn render_layout(&self) -> RenderLayout {
        RenderLayout {
            source: self.frame_size(),
            display: self.display_size(),
            mode: self.layout_mode(),
            anchor: self.anchor(),
            mirrored: self.is_mirrored(),
        }
    }
}

/// Binding side of a frame source, driven by the lifecycle controller.
#[async_trait]
pub trait SourceControl: FrameSource {
    /// Whether the device may be used at all.
    async fn request_access(&mut self) -> bool;

    /// A live stream is currently attached.
    fn is_bound(&self) -> bool;

    /// Attach a live stream for `facing`.
    async fn bind(&mut self, facing: FacingMode) -> Result<(), ScanError>;

    /// Start (or resume) playback of the attached stream.
    async fn play(&mut self) -> Result<(), ScanError>;

    /// Detach and stop the live stream.
    fn release(&mut self);

    fn set_mirrored(&mut self, mirrored: bool);

    /// Still image shown while no stream is attached.
    fn set_poster(&mut self, poster: Option<PixelBuffer>);
}
