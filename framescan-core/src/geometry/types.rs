//! Plain geometric value types shared by every coordinate space.

use serde::{Deserialize, Serialize};

// ── Point ────────────────────────────────────────────────────────

/// A point in some coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ── Size ─────────────────────────────────────────────────────────

/// Width and height of a box or a frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// `true` when both dimensions are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Width over height.
    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

// ── Rect ─────────────────────────────────────────────────────────

/// An axis-aligned rectangle.
///
/// The coordinate space (source pixels, render space, or crop-relative)
/// is implied by where the value came from; the functions in
/// [`transform`](super::transform) name the spaces they convert between.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin covering `size`.
    pub const fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// `true` if width or height is zero (or negative).
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Component-wise comparison within `eps`.
    pub fn approx_eq(&self, other: &Rect, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps
            && (self.y - other.y).abs() <= eps
            && (self.width - other.width).abs() <= eps
            && (self.height - other.height).abs() <= eps
    }

    /// Snap to whole pixels and clamp into a `bounds`-sized frame.
    ///
    /// Returns `None` when nothing of the rectangle remains inside the
    /// frame.
    pub fn to_pixel_rect(&self, bounds: Size) -> Option<PixelRect> {
        let left = self.x.round().max(0.0);
        let top = self.y.round().max(0.0);
        let right = self.right().round().min(bounds.width.floor());
        let bottom = self.bottom().round().min(bounds.height.floor());

        if !(right > left && bottom > top) {
            return None;
        }

        Some(PixelRect {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

// ── PixelRect ────────────────────────────────────────────────────

/// A whole-pixel rectangle inside a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<PixelRect> for Rect {
    fn from(r: PixelRect) -> Self {
        Rect::new(r.x as f64, r.y as f64, r.width as f64, r.height as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_validity() {
        assert!(Size::new(640.0, 480.0).is_valid());
        assert!(!Size::new(0.0, 480.0).is_valid());
        assert!(!Size::new(f64::NAN, 1.0).is_valid());
    }

    #[test]
    fn pixel_rect_rounds_and_clamps() {
        let frame = Size::new(100.0, 50.0);

        let r = Rect::new(10.4, 9.6, 20.2, 10.0).to_pixel_rect(frame).unwrap();
        assert_eq!(r, PixelRect::new(10, 10, 21, 10));

        let r = Rect::new(-5.0, -5.0, 200.0, 200.0)
            .to_pixel_rect(frame)
            .unwrap();
        assert_eq!(r, PixelRect::new(0, 0, 100, 50));
    }

    #[test]
    fn pixel_rect_outside_frame_is_none() {
        let frame = Size::new(100.0, 50.0);
        assert!(Rect::new(120.0, 0.0, 10.0, 10.0).to_pixel_rect(frame).is_none());
        assert!(Rect::new(10.0, 10.0, 0.0, 10.0).to_pixel_rect(frame).is_none());
    }

    #[test]
    fn rect_edges() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(r.right(), 4.0);
        assert_eq!(r.bottom(), 6.0);
        assert!(!r.is_empty());
        assert!(Rect::default().is_empty());
    }
}
