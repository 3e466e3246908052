//! How a source frame is laid out inside its display box.
//!
//! A [`RenderLayout`] captures everything needed to move between source
//! pixels and render space: the two sizes, the [`LayoutMode`] that sizes
//! the frame inside the box, the [`Anchor`] that positions it, and the
//! mirrored flag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::{Point, Size};

// ── LayoutMode ───────────────────────────────────────────────────

/// Sizing rule for a frame inside its display box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
    /// Largest aspect-preserving size that fits inside the box.
    #[default]
    Fit,
    /// Smallest aspect-preserving size that covers the box.
    Fill,
    /// Exactly the box; aspect ratio is not preserved.
    Stretch,
    /// Native source size regardless of the box.
    None,
    /// The smaller of `Fit` and the native size, per axis.
    ScaleDown,
}

impl LayoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fit => "fit",
            Self::Fill => "fill",
            Self::Stretch => "stretch",
            Self::None => "none",
            Self::ScaleDown => "scale-down",
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fit" | "contain" => Ok(Self::Fit),
            "fill" | "cover" => Ok(Self::Fill),
            "stretch" => Ok(Self::Stretch),
            "none" => Ok(Self::None),
            "scale-down" => Ok(Self::ScaleDown),
            other => Err(format!("unknown layout mode: {other}")),
        }
    }
}

// ── Anchor ───────────────────────────────────────────────────────

/// Position of the scaled frame along one axis of the display box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisPosition {
    /// Fraction (0–100) of the free space `box - scaled`.
    Percent(f64),
    /// Fixed offset from the box's leading edge.
    Pixels(f64),
}

impl AxisPosition {
    /// Offset of the frame's leading edge given the free space on this axis.
    ///
    /// `free` is negative when the scaled frame overflows the box.
    pub fn resolve(&self, free: f64) -> f64 {
        match *self {
            Self::Percent(p) => free * p / 100.0,
            Self::Pixels(px) => px,
        }
    }
}

impl fmt::Display for AxisPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Pixels(px) => write!(f, "{px}px"),
        }
    }
}

impl FromStr for AxisPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid position: {s}"))
        };
        match s {
            "left" | "top" => Ok(Self::Percent(0.0)),
            "center" => Ok(Self::Percent(50.0)),
            "right" | "bottom" => Ok(Self::Percent(100.0)),
            _ => {
                if let Some(v) = s.strip_suffix('%') {
                    parse(v).map(Self::Percent)
                } else if let Some(v) = s.strip_suffix("px") {
                    parse(v).map(Self::Pixels)
                } else {
                    parse(s).map(Self::Pixels)
                }
            }
        }
    }
}

/// Per-axis placement of the scaled frame, in the style of CSS
/// `object-position`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Anchor {
    pub x: AxisPosition,
    pub y: AxisPosition,
}

impl Anchor {
    pub const CENTER: Anchor = Anchor {
        x: AxisPosition::Percent(50.0),
        y: AxisPosition::Percent(50.0),
    };

    pub const TOP_LEFT: Anchor = Anchor {
        x: AxisPosition::Percent(0.0),
        y: AxisPosition::Percent(0.0),
    };

    pub const fn new(x: AxisPosition, y: AxisPosition) -> Self {
        Self { x, y }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::CENTER
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}

impl FromStr for Anchor {
    type Err = String;

    /// Parses `"<x> <y>"`; a single token applies to x and centers y.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let x = match parts.next() {
            Some(token) => token.parse()?,
            None => return Err("empty anchor".into()),
        };
        let y = match parts.next() {
            Some(token) => token.parse()?,
            None => AxisPosition::Percent(50.0),
        };
        if parts.next().is_some() {
            return Err(format!("too many anchor components: {s}"));
        }
        Ok(Self { x, y })
    }
}

impl TryFrom<String> for Anchor {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Anchor> for String {
    fn from(a: Anchor) -> Self {
        a.to_string()
    }
}

// ── RenderLayout ─────────────────────────────────────────────────

/// A snapshot of how a frame source is currently displayed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderLayout {
    /// Native frame size in source pixels.
    pub source: Size,
    /// Size of the box the frame is rendered into.
    pub display: Size,
    pub mode: LayoutMode,
    pub anchor: Anchor,
    /// Horizontally flipped on screen.
    pub mirrored: bool,
}

impl RenderLayout {
    /// Both sizes are usable for coordinate conversion.
    pub fn is_valid(&self) -> bool {
        self.source.is_valid() && self.display.is_valid()
    }

    /// Size the source occupies on screen before anchoring.
    pub fn scaled_size(&self) -> Size {
        let source = self.source;
        let display = self.display;
        let source_aspect = source.aspect();
        let display_aspect = display.aspect();

        let fit = if source_aspect < display_aspect {
            Size::new(display.height * source_aspect, display.height)
        } else {
            Size::new(display.width, display.width / source_aspect)
        };

        match self.mode {
            LayoutMode::Fit => fit,
            LayoutMode::Fill => {
                if source_aspect > display_aspect {
                    Size::new(display.height * source_aspect, display.height)
                } else {
                    Size::new(display.width, display.width / source_aspect)
                }
            }
            LayoutMode::Stretch => display,
            LayoutMode::None => source,
            LayoutMode::ScaleDown => Size::new(
                fit.width.min(source.width),
                fit.height.min(source.height),
            ),
        }
    }

    /// Top-left of the scaled frame relative to the display box.
    pub fn offset(&self, scaled: Size) -> Point {
        Point::new(
            self.anchor.x.resolve(self.display.width - scaled.width),
            self.anchor.y.resolve(self.display.height - scaled.height),
        )
    }
}
