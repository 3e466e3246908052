//! Command-line scanner configuration.

use std::path::Path;

use framescan_core::{Anchor, FacingMode, LayoutMode, ScanConfig, Size};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the scanner binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Scheduler and decode tuning.
    pub scanner: ScanConfig,
    /// How the frame is laid out on screen.
    pub display: DisplayConfig,
    /// Frame-timing signal.
    pub clock: ClockConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Rendered box width; 0 uses the image width.
    pub width: u32,
    /// Rendered box height; 0 uses the image height.
    pub height: u32,
    /// "fit", "fill", "stretch", "none" or "scale-down".
    pub mode: LayoutMode,
    /// Object-position style anchor, e.g. "50% 50%" or "left top".
    pub anchor: Anchor,
    /// "environment" or "user" (mirrored).
    pub facing: FacingMode,
}

/// Frame clock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Signals per second.
    pub rate: f64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            mode: LayoutMode::Fit,
            anchor: Anchor::CENTER,
            facing: FacingMode::Environment,
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { rate: 60.0 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl DisplayConfig {
    /// The rendered box for a frame of `frame` size.
    pub fn display_size(&self, frame: Size) -> Size {
        Size::new(
            if self.width == 0 { frame.width } else { self.width as f64 },
            if self.height == 0 { frame.height } else { self.height as f64 },
        )
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CliConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
