//! Image files as frame sources.

use std::path::Path;

use framescan_core::{MemoryFrameSource, PixelBuffer, PixelFormat, ScanError};
use tracing::debug;

use crate::config::DisplayConfig;

/// Decode an image file into a frame: RGBA if it carries alpha, RGB
/// otherwise.
pub fn load_frame(path: &Path) -> Result<PixelBuffer, ScanError> {
    let image = image::open(path)
        .map_err(|e| ScanError::Capture(format!("cannot read {}: {e}", path.display())))?;
    let (width, height) = (image.width(), image.height());
    debug!(width, height, color = ?image.color(), path = %path.display(), "image loaded");

    if image.color().has_alpha() {
        PixelBuffer::packed(width, height, PixelFormat::Rgba8, image.to_rgba8().into_raw())
    } else {
        PixelBuffer::packed(width, height, PixelFormat::Rgb8, image.to_rgb8().into_raw())
    }
}

/// Wrap `frame` in a source laid out per `display`.
pub fn frame_source(frame: PixelBuffer, display: &DisplayConfig) -> MemoryFrameSource {
    let size = display.display_size(frame.size());
    MemoryFrameSource::new(frame)
        .with_display(size)
        .with_layout(display.mode, display.anchor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use framescan_core::{FrameSource, LayoutMode, Size};

    #[test]
    fn missing_file_is_capture_error() {
        let err = load_frame(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, ScanError::Capture(_)));
    }

    #[test]
    fn opaque_image_loads_as_rgb() {
        let path = std::env::temp_dir().join(format!("framescan-rgb-{}.png", std::process::id()));
        image::RgbImage::from_pixel(4, 3, image::Rgb([200, 10, 20]))
            .save(&path)
            .unwrap();
        let frame = load_frame(&path);
        let _ = std::fs::remove_file(&path);

        let frame = frame.unwrap();
        assert_eq!(frame.format, PixelFormat::Rgb8);
        assert_eq!((frame.width, frame.height), (4, 3));
        assert_eq!(frame.pixel(3, 2), &[200, 10, 20]);
    }

    #[test]
    fn transparent_image_loads_as_rgba() {
        let path = std::env::temp_dir().join(format!("framescan-rgba-{}.png", std::process::id()));
        image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 128]))
            .save(&path)
            .unwrap();
        let frame = load_frame(&path);
        let _ = std::fs::remove_file(&path);

        let frame = frame.unwrap();
        assert_eq!(frame.format, PixelFormat::Rgba8);
        assert_eq!(frame.pixel(1, 1), &[1, 2, 3, 128]);
    }

    #[test]
    fn source_uses_display_settings() {
        let display = DisplayConfig {
            width: 320,
            height: 0,
            mode: LayoutMode::Fill,
            ..Default::default()
        };
        let source = frame_source(PixelBuffer::solid(640, 480, [0, 0, 0, 255]), &display);
        assert_eq!(source.display_size(), Size::new(320.0, 480.0));
        assert_eq!(source.layout_mode(), LayoutMode::Fill);
        assert_eq!(source.frame_size(), Size::new(640.0, 480.0));
    }
}
