//! Conversions between source, render and crop-relative space.
//!
//! ```text
//!   crop-relative ──(+ scan area origin)──► source ──(mirror, scale, anchor)──► render
//!   crop-relative ◄──(- scan area origin)── source ◄──(un-anchor, unscale, mirror)── render
//! ```
//!
//! All functions are total for non-negative rectangles and a
//! [`RenderLayout`] whose sizes are valid. Callers check
//! [`RenderLayout::is_valid`] before converting.

use super::layout::RenderLayout;
use super::types::{Point, Rect, Size};

/// Size of the source after layout-mode scaling.
pub fn scaled_size(layout: &RenderLayout) -> Size {
    layout.scaled_size()
}

/// Offset of the scaled source inside the display box.
pub fn anchor_offset(layout: &RenderLayout) -> Point {
    layout.offset(layout.scaled_size())
}

/// Reflect `rect` horizontally inside an axis of length `extent`.
pub fn mirror_x(rect: Rect, extent: f64) -> Rect {
    Rect {
        x: extent - rect.x - rect.width,
        ..rect
    }
}

/// Map a source-pixel rectangle into render space.
pub fn source_to_render(rect: Rect, layout: &RenderLayout) -> Rect {
    let scaled = layout.scaled_size();
    let offset = layout.offset(scaled);
    let sx = scaled.width / layout.source.width;
    let sy = scaled.height / layout.source.height;

    let rect = if layout.mirrored {
        mirror_x(rect, layout.source.width)
    } else {
        rect
    };

    Rect {
        x: rect.x * sx + offset.x,
        y: rect.y * sy + offset.y,
        width: rect.width * sx,
        height: rect.height * sy,
    }
}

/// Map a render-space rectangle back into source pixels.
pub fn render_to_source(rect: Rect, layout: &RenderLayout) -> Rect {
    let scaled = layout.scaled_size();
    let offset = layout.offset(scaled);
    let sx = layout.source.width / scaled.width;
    let sy = layout.source.height / scaled.height;

    let unscaled = Rect {
        x: (rect.x - offset.x) * sx,
        y: (rect.y - offset.y) * sy,
        width: rect.width * sx,
        height: rect.height * sy,
    };

    if layout.mirrored {
        mirror_x(unscaled, layout.source.width)
    } else {
        unscaled
    }
}

/// Map a rectangle local to the cropped buffer into source pixels.
///
/// The crop is always sampled 1:1, so this is a pure translation.
pub fn crop_relative_to_source(rect: Rect, scan_area: &Rect) -> Rect {
    Rect {
        x: rect.x + scan_area.x,
        y: rect.y + scan_area.y,
        ..rect
    }
}

/// Inverse of [`crop_relative_to_source`].
pub fn source_to_crop_relative(rect: Rect, scan_area: &Rect) -> Rect {
    Rect {
        x: rect.x - scan_area.x,
        y: rect.y - scan_area.y,
        ..rect
    }
}

/// Translate a crop-relative point into source pixels.
pub fn crop_point_to_source(point: Point, scan_area: &Rect) -> Point {
    Point::new(point.x + scan_area.x, point.y + scan_area.y)
}

/// Axis-aligned bounds of a set of points.
pub fn bounding_rect(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

/// Centered square with a side of two thirds of the shorter frame edge.
pub fn default_scan_area(source: Size) -> Rect {
    let side = ((2.0 / 3.0) * source.width.min(source.height)).round();
    Rect::new(
        ((source.width - side) / 2.0).round(),
        ((source.height - side) / 2.0).round(),
        side,
        side,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::layout::{Anchor, AxisPosition, LayoutMode};

    const EPS: f64 = 1e-6;

    fn layout(mode: LayoutMode, anchor: Anchor, mirrored: bool) -> RenderLayout {
        RenderLayout {
            source: Size::new(1920.0, 1080.0),
            display: Size::new(640.0, 360.0),
            mode,
            anchor,
            mirrored,
        }
    }

    #[test]
    fn default_scan_area_is_centered_square() {
        let area = default_scan_area(Size::new(1920.0, 1080.0));
        assert_eq!(area, Rect::new(600.0, 180.0, 720.0, 720.0));

        let portrait = default_scan_area(Size::new(480.0, 640.0));
        assert_eq!(portrait, Rect::new(80.0, 160.0, 320.0, 320.0));
    }

    #[test]
    fn fit_exact_aspect_scenario() {
        let l = layout(LayoutMode::Fit, Anchor::CENTER, false);
        assert_eq!(scaled_size(&l), Size::new(640.0, 360.0));
        assert_eq!(anchor_offset(&l), Point::new(0.0, 0.0));

        let r = source_to_render(Rect::new(320.0, 140.0, 1280.0, 800.0), &l);
        let expected = Rect::new(
            320.0 * 640.0 / 1920.0,
            140.0 * 360.0 / 1080.0,
            1280.0 * 640.0 / 1920.0,
            800.0 * 360.0 / 1080.0,
        );
        assert!(r.approx_eq(&expected, EPS), "{r:?}");
        assert!((r.x - 106.666).abs() < 1e-2);
        assert!((r.height - 266.666).abs() < 1e-2);
    }

    #[test]
    fn mirrored_symmetric_scan_area() {
        let plain = layout(LayoutMode::Fit, Anchor::CENTER, false);
        let mirrored = layout(LayoutMode::Fit, Anchor::CENTER, true);
        let area = Rect::new(320.0, 140.0, 1280.0, 800.0);

        let a = source_to_render(area, &plain);
        let b = source_to_render(area, &mirrored);
        assert!((b.x - (640.0 - a.x - a.width)).abs() < EPS);
        assert!((b.x - 106.666).abs() < 1e-2);
    }

    #[test]
    fn mirrored_off_center_is_asymmetric() {
        // Box wider than the frame, anchored left: 640x360 frame inside 800x360.
        let mut l = layout(LayoutMode::Fit, Anchor::new(AxisPosition::Percent(0.0), AxisPosition::Percent(50.0)), false);
        l.display = Size::new(800.0, 360.0);
        let area = Rect::new(0.0, 0.0, 480.0, 270.0);

        let plain = source_to_render(area, &l);
        assert!(plain.approx_eq(&Rect::new(0.0, 0.0, 160.0, 90.0), EPS));

        l.mirrored = true;
        let flipped = source_to_render(area, &l);
        assert!(flipped.approx_eq(&Rect::new(480.0, 0.0, 160.0, 90.0), EPS));

        // Right-anchored: offset shifts both by the 160px of free space.
        l.anchor = Anchor::new(AxisPosition::Percent(100.0), AxisPosition::Percent(50.0));
        let flipped = source_to_render(area, &l);
        assert!(flipped.approx_eq(&Rect::new(640.0, 0.0, 160.0, 90.0), EPS));
    }

    #[test]
    fn fill_round_trip_law() {
        let mut l = layout(LayoutMode::Fill, Anchor::CENTER, false);
        for display in [(640.0, 360.0), (500.0, 500.0), (300.0, 800.0)] {
            l.display = Size::new(display.0, display.1);
            for rect in [
                Rect::new(0.0, 0.0, 1920.0, 1080.0),
                Rect::new(600.0, 180.0, 720.0, 720.0),
                Rect::new(13.5, 977.25, 40.0, 100.0),
            ] {
                let back = source_to_render(render_to_source(rect, &l), &l);
                assert!(back.approx_eq(&rect, 1e-6), "{display:?} {rect:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn every_mode_inverts() {
        for mode in [
            LayoutMode::Fit,
            LayoutMode::Fill,
            LayoutMode::Stretch,
            LayoutMode::None,
            LayoutMode::ScaleDown,
        ] {
            for mirrored in [false, true] {
                let mut l = layout(mode, Anchor::new(AxisPosition::Pixels(7.0), AxisPosition::Percent(20.0)), mirrored);
                l.display = Size::new(700.0, 300.0);
                let rect = Rect::new(100.0, 50.0, 300.0, 200.0);
                let back = render_to_source(source_to_render(rect, &l), &l);
                assert!(back.approx_eq(&rect, 1e-6), "{mode} mirrored={mirrored}");
            }
        }
    }

    #[test]
    fn mirror_twice_is_identity() {
        let rect = Rect::new(12.0, 3.0, 40.0, 8.0);
        for extent in [100.0, 52.0, 1920.0] {
            assert_eq!(mirror_x(mirror_x(rect, extent), extent), rect);
        }
    }

    #[test]
    fn crop_relative_symmetry() {
        let scan = Rect::new(600.0, 180.0, 720.0, 720.0);
        let local = Rect::new(10.0, 20.0, 30.0, 40.0);
        let source = crop_relative_to_source(local, &scan);
        assert_eq!(source, Rect::new(610.0, 200.0, 30.0, 40.0));
        assert_eq!(source_to_crop_relative(source, &scan), local);
        assert_eq!(
            crop_point_to_source(Point::new(1.0, 2.0), &scan),
            Point::new(601.0, 182.0)
        );
    }

    #[test]
    fn bounding_rect_of_corners() {
        let corners = [
            Point::new(10.0, 12.0),
            Point::new(50.0, 10.0),
            Point::new(52.0, 48.0),
            Point::new(9.0, 50.0),
        ];
        assert_eq!(
            bounding_rect(&corners),
            Some(Rect::new(9.0, 10.0, 43.0, 40.0))
        );
        assert_eq!(bounding_rect(&[]), None);
    }
}
