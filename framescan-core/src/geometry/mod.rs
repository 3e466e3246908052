//! Coordinate geometry for the scan pipeline.
//!
//! | Module      | Purpose                                              |
//! |-------------|------------------------------------------------------|
//! | `types`     | `Point`, `Size`, `Rect`, `PixelRect`                 |
//! | `layout`    | Layout modes, anchors, and the `RenderLayout` snapshot |
//! | `transform` | Pure conversions between the three coordinate spaces |

pub mod layout;
pub mod transform;
pub mod types;

pub use layout::{Anchor, AxisPosition, LayoutMode, RenderLayout};
pub use transform::{
    anchor_offset, bounding_rect, crop_point_to_source, crop_relative_to_source,
    default_scan_area, mirror_x, render_to_source, scaled_size, source_to_crop_relative,
    source_to_render,
};
pub use types::{PixelRect, Point, Rect, Size};
