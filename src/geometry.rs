//! Coordinate conversion between the three spaces an export touches:
//! CSS pixels of the on-screen panel, pixels of the captured bitmap, and
//! points on the output page.
//!
//! Everything here is pure and free of any rendering surface, so the
//! pagination and link code can be checked without a panel at all.

use crate::model::{CssRect, UnitRect};

/// Output units covered by one bitmap pixel when a bitmap `bitmap_width_px`
/// wide is scaled to `output_width_units`.
pub fn units_per_pixel(output_width_units: f64, bitmap_width_px: u32) -> f64 {
    if bitmap_width_px == 0 {
        return 0.0;
    }
    output_width_units / bitmap_width_px as f64
}

/// `rect * capture_scale * units_per_pixel`, component-wise.
pub fn map_rect(rect: CssRect, capture_scale: f64, units_per_pixel: f64) -> UnitRect {
    let k = capture_scale * units_per_pixel;
    UnitRect::new(rect.x * k, rect.y * k, rect.w * k, rect.h * k)
}

/// Page holding the vertical offset `y_units`, plus the offset local to
/// that page. A point exactly on a boundary `k * page_height_units` belongs
/// to page `k`. Offsets above the first page yield negative indices.
///
/// Panics when `page_height_units` is not strictly positive.
pub fn page_of(y_units: f64, page_height_units: f64) -> (i64, f64) {
    assert!(
        page_height_units > 0.0,
        "page height must be positive, got {page_height_units}"
    );
    let mut index = (y_units / page_height_units).floor();
    // The quotient can land one ulp either side of an integer; settle the
    // index against the products actually used for the local offset.
    if (index + 1.0) * page_height_units <= y_units {
        index += 1.0;
    } else if index * page_height_units > y_units {
        index -= 1.0;
    }
    (index as i64, y_units - index * page_height_units)
}

/// The transform of one export: capture scale and the bitmap-to-page ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    pub capture_scale: f64,
    pub units_per_pixel: f64,
}

impl CoordinateMapper {
    pub fn new(capture_scale: f64, output_width_units: f64, bitmap_width_px: u32) -> Self {
        CoordinateMapper {
            capture_scale,
            units_per_pixel: units_per_pixel(output_width_units, bitmap_width_px),
        }
    }

    pub fn map(&self, rect: CssRect) -> UnitRect {
        map_rect(rect, self.capture_scale, self.units_per_pixel)
    }

    /// `page_of` for a rectangle already mapped by this transform.
    pub fn page_of(&self, y_units: f64, page_height_units: f64) -> (i64, f64) {
        page_of(y_units, page_height_units)
    }

    pub fn pixels_to_units(&self, px: u32) -> f64 {
        px as f64 * self.units_per_pixel
    }
}

/// Largest rectangle with the aspect ratio `content_w : content_h` that fits
/// inside `frame`, centered in it.
pub fn fit_centered(content_w: f64, content_h: f64, frame: UnitRect) -> UnitRect {
    if content_w <= 0.0 || content_h <= 0.0 {
        return UnitRect::new(frame.x + frame.w / 2.0, frame.y + frame.h / 2.0, 0.0, 0.0);
    }
    let scale = (frame.w / content_w).min(frame.h / content_h);
    let (w, h) = (content_w * scale, content_h * scale);
    UnitRect::new(
        frame.x + (frame.w - w) / 2.0,
        frame.y + (frame.h - h) / 2.0,
        w,
        h,
    )
}
