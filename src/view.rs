//! Capture targets backed by plain data rather than a live UI.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::capture::{CaptureTarget, Thumbnail};
use crate::model::CssRect;

#[derive(Clone, Debug)]
pub enum PanelElement {
    /// Opaque box: text line, table cell, chart bar.
    Block { rect: CssRect, color: [u8; 3] },
    /// Inline image linked to its full-resolution attachment.
    Thumbnail {
        rect: CssRect,
        source_ref: String,
        preview: Option<RgbaImage>,
    },
    /// Interactive control, left out of exports.
    Control { rect: CssRect, color: [u8; 3] },
}

/// An in-memory report panel. Element rectangles are in viewport CSS
/// pixels, like the panel's own `bounds`.
#[derive(Clone, Debug)]
pub struct ReportPanel {
    bounds: CssRect,
    background: [u8; 3],
    elements: Vec<PanelElement>,
    controls_hidden: bool,
}

impl ReportPanel {
    pub fn new(bounds: CssRect) -> Self {
        ReportPanel {
            bounds,
            background: [255, 255, 255],
            elements: Vec::new(),
            controls_hidden: false,
        }
    }

    pub fn with_background(mut self, color: [u8; 3]) -> Self {
        self.background = color;
        self
    }

    pub fn push(&mut self, element: PanelElement) {
        self.elements.push(element);
    }

    pub fn block(mut self, rect: CssRect, color: [u8; 3]) -> Self {
        self.push(PanelElement::Block { rect, color });
        self
    }

    pub fn thumbnail(mut self, rect: CssRect, source_ref: impl Into<String>) -> Self {
        self.push(PanelElement::Thumbnail {
            rect,
            source_ref: source_ref.into(),
            preview: None,
        });
        self
    }

    pub fn control(mut self, rect: CssRect, color: [u8; 3]) -> Self {
        self.push(PanelElement::Control { rect, color });
        self
    }

    pub fn controls_hidden(&self) -> bool {
        self.controls_hidden
    }

    fn fill(&self, canvas: &mut RgbaImage, rect: CssRect, scale: f64, color: [u8; 3]) {
        let (x0, y0, x1, y1) = self.pixel_span(canvas, rect, scale);
        let px = Rgba([color[0], color[1], color[2], 255]);
        for y in y0..y1 {
            for x in x0..x1 {
                canvas.put_pixel(x, y, px);
            }
        }
    }

    /// Pixel span of `rect` on the canvas, clipped to it.
    fn pixel_span(&self, canvas: &RgbaImage, rect: CssRect, scale: f64) -> (u32, u32, u32, u32) {
        let clamp = |v: f64, max: u32| -> u32 { v.round().clamp(0.0, max as f64) as u32 };
        let (w, h) = canvas.dimensions();
        let x0 = clamp((rect.x - self.bounds.x) * scale, w);
        let y0 = clamp((rect.y - self.bounds.y) * scale, h);
        let x1 = clamp((rect.x - self.bounds.x + rect.w) * scale, w);
        let y1 = clamp((rect.y - self.bounds.y + rect.h) * scale, h);
        (x0, y0, x1, y1)
    }
}

impl CaptureTarget for ReportPanel {
    fn bounds(&self) -> CssRect {
        self.bounds
    }

    fn thumbnails(&self) -> Vec<Thumbnail> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                PanelElement::Thumbnail {
                    rect, source_ref, ..
                } => Some(Thumbnail {
                    source_ref: source_ref.clone(),
                    rect: *rect,
                }),
                _ => None,
            })
            .collect()
    }

    fn set_controls_hidden(&mut self, hidden: bool) {
        self.controls_hidden = hidden;
    }

    fn rasterize(&mut self, scale: f64) -> Result<RgbaImage, String> {
        let w = (self.bounds.w * scale).ceil();
        let h = (self.bounds.h * scale).ceil();
        if !(w.is_finite() && h.is_finite()) || w < 0.0 || h < 0.0 {
            return Err(format!("panel has unusable size {}x{}", self.bounds.w, self.bounds.h));
        }
        let [r, g, b] = self.background;
        let mut canvas = RgbaImage::from_pixel(w as u32, h as u32, Rgba([r, g, b, 255]));

        for element in &self.elements {
            match element {
                PanelElement::Block { rect, color } => self.fill(&mut canvas, *rect, scale, *color),
                PanelElement::Control { rect, color } => {
                    if !self.controls_hidden {
                        self.fill(&mut canvas, *rect, scale, *color);
                    }
                }
                PanelElement::Thumbnail { rect, preview, .. } => {
                    let (x0, y0, x1, y1) = self.pixel_span(&canvas, *rect, scale);
                    match preview {
                        Some(img) if x1 > x0 && y1 > y0 => {
                            let scaled =
                                imageops::resize(img, x1 - x0, y1 - y0, FilterType::Triangle);
                            imageops::overlay(&mut canvas, &scaled, x0 as i64, y0 as i64);
                        }
                        _ => self.fill(&mut canvas, *rect, scale, [200, 200, 200]),
                    }
                }
            }
        }
        Ok(canvas)
    }
}

/// A panel that was rendered elsewhere: the bitmap at `native_scale` and
/// the thumbnail anchors in CSS pixels relative to the bitmap's top-left.
#[derive(Clone, Debug)]
pub struct BitmapPanel {
    bitmap: RgbaImage,
    native_scale: f64,
    thumbnails: Vec<Thumbnail>,
}

impl BitmapPanel {
    pub fn new(bitmap: RgbaImage, native_scale: f64, thumbnails: Vec<Thumbnail>) -> Self {
        BitmapPanel {
            bitmap,
            native_scale,
            thumbnails,
        }
    }
}

impl CaptureTarget for BitmapPanel {
    fn bounds(&self) -> CssRect {
        let (w, h) = self.bitmap.dimensions();
        CssRect::new(
            0.0,
            0.0,
            w as f64 / self.native_scale,
            h as f64 / self.native_scale,
        )
    }

    fn thumbnails(&self) -> Vec<Thumbnail> {
        self.thumbnails.clone()
    }

    // Controls were already left out when the bitmap was rendered.
    fn set_controls_hidden(&mut self, _hidden: bool) {}

    fn rasterize(&mut self, scale: f64) -> Result<RgbaImage, String> {
        if !self.native_scale.is_finite() || self.native_scale <= 0.0 {
            return Err(format!("invalid native scale {}", self.native_scale));
        }
        if (scale - self.native_scale).abs() < f64::EPSILON {
            return Ok(self.bitmap.clone());
        }
        let ratio = scale / self.native_scale;
        let (w, h) = self.bitmap.dimensions();
        let nw = (w as f64 * ratio).round() as u32;
        let nh = (h as f64 * ratio).round() as u32;
        if nw == 0 || nh == 0 {
            return Ok(RgbaImage::new(nw, nh));
        }
        Ok(imageops::resize(&self.bitmap, nw, nh, FilterType::Triangle))
    }
}
