use image::RgbaImage;

use crate::error::Error;

/// Rectangle in CSS pixels, relative to the captured root.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CssRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl CssRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        CssRect { x, y, w, h }
    }

    pub fn scaled(&self, k: f64) -> Self {
        CssRect::new(self.x * k, self.y * k, self.w * k, self.h * k)
    }
}

/// Rectangle in output units (PDF points). Page-local rectangles use a
/// top-left origin; the writer flips them into PDF space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UnitRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl UnitRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        UnitRect { x, y, w, h }
    }

    pub fn scaled(&self, k: f64) -> Self {
        UnitRect::new(self.x * k, self.y * k, self.w * k, self.h * k)
    }
}

pub struct CaptureResult {
    pub bitmap: RgbaImage,
    pub width_px: u32,
    pub height_px: u32,
    pub capture_scale: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnchorRegion {
    pub index: usize,
    /// Empty when the thumbnail has no full-resolution counterpart.
    pub source_ref: String,
    pub rect: CssRect,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    pub index: usize,
    pub source_ref: String,
}

/// Attachments in page order: one per anchor with a non-empty reference,
/// then any unreferenced extras numbered after the last anchor.
pub fn attachments_for(anchors: &[AnchorRegion], extra: &[String]) -> Vec<Attachment> {
    let mut out: Vec<Attachment> = anchors
        .iter()
        .filter(|a| !a.source_ref.is_empty())
        .map(|a| Attachment {
            index: a.index,
            source_ref: a.source_ref.clone(),
        })
        .collect();
    let next = anchors.iter().map(|a| a.index + 1).max().unwrap_or(0);
    out.extend(
        extra
            .iter()
            .filter(|r| !r.is_empty())
            .enumerate()
            .map(|(i, r)| Attachment {
                index: next + i,
                source_ref: r.clone(),
            }),
    );
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageUnit {
    Content { slice_index: usize },
    /// `attachment_index` is the position in the attachment list, not the
    /// anchor index.
    Attachment { attachment_index: usize },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkAnnotation {
    pub source_page: usize,
    pub rect: UnitRect,
    pub target_page: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportDocument {
    pub pages: Vec<PageUnit>,
    /// Grouped by `source_page`, insertion order kept within a page.
    pub annotations: Vec<LinkAnnotation>,
}

impl ExportDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn content_page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p, PageUnit::Content { .. }))
            .count()
    }

    pub fn attachment_page_count(&self) -> usize {
        self.page_count() - self.content_page_count()
    }

    pub fn annotations_on(&self, page_number: usize) -> impl Iterator<Item = &LinkAnnotation> {
        self.annotations
            .iter()
            .filter(move |a| a.source_page == page_number)
    }
}

/// Output page geometry in points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    /// Band below the top margin reserved for the banner.
    pub banner_height: f64,
}

pub const MM: f64 = 72.0 / 25.4;

impl PageGeometry {
    pub fn new(width: f64, height: f64, margin: f64, banner_height: f64) -> Result<Self, Error> {
        let all_finite = [width, height, margin, banner_height]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite || width <= 0.0 || height <= 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "page must have a positive size, got {width}x{height}"
            )));
        }
        if margin < 0.0 || banner_height < 0.0 {
            return Err(Error::InvalidGeometry(
                "margin and banner height must not be negative".into(),
            ));
        }
        let geometry = PageGeometry {
            width,
            height,
            margin,
            banner_height,
        };
        if geometry.content_width() <= 0.0 || geometry.slice_height() <= 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "margins leave no printable body on a {width}x{height} page"
            )));
        }
        Ok(geometry)
    }

    pub fn a4() -> Self {
        PageGeometry {
            width: 595.28,
            height: 841.89,
            margin: 10.0 * MM,
            banner_height: 22.0,
        }
    }

    pub fn letter() -> Self {
        PageGeometry {
            width: 612.0,
            height: 792.0,
            margin: 10.0 * MM,
            banner_height: 22.0,
        }
    }

    /// Width the captured bitmap is scaled to.
    pub fn content_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    /// Height of one bitmap slice on a content page.
    pub fn slice_height(&self) -> f64 {
        self.height - 2.0 * self.margin - self.banner_height
    }

    /// Page body below the banner, top-left origin.
    pub fn body(&self) -> UnitRect {
        UnitRect::new(
            self.margin,
            self.margin + self.banner_height,
            self.content_width(),
            self.slice_height(),
        )
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        PageGeometry::a4()
    }
}
