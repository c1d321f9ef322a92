use crate::geometry::{page_of, units_per_pixel};
use crate::model::PageGeometry;

/// One vertical slice of the captured bitmap.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentPage {
    pub slice_index: usize,
    /// 1-based.
    pub page_number: usize,
    pub banner: String,
    /// Distance from the top of the scaled bitmap to the top of this slice.
    pub offset_units: f64,
    /// Height of bitmap actually shown; only the last slice can be short.
    pub visible_height_units: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pagination {
    pub pages: Vec<ContentPage>,
    pub units_per_pixel: f64,
    pub image_width_units: f64,
    pub image_height_units: f64,
    pub slice_height_units: f64,
}

impl Pagination {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Slice a `bitmap_width_px` x `bitmap_height_px` bitmap, scaled to the
/// page's content width, into content pages of `geometry.slice_height()`.
///
/// Slicing is straight horizontal cuts; an element straddling a cut is
/// split across the two pages.
pub fn paginate(
    bitmap_width_px: u32,
    bitmap_height_px: u32,
    geometry: &PageGeometry,
    banner_for: &dyn Fn(usize) -> String,
) -> Pagination {
    let upp = units_per_pixel(geometry.content_width(), bitmap_width_px);
    let image_height_units = bitmap_height_px as f64 * upp;
    let slice = geometry.slice_height();

    // The bottom edge of the bitmap opens a new page only if more than half a
    // pixel of it lies past the last full slice. Smaller spills are rounding.
    let (last, spill) = page_of(image_height_units, slice);
    let count = if spill > upp * 0.5 { last + 1 } else { last }.max(1) as usize;

    let pages = (0..count)
        .map(|slice_index| {
            let offset_units = slice_index as f64 * slice;
            ContentPage {
                slice_index,
                page_number: slice_index + 1,
                banner: banner_for(slice_index + 1),
                offset_units,
                visible_height_units: (image_height_units - offset_units).clamp(0.0, slice),
            }
        })
        .collect();

    log::debug!(
        "Paginated {bitmap_width_px}x{bitmap_height_px}px ({image_height_units:.1}pt tall) into {count} pages of {slice:.1}pt"
    );

    Pagination {
        pages,
        units_per_pixel: upp,
        image_width_units: geometry.content_width(),
        image_height_units,
        slice_height_units: slice,
    }
}
