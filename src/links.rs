use std::collections::HashMap;

use crate::geometry::CoordinateMapper;
use crate::model::{AnchorRegion, Attachment, LinkAnnotation, UnitRect};

/// Anchor index → 1-based page number of its attachment page, given
/// `content_page_count` content pages in front.
pub fn attachment_page_map(
    attachments: &[Attachment],
    content_page_count: usize,
) -> HashMap<usize, usize> {
    attachments
        .iter()
        .enumerate()
        .map(|(position, a)| (a.index, content_page_count + position + 1))
        .collect()
}

/// One link per anchor that has both a target page and a position on an
/// existing content page. Anything else yields no link.
pub fn compose(
    anchors: &[AnchorRegion],
    attachment_page_of: impl Fn(usize) -> Option<usize>,
    mapper: &CoordinateMapper,
    slice_height_units: f64,
    content_page_count: usize,
) -> Vec<LinkAnnotation> {
    let mut links = Vec::with_capacity(anchors.len());
    for anchor in anchors {
        if anchor.source_ref.is_empty() {
            continue;
        }
        let Some(target_page) = attachment_page_of(anchor.index) else {
            log::debug!("Anchor {} has no attachment page", anchor.index);
            continue;
        };
        let rect = mapper.map(anchor.rect);
        let (page_index, local_y) = mapper.page_of(rect.y, slice_height_units);
        if page_index < 0 || page_index as usize >= content_page_count {
            log::debug!(
                "Anchor {} lies outside the content pages (page index {page_index})",
                anchor.index
            );
            continue;
        }
        // A thumbnail cut by the slice boundary links only its visible part.
        let h = rect.h.min(slice_height_units - local_y);
        links.push(LinkAnnotation {
            source_page: page_index as usize + 1,
            rect: UnitRect::new(rect.x, local_y, rect.w, h),
            target_page,
        });
    }
    links
}
