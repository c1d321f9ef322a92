use crate::error::Error;
use crate::model::{ExportDocument, LinkAnnotation, PageUnit};
use crate::paginate::ContentPage;

/// Lay out the final page order: every content page, then every
/// attachment page. Links are kept only from a content page to an
/// attachment page that exists, and are grouped by source page.
pub fn assemble(
    content_pages: &[ContentPage],
    attachment_count: usize,
    annotations: Vec<LinkAnnotation>,
) -> Result<ExportDocument, Error> {
    let n = content_pages.len();
    let total = n + attachment_count;
    if total == 0 {
        return Err(Error::Assembly("document has no pages".into()));
    }

    let pages: Vec<PageUnit> = content_pages
        .iter()
        .map(|p| PageUnit::Content {
            slice_index: p.slice_index,
        })
        .chain((0..attachment_count).map(|i| PageUnit::Attachment {
            attachment_index: i,
        }))
        .collect();

    let before = annotations.len();
    let mut kept: Vec<LinkAnnotation> = annotations
        .into_iter()
        .filter(|a| (1..=n).contains(&a.source_page) && (n + 1..=total).contains(&a.target_page))
        .collect();
    if kept.len() != before {
        log::debug!("Dropped {} links without a valid page", before - kept.len());
    }
    // Stable: links on one page keep their anchor order.
    kept.sort_by_key(|a| a.source_page);

    Ok(ExportDocument {
        pages,
        annotations: kept,
    })
}
