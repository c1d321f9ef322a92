mod chrome;
mod images;

use std::time::Instant;

use pdf_writer::types::{ActionType, AnnotationType};
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, TextStr};

use crate::attachments::{ResolvedAttachment, truncate_ref};
use crate::cancel::CancelToken;
use crate::error::Error;
use crate::fonts::register_helvetica;
use crate::geometry::fit_centered;
use crate::model::{Attachment, CaptureResult, ExportDocument, PageGeometry, PageUnit, UnitRect};
use crate::paginate::Pagination;

use chrome::{draw_banner, draw_caption, draw_placeholder};
use images::{embed_image, embed_rgba};

const REPORT_IMAGE: &str = "Im0";

/// Everything the writer needs about one export.
pub struct RenderInput<'a> {
    pub document: &'a ExportDocument,
    pub capture: &'a CaptureResult,
    pub pagination: &'a Pagination,
    pub attachments: &'a [Attachment],
    pub resolved: &'a [ResolvedAttachment],
    pub geometry: &'a PageGeometry,
    /// Banner of attachment pages; content pages carry their own.
    pub banner_for: &'a dyn Fn(usize) -> String,
    pub title: Option<&'a str>,
}

/// Page-local rectangle (top-left origin, relative to the page body) to a
/// PDF rectangle.
fn body_rect_to_pdf(geometry: &PageGeometry, rect: &UnitRect) -> Rect {
    let body = geometry.body();
    let x = body.x + rect.x;
    let top = geometry.height - (body.y + rect.y);
    Rect::new(x as f32, (top - rect.h) as f32, (x + rect.w) as f32, top as f32)
}

/// Draw `name` into a page-space rectangle (top-left origin).
fn place_image(content: &mut Content, geometry: &PageGeometry, rect: &UnitRect, name: &str) {
    let bottom = geometry.height - rect.y - rect.h;
    content.save_state();
    content.transform([
        rect.w as f32,
        0.0,
        0.0,
        rect.h as f32,
        rect.x as f32,
        bottom as f32,
    ]);
    content.x_object(Name(name.as_bytes()));
    content.restore_state();
}

pub fn write(input: &RenderInput<'_>, cancel: &dyn CancelToken) -> Result<Vec<u8>, Error> {
    let t0 = Instant::now();
    let doc = input.document;
    let geometry = input.geometry;
    let n = doc.page_count();
    if n == 0 {
        return Err(Error::Serialization("document has no pages".into()));
    }
    if input.attachments.len() != input.resolved.len() {
        return Err(Error::Serialization(format!(
            "{} attachments but {} resolved images",
            input.attachments.len(),
            input.resolved.len()
        )));
    }

    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();
    let font = register_helvetica(&mut pdf, alloc(), "F1");

    // Phase 1: the captured report, embedded once and shared by every
    // content page.
    cancel.check()?;
    let report_ref = embed_rgba(&mut pdf, &mut alloc, &input.capture.bitmap);

    // Phase 2: one image per resolved attachment.
    let mut attachment_refs: Vec<Option<Ref>> = Vec::with_capacity(input.resolved.len());
    for resolved in input.resolved {
        attachment_refs.push(match resolved {
            ResolvedAttachment::Image(img) => {
                cancel.check()?;
                Some(embed_image(&mut pdf, &mut alloc, img))
            }
            ResolvedAttachment::Placeholder(_) => None,
        });
    }
    let t_images = t0.elapsed();

    // Phase 3: page content.
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let attachment_total = input.resolved.len();
    let body = geometry.body();
    let page_h = geometry.height;

    let mut page_xobjects: Vec<Option<(String, Ref)>> = Vec::with_capacity(n);
    for (i, unit) in doc.pages.iter().enumerate() {
        cancel.check()?;
        let page_number = i + 1;
        let mut content = Content::new();

        match *unit {
            PageUnit::Content { slice_index } => {
                let page = input.pagination.pages.get(slice_index).ok_or_else(|| {
                    Error::Serialization(format!("no slice {slice_index} for page {page_number}"))
                })?;
                draw_banner(&mut content, &font, geometry, &page.banner);

                content.save_state();
                content.rect(
                    body.x as f32,
                    (page_h - body.y - body.h) as f32,
                    body.w as f32,
                    body.h as f32,
                );
                content.clip_nonzero();
                content.end_path();
                let image_rect = UnitRect::new(
                    body.x,
                    body.y - page.offset_units,
                    input.pagination.image_width_units,
                    input.pagination.image_height_units,
                );
                place_image(&mut content, geometry, &image_rect, REPORT_IMAGE);
                content.restore_state();

                page_xobjects.push(Some((REPORT_IMAGE.to_string(), report_ref)));
            }
            PageUnit::Attachment { attachment_index } => {
                let (Some(attachment), Some(resolved)) = (
                    input.attachments.get(attachment_index),
                    input.resolved.get(attachment_index),
                ) else {
                    return Err(Error::Serialization(format!(
                        "page {page_number} refers to missing attachment {attachment_index}"
                    )));
                };
                draw_banner(&mut content, &font, geometry, &(input.banner_for)(page_number));
                draw_caption(
                    &mut content,
                    &font,
                    geometry,
                    &format!(
                        "Attachment {} of {attachment_total}: {}",
                        attachment_index + 1,
                        truncate_ref(&attachment.source_ref)
                    ),
                );

                match (resolved, attachment_refs[attachment_index]) {
                    (ResolvedAttachment::Image(img), Some(xobj_ref)) => {
                        let name = format!("Att{}", attachment_index + 1);
                        let frame = fit_centered(img.width_px as f64, img.height_px as f64, body);
                        place_image(&mut content, geometry, &frame, &name);
                        page_xobjects.push(Some((name, xobj_ref)));
                    }
                    (ResolvedAttachment::Placeholder(placeholder), _) => {
                        draw_placeholder(&mut content, &font, geometry, placeholder);
                        page_xobjects.push(None);
                    }
                    (ResolvedAttachment::Image(_), None) => {
                        return Err(Error::Serialization(format!(
                            "attachment {attachment_index} image was not embedded"
                        )));
                    }
                }
            }
        }

        let raw = content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
    }
    let t_pages = t0.elapsed();

    // Phase 4: link annotations, grouped per source page.
    let mut page_annot_refs: Vec<Vec<Ref>> = vec![Vec::new(); n];
    for link in &doc.annotations {
        let (Some(annots), Some(&target)) = (
            page_annot_refs.get_mut(link.source_page.wrapping_sub(1)),
            page_ids.get(link.target_page.wrapping_sub(1)),
        ) else {
            return Err(Error::Serialization(format!(
                "link from page {} to page {} is out of range",
                link.source_page, link.target_page
            )));
        };
        let annot_ref = alloc();
        let mut annot = pdf.annotation(annot_ref);
        annot
            .subtype(AnnotationType::Link)
            .rect(body_rect_to_pdf(geometry, &link.rect))
            .border(0.0, 0.0, 0.0, None);
        annot
            .action()
            .action_type(ActionType::GoTo)
            .destination()
            .page(target)
            .xyz(0.0, page_h as f32, None);
        annots.push(annot_ref);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(n as i32);
    {
        let mut info = pdf.document_info(info_id);
        info.producer(TextStr("report-pdf-export"));
        if let Some(title) = input.title {
            info.title(TextStr(title));
        }
    }

    for i in 0..n {
        let mut page = pdf.page(page_ids[i]);
        page.media_box(Rect::new(0.0, 0.0, geometry.width as f32, page_h as f32))
            .parent(pages_id)
            .contents(content_ids[i]);
        if !page_annot_refs[i].is_empty() {
            page.annotations(page_annot_refs[i].iter().copied());
        }
        {
            let mut resources = page.resources();
            resources.fonts().pair(Name(font.pdf_name.as_bytes()), font.font_ref);
            if let Some((name, xobj_ref)) = &page_xobjects[i] {
                resources.x_objects().pair(Name(name.as_bytes()), *xobj_ref);
            }
        }
    }

    let bytes = pdf.finish();
    let t_total = t0.elapsed();

    log::info!(
        "Write phases: images={:.1}ms, pages={:.1}ms, links+trailer={:.1}ms ({} pages, {} links, {} bytes)",
        t_images.as_secs_f64() * 1000.0,
        (t_pages - t_images).as_secs_f64() * 1000.0,
        (t_total - t_pages).as_secs_f64() * 1000.0,
        n,
        doc.annotations.len(),
        bytes.len(),
    );

    Ok(bytes)
}
