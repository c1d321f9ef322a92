pub mod assemble;
pub mod attachments;
pub mod cancel;
pub mod capture;
mod error;
mod fonts;
pub mod geometry;
pub mod links;
pub mod model;
pub mod paginate;
pub mod pdf;
pub mod view;

pub use attachments::{AttachmentSource, ResolveMode, Resolver};
pub use cancel::{CancelFlag, CancelToken, NeverCancel};
pub use capture::{CaptureRoot, CaptureTarget};
pub use error::Error;
pub use model::PageGeometry;

use std::path::Path;
use std::time::Instant;

use crate::geometry::CoordinateMapper;

/// Settings of one export call.
pub struct ExportOptions<'a> {
    pub geometry: PageGeometry,
    /// Requested capture density; clamped to `capture::MAX_CAPTURE_SCALE`.
    pub capture_scale: f64,
    /// Banner text for a 1-based page number, repeated on every page.
    pub banner: &'a dyn Fn(usize) -> String,
    pub filename_base: &'a str,
    /// Attachments with no thumbnail. They get pages but no links.
    pub extra_attachments: &'a [String],
    pub title: Option<&'a str>,
}

fn page_number_banner(page: usize) -> String {
    format!("Page {page}")
}

impl Default for ExportOptions<'_> {
    fn default() -> Self {
        ExportOptions {
            geometry: PageGeometry::default(),
            capture_scale: 2.0,
            banner: &page_number_banner,
            filename_base: "report",
            extra_attachments: &[],
            title: None,
        }
    }
}

#[derive(Debug)]
pub struct ExportOutcome {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub page_count: usize,
    pub content_page_count: usize,
    pub annotation_count: usize,
    pub placeholder_count: usize,
}

impl ExportOutcome {
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        std::fs::write(path, &self.bytes)?;
        log::info!("Saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(())
    }
}

/// File name for a suggested base: anything outside `[A-Za-z0-9._-]`
/// becomes `_`, and `.pdf` is appended.
pub fn output_filename(base: &str) -> String {
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "report.pdf".to_string()
    } else {
        format!("{cleaned}.pdf")
    }
}

/// Capture `root`, paginate it, resolve its attachments and write the PDF.
pub fn export_report<T: CaptureTarget>(
    root: Option<&CaptureRoot<T>>,
    options: &ExportOptions<'_>,
    resolver: &Resolver<'_>,
    cancel: &dyn CancelToken,
) -> Result<ExportOutcome, Error> {
    let t0 = Instant::now();
    let geometry = PageGeometry::new(
        options.geometry.width,
        options.geometry.height,
        options.geometry.margin,
        options.geometry.banner_height,
    )?;

    cancel.check()?;
    let (capture, anchors) = capture::capture(root, options.capture_scale)?;
    let t_capture = t0.elapsed();

    let pagination = paginate::paginate(capture.width_px, capture.height_px, &geometry, options.banner);
    let n = pagination.page_count();

    let attachments = model::attachments_for(&anchors, options.extra_attachments);
    let resolved = resolver.resolve_all(&attachments, cancel)?;
    let t_resolve = t0.elapsed();

    let mapper = CoordinateMapper::new(capture.capture_scale, geometry.content_width(), capture.width_px);
    let page_map = links::attachment_page_map(&attachments, n);
    let annotations = links::compose(
        &anchors,
        |index| page_map.get(&index).copied(),
        &mapper,
        pagination.slice_height_units,
        n,
    );
    let document = assemble::assemble(&pagination.pages, attachments.len(), annotations)?;

    let bytes = pdf::write(
        &pdf::RenderInput {
            document: &document,
            capture: &capture,
            pagination: &pagination,
            attachments: &attachments,
            resolved: &resolved,
            geometry: &geometry,
            banner_for: options.banner,
            title: options.title,
        },
        cancel,
    )?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: capture={:.1}ms, resolve={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes)",
        t_capture.as_secs_f64() * 1000.0,
        (t_resolve - t_capture).as_secs_f64() * 1000.0,
        (t_total - t_resolve).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
    );

    Ok(ExportOutcome {
        bytes,
        filename: output_filename(options.filename_base),
        page_count: document.page_count(),
        content_page_count: n,
        annotation_count: document.annotations.len(),
        placeholder_count: resolved.iter().filter(|r| r.is_placeholder()).count(),
    })
}
