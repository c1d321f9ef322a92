mod common;

use common::{CancelAfter, OfflineSource, init_logging, page_count, page_image_count, pdf_links, png_bytes, round_geometry};
use report_pdf_export::attachments::MemorySource;
use report_pdf_export::model::CssRect;
use report_pdf_export::view::ReportPanel;
use report_pdf_export::{
    CancelFlag, CaptureRoot, Error, ExportOptions, NeverCancel, PageGeometry, ResolveMode,
    Resolver, export_report, output_filename,
};

fn banner(page: usize) -> String {
    format!("Branch 12 audit - page {page}")
}

/// 500 x 1750 CSS px; captured at scale 2 onto a 500pt wide body that is
/// one point per CSS px and 2.5 slices tall.
fn report_panel() -> ReportPanel {
    ReportPanel::new(CssRect::new(0.0, 0.0, 500.0, 1750.0))
        .block(CssRect::new(0.0, 0.0, 500.0, 40.0), [20, 60, 120])
        .thumbnail(CssRect::new(10.0, 100.0, 40.0, 30.0), "a.png")
        .thumbnail(CssRect::new(10.0, 800.0, 40.0, 30.0), "")
        .thumbnail(CssRect::new(10.0, 1500.0, 40.0, 30.0), "c.png")
        .control(CssRect::new(450.0, 5.0, 40.0, 20.0), [200, 0, 0])
}

fn options() -> ExportOptions<'static> {
    ExportOptions {
        geometry: round_geometry(),
        capture_scale: 2.0,
        banner: &banner,
        filename_base: "branch-12 audit",
        ..ExportOptions::default()
    }
}

fn sources() -> MemorySource {
    MemorySource::new()
        .with("a.png", png_bytes(300, 200, [0, 128, 0]))
        .with("c.png", png_bytes(120, 480, [128, 0, 0]))
}

#[test]
fn thumbnails_link_to_their_attachment_pages() {
    init_logging();
    let root = CaptureRoot::new(report_panel());
    let source = sources();
    let resolver = Resolver::new().with_primary(&source);

    let outcome = export_report(Some(&root), &options(), &resolver, &NeverCancel).unwrap();

    assert_eq!(outcome.content_page_count, 3);
    assert_eq!(outcome.page_count, 5);
    assert_eq!(outcome.annotation_count, 2);
    assert_eq!(outcome.placeholder_count, 0);
    assert_eq!(outcome.filename, "branch-12_audit.pdf");
    assert_eq!(page_count(&outcome.bytes), 5);

    let links = pdf_links(&outcome.bytes);
    assert_eq!(links.len(), 2);
    assert_eq!((links[0].source_page, links[0].target_page), (1, 4));
    assert_eq!((links[1].source_page, links[1].target_page), (3, 5));

    // Body starts 50pt from the left and top of an 800pt page.
    let expected = [60.0, 620.0, 100.0, 650.0];
    for link in &links {
        for (got, want) in link.rect.iter().zip(expected) {
            assert!((got - want).abs() < 0.01, "{:?} vs {expected:?}", link.rect);
        }
    }

    for page in 1..=5 {
        assert_eq!(page_image_count(&outcome.bytes, page), 1, "page {page}");
    }
    assert!(!root.with(|view| view.controls_hidden()));
}

#[test]
fn failed_attachment_keeps_its_page_as_placeholder() {
    let root = CaptureRoot::new(report_panel());
    let source = MemorySource::new().with("a.png", png_bytes(300, 200, [0, 128, 0]));
    let resolver = Resolver::new()
        .with_primary(&source)
        .with_fallback(&OfflineSource);

    let outcome = export_report(Some(&root), &options(), &resolver, &NeverCancel).unwrap();

    assert_eq!(outcome.page_count, 5);
    assert_eq!(outcome.placeholder_count, 1);
    assert_eq!(page_count(&outcome.bytes), 5);
    assert_eq!(page_image_count(&outcome.bytes, 4), 1);
    assert_eq!(page_image_count(&outcome.bytes, 5), 0);

    let pairs: Vec<(u32, u32)> = pdf_links(&outcome.bytes)
        .iter()
        .map(|l| (l.source_page, l.target_page))
        .collect();
    assert_eq!(pairs, vec![(1, 4), (3, 5)]);
}

#[test]
fn repeated_exports_agree() {
    let source = sources();
    let resolver = Resolver::new().with_primary(&source);
    let run = || {
        let root = CaptureRoot::new(report_panel());
        let outcome = export_report(Some(&root), &options(), &resolver, &NeverCancel).unwrap();
        let pairs: Vec<(u32, u32)> = pdf_links(&outcome.bytes)
            .iter()
            .map(|l| (l.source_page, l.target_page))
            .collect();
        (outcome.page_count, pairs)
    };
    assert_eq!(run(), run());
}

#[test]
fn parallel_resolution_gives_the_same_document() {
    let source = sources();
    let sequential = Resolver::new().with_primary(&source);
    let parallel = sequential.with_mode(ResolveMode::Parallel { jobs: 3 });

    let root = CaptureRoot::new(report_panel());
    let a = export_report(Some(&root), &options(), &sequential, &NeverCancel).unwrap();
    let b = export_report(Some(&root), &options(), &parallel, &NeverCancel).unwrap();
    assert_eq!(a.bytes, b.bytes);
}

#[test]
fn unreferenced_attachments_get_unlinked_pages() {
    let root = CaptureRoot::new(report_panel());
    let source = sources().with("sig.png", png_bytes(50, 20, [0, 0, 0]));
    let resolver = Resolver::new().with_primary(&source);
    let extra = vec!["sig.png".to_string()];
    let options = ExportOptions {
        extra_attachments: &extra,
        ..options()
    };

    let outcome = export_report(Some(&root), &options, &resolver, &NeverCancel).unwrap();
    assert_eq!(outcome.page_count, 6);
    assert_eq!(outcome.annotation_count, 2);
    assert!(pdf_links(&outcome.bytes).iter().all(|l| l.target_page != 6));
}

#[test]
fn cancelled_export_leaves_the_view_untouched() {
    let root = CaptureRoot::new(report_panel());
    let source = sources();
    let resolver = Resolver::new().with_primary(&source);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = export_report(Some(&root), &options(), &resolver, &cancel).err().unwrap();
    assert!(matches!(err, Error::Cancelled));
    assert!(!root.with(|view| view.controls_hidden()));
}

#[test]
fn missing_root_fails_at_capture() {
    let resolver = Resolver::new();
    let err = export_report::<ReportPanel>(None, &options(), &resolver, &NeverCancel)
        .err()
        .unwrap();
    assert_eq!(err.stage(), "capture failed");
}

#[test]
fn invalid_geometry_is_rejected_before_capture() {
    let root = CaptureRoot::new(report_panel());
    let options = ExportOptions {
        geometry: PageGeometry {
            width: 100.0,
            height: 100.0,
            margin: 60.0,
            banner_height: 0.0,
        },
        ..options()
    };
    let err = export_report(Some(&root), &options, &Resolver::new(), &NeverCancel)
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidGeometry(_)));
}

#[test]
fn default_a4_export_with_banner() {
    let root = CaptureRoot::new(report_panel());
    let source = sources();
    let resolver = Resolver::new().with_primary(&source);
    let options = ExportOptions {
        geometry: PageGeometry::a4(),
        banner: &banner,
        title: Some("Branch 12 audit"),
        ..ExportOptions::default()
    };

    let outcome = export_report(Some(&root), &options, &resolver, &NeverCancel).unwrap();
    // 1750 CSS px onto 538.6pt: 1885pt of report over 763pt slices.
    assert_eq!(outcome.content_page_count, 3);
    assert_eq!(page_count(&outcome.bytes), outcome.page_count);
    assert_eq!(outcome.filename, "report.pdf");
}

#[test]
fn filenames_are_sanitized() {
    assert_eq!(output_filename("Branch 7 / weekly QA"), "Branch_7___weekly_QA.pdf");
    assert_eq!(output_filename("  "), "report.pdf");
    assert_eq!(output_filename("..."), "report.pdf");
    assert_eq!(output_filename("audit-2026.10"), "audit-2026.10.pdf");
}

#[test]
fn saving_into_a_missing_directory_is_a_write_failure() {
    let root = CaptureRoot::new(report_panel());
    let outcome = export_report(Some(&root), &options(), &Resolver::new(), &NeverCancel).unwrap();
    assert_eq!(outcome.placeholder_count, 2);

    let dir = std::env::temp_dir().join(format!("report-pdf-export-save-{}", std::process::id()));
    let err = outcome.save(&dir.join("missing").join("out.pdf")).err().unwrap();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(err.stage(), "write failed");

    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(&outcome.filename);
    outcome.save(&path).unwrap();
    assert_eq!(page_count(&std::fs::read(&path).unwrap()), 5);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn cancelling_at_any_later_check_aborts_cleanly() {
    let source = sources();
    let resolver = Resolver::new().with_primary(&source);

    // Count the checks of a full export, then cancel at each one in turn:
    // before capture, between fetches and decodes, before each image and page.
    let full = CancelAfter::new(usize::MAX);
    let root = CaptureRoot::new(report_panel());
    export_report(Some(&root), &options(), &resolver, &full).unwrap();
    let total = full.checks();
    assert!(total > 5, "only {total} cancellation checks");

    for k in 0..total {
        let root = CaptureRoot::new(report_panel());
        let cancel = CancelAfter::new(k);
        let err = export_report(Some(&root), &options(), &resolver, &cancel)
            .err()
            .unwrap_or_else(|| panic!("export finished despite cancel after {k} checks"));
        assert!(matches!(err, Error::Cancelled), "k={k}: {err}");
        assert!(!root.with(|view| view.controls_hidden()), "k={k}");
    }

    let root = CaptureRoot::new(report_panel());
    assert!(export_report(Some(&root), &options(), &resolver, &CancelAfter::new(total)).is_ok());
}
