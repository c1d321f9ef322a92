#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use lopdf::{Document, Object, ObjectId};

use report_pdf_export::attachments::AttachmentSource;
use report_pdf_export::cancel::CancelToken;
use report_pdf_export::capture::{CaptureTarget, Thumbnail};
use report_pdf_export::model::{AnchorRegion, CssRect, PageGeometry};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Page without banner whose slice height is a round 700pt
/// and content width 500pt.
pub fn round_geometry() -> PageGeometry {
    PageGeometry::new(600.0, 800.0, 50.0, 0.0).unwrap()
}

pub fn png_bytes(w: u32, h: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(w, h, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn jpeg_bytes(w: u32, h: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(w, h, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}

pub fn anchor(index: usize, source_ref: &str, rect: CssRect) -> AnchorRegion {
    AnchorRegion {
        index,
        source_ref: source_ref.to_string(),
        rect,
    }
}

/// Source that fails every fetch, like a network that is down.
pub struct OfflineSource;

impl AttachmentSource for OfflineSource {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, String> {
        Err(format!("network unreachable: {reference}"))
    }
}

/// Source that records every reference it is asked for.
#[derive(Default)]
pub struct RecordingSource {
    pub data: HashMap<String, Vec<u8>>,
    pub requests: Mutex<Vec<String>>,
}

impl RecordingSource {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl AttachmentSource for RecordingSource {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, String> {
        self.requests.lock().unwrap().push(reference.to_string());
        self.data
            .get(reference)
            .cloned()
            .ok_or_else(|| format!("404: {reference}"))
    }
}

/// Capture target that records the control state seen while rasterizing.
pub struct SpyTarget {
    pub bounds: CssRect,
    pub thumbnails: Vec<Thumbnail>,
    pub controls_hidden: bool,
    pub hidden_during_raster: Option<bool>,
    pub outcome: SpyOutcome,
}

pub enum SpyOutcome {
    Bitmap(u32, u32),
    Fail(&'static str),
    Panic,
}

impl SpyTarget {
    pub fn new(outcome: SpyOutcome) -> Self {
        SpyTarget {
            bounds: CssRect::new(0.0, 0.0, 100.0, 100.0),
            thumbnails: Vec::new(),
            controls_hidden: false,
            hidden_during_raster: None,
            outcome,
        }
    }
}

impl CaptureTarget for SpyTarget {
    fn bounds(&self) -> CssRect {
        self.bounds
    }

    fn thumbnails(&self) -> Vec<Thumbnail> {
        self.thumbnails.clone()
    }

    fn set_controls_hidden(&mut self, hidden: bool) {
        self.controls_hidden = hidden;
    }

    fn rasterize(&mut self, _scale: f64) -> Result<RgbaImage, String> {
        self.hidden_during_raster = Some(self.controls_hidden);
        match self.outcome {
            SpyOutcome::Bitmap(w, h) => Ok(RgbaImage::new(w, h)),
            SpyOutcome::Fail(msg) => Err(msg.to_string()),
            SpyOutcome::Panic => panic!("renderer crashed"),
        }
    }
}

/// A link read back from a written PDF: source page, target page and
/// rectangle, pages 1-based.
#[derive(Clone, Debug, PartialEq)]
pub struct PdfLink {
    pub source_page: u32,
    pub target_page: u32,
    pub rect: [f64; 4],
}

fn number(obj: &Object) -> f64 {
    match obj {
        Object::Integer(i) => *i as f64,
        Object::Real(r) => *r as f64,
        other => panic!("not a number: {other:?}"),
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap(),
        other => other,
    }
}

pub fn load_pdf(bytes: &[u8]) -> Document {
    Document::load_mem(bytes).expect("output is a readable PDF")
}

pub fn page_count(bytes: &[u8]) -> usize {
    load_pdf(bytes).get_pages().len()
}

pub fn pdf_links(bytes: &[u8]) -> Vec<PdfLink> {
    let doc = load_pdf(bytes);
    let pages: BTreeMap<u32, ObjectId> = doc.get_pages();
    let page_numbers: HashMap<ObjectId, u32> = pages.iter().map(|(n, id)| (*id, *n)).collect();

    let mut links = Vec::new();
    for (number_1, page_id) in &pages {
        let page = doc.get_object(*page_id).unwrap().as_dict().unwrap();
        let Ok(annots) = page.get(b"Annots") else {
            continue;
        };
        for annot in resolve(&doc, annots).as_array().unwrap() {
            let annot = resolve(&doc, annot).as_dict().unwrap();
            let rect: Vec<f64> = annot
                .get(b"Rect")
                .unwrap()
                .as_array()
                .unwrap()
                .iter()
                .map(number)
                .collect();
            let action = resolve(&doc, annot.get(b"A").unwrap()).as_dict().unwrap();
            let dest = resolve(&doc, action.get(b"D").unwrap()).as_array().unwrap();
            let target_id = dest[0].as_reference().unwrap();
            links.push(PdfLink {
                source_page: *number_1,
                target_page: page_numbers[&target_id],
                rect: [rect[0], rect[1], rect[2], rect[3]],
            });
        }
    }
    links
}

/// Number of image XObjects a page's resources reference.
pub fn page_image_count(bytes: &[u8], page_number: u32) -> usize {
    let doc = load_pdf(bytes);
    let page_id = doc.get_pages()[&page_number];
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let resources = resolve(&doc, page.get(b"Resources").unwrap()).as_dict().unwrap();
    match resources.get(b"XObject") {
        Ok(xobjects) => resolve(&doc, xobjects).as_dict().unwrap().len(),
        Err(_) => 0,
    }
}

/// Cancels once `allowed` checks have passed.
pub struct CancelAfter {
    allowed: usize,
    checks: AtomicUsize,
}

impl CancelAfter {
    pub fn new(allowed: usize) -> Self {
        CancelAfter {
            allowed,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl CancelToken for CancelAfter {
    fn is_cancelled(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst) >= self.allowed
    }
}
