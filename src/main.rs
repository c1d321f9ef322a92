use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use report_pdf_export::attachments::DirectorySource;
use report_pdf_export::capture::Thumbnail;
use report_pdf_export::model::CssRect;
use report_pdf_export::view::BitmapPanel;
use report_pdf_export::{
    CaptureRoot, ExportOptions, NeverCancel, PageGeometry, ResolveMode, Resolver, export_report,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PageSize {
    A4,
    Letter,
}

/// Export a rendered report panel to a paginated PDF with linked attachments.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON manifest describing the panel bitmap and its thumbnails
    manifest: PathBuf,

    /// Output file (defaults to the manifest's filename base in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Capture scale, at most 2
    #[arg(long, default_value_t = 2.0)]
    scale: f64,

    #[arg(long, value_enum, default_value_t = PageSize::A4)]
    page: PageSize,

    /// Page margin in points
    #[arg(long)]
    margin: Option<f64>,

    /// Resolve up to N attachments at once
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Second place to look for attachments, by path
    #[arg(long)]
    fallback_dir: Option<PathBuf>,

    /// Log per-attachment and per-anchor detail
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Deserialize, Debug)]
struct Manifest {
    title: String,
    /// Panel bitmap, relative to the manifest
    bitmap: PathBuf,
    /// Device pixels per CSS pixel the bitmap was rendered at
    #[serde(default = "one")]
    bitmap_scale: f64,
    #[serde(default)]
    anchors: Vec<ManifestAnchor>,
    #[serde(default)]
    attachments: Vec<String>,
    filename: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ManifestAnchor {
    #[serde(default)]
    source: String,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

fn one() -> f64 {
    1.0
}

fn load_manifest(path: &Path) -> Result<Manifest, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))
}

fn run(args: &Args) -> Result<(), String> {
    let manifest = load_manifest(&args.manifest)?;
    let base_dir = args
        .manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let bitmap_path = base_dir.join(&manifest.bitmap);
    let bitmap = image::open(&bitmap_path)
        .map_err(|e| format!("{}: {e}", bitmap_path.display()))?
        .to_rgba8();
    let thumbnails = manifest
        .anchors
        .iter()
        .map(|a| Thumbnail {
            source_ref: a.source.clone(),
            rect: CssRect::new(a.x, a.y, a.w, a.h),
        })
        .collect();
    let root = CaptureRoot::new(BitmapPanel::new(bitmap, manifest.bitmap_scale, thumbnails));

    let mut geometry = match args.page {
        PageSize::A4 => PageGeometry::a4(),
        PageSize::Letter => PageGeometry::letter(),
    };
    if let Some(margin) = args.margin {
        geometry.margin = margin;
    }

    let title = manifest.title.clone();
    let banner = move |page: usize| format!("{title} - page {page}");
    let filename_base = manifest
        .filename
        .clone()
        .unwrap_or_else(|| manifest.title.clone());
    let options = ExportOptions {
        geometry,
        capture_scale: args.scale,
        banner: &banner,
        filename_base: &filename_base,
        extra_attachments: &manifest.attachments,
        title: Some(manifest.title.as_str()),
    };

    let primary = DirectorySource::new(&base_dir);
    let fallback = args.fallback_dir.as_ref().map(|dir| DirectorySource::new(dir.clone()));
    let mut resolver = Resolver::new().with_primary(&primary);
    if let Some(fallback) = &fallback {
        resolver = resolver.with_fallback(fallback);
    }
    if let Some(jobs) = args.jobs {
        resolver = resolver.with_mode(ResolveMode::Parallel { jobs });
    }

    let outcome = export_report(Some(&root), &options, &resolver, &NeverCancel).map_err(|e| {
        log::debug!("export stopped at stage '{}'", e.stage());
        e.to_string()
    })?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&outcome.filename));
    outcome
        .save(&output)
        .map_err(|e| format!("{e} ({})", output.display()))?;

    println!(
        "Wrote {} ({} pages: {} content, {} attachments; {} links, {} placeholders)",
        output.display(),
        outcome.page_count,
        outcome.content_page_count,
        outcome.page_count - outcome.content_page_count,
        outcome.annotation_count,
        outcome.placeholder_count,
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
