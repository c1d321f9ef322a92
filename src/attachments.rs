use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use base64::Engine;
use image::{ColorType, RgbaImage};
use rayon::prelude::*;

use crate::cancel::{CancelToken, NeverCancel};
use crate::error::Error;
use crate::model::Attachment;

/// Longest source reference shown on a placeholder page.
pub const MAX_SHOWN_REF_CHARS: usize = 80;

/// Where attachment bytes come from. Fetching is the caller's business; the
/// resolver only asks for bytes by reference.
pub trait AttachmentSource: Sync {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, String>;
}

/// Reads references as relative paths under `root`.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySource { root: root.into() }
    }
}

impl AttachmentSource for DirectorySource {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, String> {
        if reference.contains("://") {
            return Err(format!("not a local path: {reference}"));
        }
        let rel = Path::new(reference);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(format!("path escapes attachment directory: {reference}"));
        }
        let path = self.root.join(rel);
        std::fs::read(&path).map_err(|e| format!("{}: {e}", path.display()))
    }
}

/// Fixed map of reference to bytes.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, data: Vec<u8>) {
        self.entries.insert(reference.into(), data);
    }

    pub fn with(mut self, reference: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(reference, data);
        self
    }
}

impl AttachmentSource for MemorySource {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, String> {
        self.entries
            .get(reference)
            .cloned()
            .ok_or_else(|| format!("not found: {reference}"))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImagePayload {
    /// Baseline RGB JPEG, embedded as-is.
    Jpeg(Vec<u8>),
    Raster(RgbaImage),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderableImage {
    pub payload: ImagePayload,
    pub width_px: u32,
    pub height_px: u32,
}

/// Stand-in for an attachment that could not be loaded. It still gets its
/// own page so later page numbers do not shift.
#[derive(Clone, Debug, PartialEq)]
pub struct Placeholder {
    pub attachment_index: usize,
    pub reason: String,
    pub truncated_source_ref: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedAttachment {
    Image(RenderableImage),
    Placeholder(Placeholder),
}

impl ResolvedAttachment {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, ResolvedAttachment::Placeholder(_))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResolveMode {
    /// One attachment at a time; keeps at most one decoded image in flight.
    #[default]
    Sequential,
    /// At most `jobs` attachments in flight.
    Parallel { jobs: usize },
}

#[derive(Clone, Copy, Default)]
pub struct Resolver<'a> {
    primary: Option<&'a dyn AttachmentSource>,
    fallback: Option<&'a dyn AttachmentSource>,
    mode: ResolveMode,
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary(mut self, source: &'a dyn AttachmentSource) -> Self {
        self.primary = Some(source);
        self
    }

    pub fn with_fallback(mut self, source: &'a dyn AttachmentSource) -> Self {
        self.fallback = Some(source);
        self
    }

    pub fn with_mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Resolve one attachment. Never fails: anything that cannot be loaded
    /// comes back as a placeholder.
    pub fn resolve(&self, attachment: &Attachment) -> ResolvedAttachment {
        match self.resolve_checked(attachment, &NeverCancel) {
            Ok(resolved) => resolved,
            Err(e) => placeholder(attachment, e.to_string()),
        }
    }

    /// Like `resolve`, but stops with `Error::Cancelled` before any fetch or
    /// decode once `cancel` fires.
    pub fn resolve_checked(
        &self,
        attachment: &Attachment,
        cancel: &dyn CancelToken,
    ) -> Result<ResolvedAttachment, Error> {
        let reference = attachment.source_ref.as_str();
        let mut failures: Vec<String> = Vec::new();

        if reference.starts_with("data:") {
            cancel.check()?;
            let result = parse_data_uri(reference)
                .ok_or_else(|| "malformed data URI".to_string())
                .and_then(|(_, data)| decode_image(&data));
            return Ok(match result {
                Ok(img) => ResolvedAttachment::Image(img),
                Err(e) => {
                    log::warn!("Attachment {}: inline image unusable: {e}", attachment.index);
                    placeholder(attachment, format!("inline image: {e}"))
                }
            });
        }

        let sources = [("fetch", self.primary), ("fallback", self.fallback)];
        for (label, source) in sources {
            let Some(source) = source else { continue };
            cancel.check()?;
            let bytes = match source.fetch(reference) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::debug!("Attachment {}: {label} failed: {e}", attachment.index);
                    failures.push(format!("{label}: {e}"));
                    continue;
                }
            };
            cancel.check()?;
            match decode_image(&bytes) {
                Ok(img) => {
                    log::debug!(
                        "Attachment {}: {}x{}px via {label}",
                        attachment.index,
                        img.width_px,
                        img.height_px
                    );
                    return Ok(ResolvedAttachment::Image(img));
                }
                Err(e) => {
                    log::debug!("Attachment {}: {label} decode failed: {e}", attachment.index);
                    failures.push(format!("{label}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            failures.push("no attachment source configured".into());
        }
        let reason = failures.join("; ");
        log::warn!(
            "Attachment {} ({}) replaced by placeholder: {reason}",
            attachment.index,
            truncate_ref(reference)
        );
        Ok(placeholder(attachment, reason))
    }

    /// Resolve every attachment into the slot matching its position, so
    /// attachment `i` stays at position `i` whatever order loads finish in.
    pub fn resolve_all(
        &self,
        attachments: &[Attachment],
        cancel: &dyn CancelToken,
    ) -> Result<Vec<ResolvedAttachment>, Error> {
        let t0 = Instant::now();
        let mut slots: Vec<Option<ResolvedAttachment>> =
            (0..attachments.len()).map(|_| None).collect();

        match self.mode {
            ResolveMode::Sequential => self.fill_sequential(&mut slots, attachments, cancel)?,
            ResolveMode::Parallel { jobs } => {
                match rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs.max(1))
                    .build()
                {
                    Ok(pool) => pool.install(|| {
                        slots
                            .par_iter_mut()
                            .zip(attachments.par_iter())
                            .try_for_each(|(slot, attachment)| {
                                *slot = Some(self.resolve_checked(attachment, cancel)?);
                                Ok::<(), Error>(())
                            })
                    })?,
                    Err(e) => {
                        log::warn!("Falling back to sequential resolution: {e}");
                        self.fill_sequential(&mut slots, attachments, cancel)?;
                    }
                }
            }
        }

        let resolved: Vec<ResolvedAttachment> = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::Assembly("attachment left unresolved".into()))?;

        log::info!(
            "Resolved {} attachments ({} placeholders) in {:.1}ms",
            resolved.len(),
            resolved.iter().filter(|r| r.is_placeholder()).count(),
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        Ok(resolved)
    }

    fn fill_sequential(
        &self,
        slots: &mut [Option<ResolvedAttachment>],
        attachments: &[Attachment],
        cancel: &dyn CancelToken,
    ) -> Result<(), Error> {
        for (slot, attachment) in slots.iter_mut().zip(attachments) {
            *slot = Some(self.resolve_checked(attachment, cancel)?);
        }
        Ok(())
    }
}

fn placeholder(attachment: &Attachment, reason: String) -> ResolvedAttachment {
    ResolvedAttachment::Placeholder(Placeholder {
        attachment_index: attachment.index,
        reason,
        truncated_source_ref: truncate_ref(&attachment.source_ref),
    })
}

pub fn truncate_ref(reference: &str) -> String {
    if reference.chars().count() <= MAX_SHOWN_REF_CHARS {
        return reference.to_string();
    }
    let head: String = reference.chars().take(MAX_SHOWN_REF_CHARS - 3).collect();
    format!("{head}...")
}

/// Split a `data:` URI into its media type and decoded payload.
pub fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("text/plain")
        .to_string();
    let data = if header.split(';').any(|p| p == "base64") {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .ok()?
    } else {
        percent_encoding::percent_decode_str(payload).collect()
    };
    Some((mime, data))
}

/// Decode attachment bytes. RGB JPEGs keep their original bytes; anything
/// else is converted to RGBA.
pub fn decode_image(data: &[u8]) -> Result<RenderableImage, String> {
    let format = image::guess_format(data).map_err(|e| e.to_string())?;
    let decoded = image::load_from_memory_with_format(data, format).map_err(|e| e.to_string())?;
    let (width_px, height_px) = (decoded.width(), decoded.height());
    if width_px == 0 || height_px == 0 {
        return Err("image has no pixels".into());
    }
    let payload = if format == image::ImageFormat::Jpeg && decoded.color() == ColorType::Rgb8 {
        ImagePayload::Jpeg(data.to_vec())
    } else {
        ImagePayload::Raster(decoded.to_rgba8())
    };
    Ok(RenderableImage {
        payload,
        width_px,
        height_px,
    })
}
