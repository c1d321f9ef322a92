use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, TryLockError};
use std::time::Instant;

use image::RgbaImage;

use crate::error::Error;
use crate::model::{AnchorRegion, CaptureResult, CssRect};

/// Upper bound on the capture pixel density. High-DPI displays would
/// otherwise produce bitmaps several times larger than needed for print.
pub const MAX_CAPTURE_SCALE: f64 = 2.0;

/// A thumbnail found inside a capture target, in viewport CSS pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Thumbnail {
    pub source_ref: String,
    pub rect: CssRect,
}

/// A renderable view subtree that can be rasterized.
pub trait CaptureTarget {
    /// Bounding rectangle of the root in viewport CSS pixels.
    fn bounds(&self) -> CssRect;

    /// Thumbnails in document order, in viewport CSS pixels.
    fn thumbnails(&self) -> Vec<Thumbnail>;

    /// Show or hide controls that have no place in an export (buttons,
    /// delete affordances, ...).
    fn set_controls_hidden(&mut self, hidden: bool);

    fn rasterize(&mut self, scale: f64) -> Result<RgbaImage, String>;
}

/// Owner of a capture target. Capturing mutates the view (controls are
/// hidden), so only one capture of a root may run at a time.
pub struct CaptureRoot<T> {
    view: Mutex<T>,
}

impl<T: CaptureTarget> CaptureRoot<T> {
    pub fn new(view: T) -> Self {
        CaptureRoot {
            view: Mutex::new(view),
        }
    }

    /// Run `f` against the view. Blocks while a capture is running.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.view.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    pub fn into_inner(self) -> T {
        self.view.into_inner().unwrap_or_else(|p| p.into_inner())
    }
}

/// Controls of a view kept hidden for as long as the guard lives.
pub struct HiddenControls<'a, T: CaptureTarget + ?Sized> {
    view: &'a mut T,
}

impl<'a, T: CaptureTarget + ?Sized> HiddenControls<'a, T> {
    pub fn hide(view: &'a mut T) -> Self {
        view.set_controls_hidden(true);
        HiddenControls { view }
    }
}

impl<T: CaptureTarget + ?Sized> Deref for HiddenControls<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.view
    }
}

impl<T: CaptureTarget + ?Sized> DerefMut for HiddenControls<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.view
    }
}

impl<T: CaptureTarget + ?Sized> Drop for HiddenControls<'_, T> {
    fn drop(&mut self) {
        self.view.set_controls_hidden(false);
    }
}

/// Clamp a requested density to `(0, MAX_CAPTURE_SCALE]`; unusable values
/// fall back to 1.
pub fn effective_scale(desired: f64) -> f64 {
    if !desired.is_finite() || desired <= 0.0 {
        return 1.0;
    }
    desired.min(MAX_CAPTURE_SCALE)
}

/// Rasterize `root` and record its thumbnail anchors, relative to the root
/// and before scaling.
pub fn capture<T: CaptureTarget>(
    root: Option<&CaptureRoot<T>>,
    desired_scale: f64,
) -> Result<(CaptureResult, Vec<AnchorRegion>), Error> {
    let t0 = Instant::now();
    let root = root.ok_or_else(|| Error::Capture("no view to capture".into()))?;

    let mut view = match root.view.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::WouldBlock) => return Err(Error::CaptureInProgress),
        Err(TryLockError::Poisoned(poisoned)) => {
            log::warn!("previous capture of this view panicked; reusing the view");
            poisoned.into_inner()
        }
    };

    let scale = effective_scale(desired_scale);
    if scale != desired_scale {
        log::debug!("capture scale {desired_scale} clamped to {scale}");
    }

    let (bitmap, anchors) = {
        let mut hidden = HiddenControls::hide(&mut *view);
        let origin = hidden.bounds();
        let anchors: Vec<AnchorRegion> = hidden
            .thumbnails()
            .into_iter()
            .enumerate()
            .map(|(index, thumb)| AnchorRegion {
                index,
                source_ref: thumb.source_ref,
                rect: CssRect::new(
                    thumb.rect.x - origin.x,
                    thumb.rect.y - origin.y,
                    thumb.rect.w,
                    thumb.rect.h,
                ),
            })
            .collect();
        let bitmap = hidden.rasterize(scale).map_err(Error::Capture)?;
        (bitmap, anchors)
    };

    let (width_px, height_px) = bitmap.dimensions();
    if width_px == 0 || height_px == 0 {
        return Err(Error::Capture(format!(
            "captured bitmap is empty ({width_px}x{height_px})"
        )));
    }

    log::info!(
        "Captured {width_px}x{height_px}px at scale {scale} with {} anchors in {:.1}ms",
        anchors.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );

    Ok((
        CaptureResult {
            bitmap,
            width_px,
            height_px,
            capture_scale: scale,
        },
        anchors,
    ))
}
