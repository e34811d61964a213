// SPDX-License-Identifier: MIT
//! # Capture Geometry Resolution
//!
//! Normalizes whatever frame size a camera reports into the fixed capture aspect
//! of the kiosk: 9:16 for portrait sessions, 16:9 for landscape ones.
//!
//! ## Algorithm
//!
//! 1. Replace missing or degenerate frame dimensions with sane defaults
//!    (1080×1920 portrait, 1920×1080 landscape)
//! 2. If the sensor delivers a landscape frame for a portrait session (`rotate`),
//!    swap width/height before comparing aspects
//! 3. Center-crop the longer effective dimension until the aspect matches the
//!    target within [`ASPECT_TOLERANCE`]; never upscale
//! 4. Map the crop back into the original (pre-rotation) frame coordinates
//!
//! The output canvas is rounded to whole pixels (minimum 1) and the source
//! rectangle is always centered inside the original frame.

/// Capture aspect for portrait sessions (width / height).
pub const PORTRAIT_ASPECT: f64 = 9.0 / 16.0;
/// Capture aspect for landscape sessions (width / height).
pub const LANDSCAPE_ASPECT: f64 = 16.0 / 9.0;
/// Aspect difference under which no crop is applied.
pub const ASPECT_TOLERANCE: f64 = 0.001;

const PORTRAIT_FALLBACK: (f64, f64) = (1080.0, 1920.0);
const LANDSCAPE_FALLBACK: (f64, f64) = (1920.0, 1080.0);

/// Orientation request for a single capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Whether the session wants a portrait (9:16) still.
    pub portrait: bool,
    /// Whether the camera frame must be rotated by 90° to reach the desired orientation.
    pub rotate: bool,
}

impl CaptureOptions {
    /// The fixed aspect ratio this capture normalizes to.
    pub fn target_aspect(self) -> f64 {
        if self.portrait {
            PORTRAIT_ASPECT
        } else {
            LANDSCAPE_ASPECT
        }
    }
}

/// Crop/rotate plan for one capture.
///
/// `source_*` are expressed in the original frame's coordinate space (before any
/// rotation) and may be fractional; `canvas_*` is the size of the normalized still.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureGeometry {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub source_x: f64,
    pub source_y: f64,
    pub source_width: f64,
    pub source_height: f64,
    /// Target aspect of the canvas (width / height).
    pub aspect: f64,
}

impl CaptureGeometry {
    /// Aspect ratio actually produced by the rounded canvas.
    pub fn canvas_aspect(&self) -> f64 {
        self.canvas_width as f64 / self.canvas_height as f64
    }
}

#[inline]
fn ensure_positive(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

/// Resolve the crop rectangle and canvas size for a raw camera frame.
///
/// Accepts the dimensions exactly as the device reported them; zero, negative and
/// NaN values are replaced per-dimension with the orientation's defaults.
///
/// # Examples
///
/// ```rust
/// use booth_scale::geometry::{resolve, CaptureOptions};
///
/// let g = resolve(1920.0, 1080.0, CaptureOptions { portrait: false, rotate: false });
/// assert_eq!((g.canvas_width, g.canvas_height), (1920, 1080));
/// assert_eq!((g.source_x, g.source_y), (0.0, 0.0));
/// ```
pub fn resolve(frame_width: f64, frame_height: f64, options: CaptureOptions) -> CaptureGeometry {
    let target_aspect = options.target_aspect();
    let (fallback_w, fallback_h) = if options.portrait {
        PORTRAIT_FALLBACK
    } else {
        LANDSCAPE_FALLBACK
    };
    let safe_width = ensure_positive(frame_width, fallback_w);
    let safe_height = ensure_positive(frame_height, fallback_h);

    let (effective_width, effective_height) = if options.rotate {
        (safe_height, safe_width)
    } else {
        (safe_width, safe_height)
    };
    let effective_aspect = ensure_positive(effective_width / effective_height, target_aspect);

    let mut crop_width = effective_width;
    let mut crop_height = effective_height;
    if (effective_aspect - target_aspect).abs() > ASPECT_TOLERANCE {
        if effective_aspect > target_aspect {
            crop_width = crop_height * target_aspect;
        } else {
            crop_height = crop_width / target_aspect;
        }
    }

    // Back to sensor coordinates: a rotated crop is tall where the sensor is wide.
    let (source_width, source_height) = if options.rotate {
        (crop_height, crop_width)
    } else {
        (crop_width, crop_height)
    };

    CaptureGeometry {
        canvas_width: round_dimension(crop_width),
        canvas_height: round_dimension(crop_height),
        source_x: ((safe_width - source_width) / 2.0).max(0.0),
        source_y: ((safe_height - source_height) / 2.0).max(0.0),
        source_width,
        source_height,
        aspect: target_aspect,
    }
}

#[inline]
fn round_dimension(value: f64) -> u32 {
    (value.round() as u32).max(1)
}
