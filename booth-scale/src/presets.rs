// SPDX-License-Identifier: MIT
//! # Scaling Plans
//!
//! Computes output dimensions and placement for every resize in the photobooth:
//!
//! - **GIF frames**: clamp the longest side (720px), keep the aspect, never upscale
//! - **Reconciliation / frame rendering**: draw an image into an exact canvas with
//!   aspect-preserving fit-inside scaling and a letterbox fill
//!
//! ## Design
//!
//! 1. **ScaleTarget**: what size constraint applies (max long side vs exact canvas)
//! 2. **AspectMode**: how aspect differences are handled (preserve or pad)
//! 3. **ScalePlan**: the computed output size and the content ROI inside it
//!
//! All computations use `f64` and round to integers, clamped to a minimum of 1px.

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Longest side in pixels.
    pub fn long_side(self) -> u32 {
        self.w.max(self.h)
    }

    /// Shortest side in pixels.
    pub fn short_side(self) -> u32 {
        self.w.min(self.h)
    }
}

/// Defines how aspect ratio differences are handled during scaling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AspectMode {
    /// Keep the original aspect ratio; the output is the scaled content itself.
    Preserve,
    /// Keep the aspect ratio and center the content inside the exact target canvas,
    /// filling the uncovered area with `bg_rgba`.
    Pad { bg_rgba: [u8; 4] },
}

/// Defines the target size constraint for scaling operations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScaleTarget {
    /// Clamp the longest side to a maximum value. Never upscales.
    MaxLongSide(u32),
    /// Produce exactly this canvas. Content is fitted inside it and may be upscaled.
    Exact(Size),
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Target size constraint used for planning
    pub target: ScaleTarget,
    /// Aspect ratio handling strategy
    pub aspect: AspectMode,
    /// Final computed output dimensions
    pub out: Size,
    /// Sub-rectangle `(x, y, w, h)` in output space where the scaled content lands,
    /// when it does not cover the whole output.
    pub dst_roi: Option<(u32, u32, u32, u32)>,
}

impl ScalePlan {
    /// True when executing the plan would leave the pixels untouched.
    pub fn is_identity(&self) -> bool {
        self.out == self.input && self.dst_roi.is_none()
    }

    /// Size of the scaled content (the ROI when padding, the whole output otherwise).
    pub fn content_size(&self) -> Size {
        match self.dst_roi {
            Some((_, _, w, h)) => Size { w, h },
            None => self.out,
        }
    }
}

/// Compute a complete scaling plan from input parameters.
///
/// # Arguments
/// * `input` - Source image dimensions (zero dimensions are treated as 1px)
/// * `target` - Size constraint to apply
/// * `aspect` - How to handle aspect ratio differences
///
/// # Performance
/// O(1) computation with minimal floating-point operations
pub fn build_plan(input: Size, target: ScaleTarget, aspect: AspectMode) -> ScalePlan {
    let input = Size {
        w: input.w.max(1),
        h: input.h.max(1),
    };
    match (target, aspect) {
        (ScaleTarget::MaxLongSide(max_side), AspectMode::Preserve) => {
            let (w, h) = fit_preserve(input, max_side);
            ScalePlan {
                input,
                target,
                aspect,
                out: Size { w, h },
                dst_roi: None,
            }
        }
        (ScaleTarget::MaxLongSide(max_side), AspectMode::Pad { .. }) => {
            let side = max_side.max(1);
            let out = Size { w: side, h: side }; // square canvas
            let (rw, rh) = fit_preserve(input, side);
            ScalePlan {
                input,
                target,
                aspect,
                out,
                dst_roi: roi_if_partial(out, rw, rh),
            }
        }
        (ScaleTarget::Exact(out), AspectMode::Preserve) => {
            let out = Size {
                w: out.w.max(1),
                h: out.h.max(1),
            };
            let (rw, rh) = fit_inside(input, out);
            ScalePlan {
                input,
                target,
                aspect,
                out: Size { w: rw, h: rh },
                dst_roi: None,
            }
        }
        (ScaleTarget::Exact(out), AspectMode::Pad { .. }) => {
            let out = Size {
                w: out.w.max(1),
                h: out.h.max(1),
            };
            let (rw, rh) = fit_inside(input, out);
            ScalePlan {
                input,
                target,
                aspect,
                out,
                dst_roi: roi_if_partial(out, rw, rh),
            }
        }
    }
}

fn roi_if_partial(out: Size, rw: u32, rh: u32) -> Option<(u32, u32, u32, u32)> {
    let (rw, rh) = (rw.min(out.w), rh.min(out.h));
    if rw == out.w && rh == out.h {
        return None;
    }
    let x = (out.w - rw) / 2;
    let y = (out.h - rh) / 2;
    Some((x, y, rw, rh))
}

/// Fit image within max_long constraint while preserving aspect ratio.
/// Never upscales - returns original dimensions if already smaller than max_long.
pub fn fit_preserve(input: Size, max_long: u32) -> (u32, u32) {
    let (w, h) = (input.w.max(1) as f64, input.h.max(1) as f64);
    let long = w.max(h);
    let s = (max_long.max(1) as f64 / long).min(1.0); // don't upscale
    (
        ((w * s).round() as u32).max(1),
        ((h * s).round() as u32).max(1),
    )
}

/// Fit image inside a bounding box while preserving aspect ratio.
/// Scales up as well as down, so the content touches the box on at least one axis.
pub fn fit_inside(input: Size, box_: Size) -> (u32, u32) {
    let (w, h) = (input.w.max(1) as f64, input.h.max(1) as f64);
    let (bw, bh) = (box_.w.max(1) as f64, box_.h.max(1) as f64);
    let s = (bw / w).min(bh / h);
    (
        ((w * s).round() as u32).clamp(1, box_.w.max(1)),
        ((h * s).round() as u32).clamp(1, box_.h.max(1)),
    )
}
