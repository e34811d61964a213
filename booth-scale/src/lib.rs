// SPDX-License-Identifier: MIT
//! # booth-scale: Capture Geometry and Scaling for the Photobooth
//!
//! This crate holds the pure, allocation-light math of the photobooth pipeline:
//! turning whatever frame a camera delivers into a fixed-aspect capture, and
//! planning/executing the resizes that the rest of the pipeline needs.
//!
//! ## Key Components
//!
//! - [`geometry`]: capture geometry resolver (center-crop + optional rotation to 9:16 / 16:9)
//! - [`presets`]: scaling plan computation (long-side clamps, exact canvases, letterboxing)
//! - [`cpu`]: CPU RGBA scaling built on fast_image_resize (SIMD-accelerated)
//!
//! ## Usage Example
//!
//! ```rust
//! use booth_scale::geometry::{resolve, CaptureOptions};
//! use booth_scale::presets::{build_plan, AspectMode, ScaleTarget, Size};
//!
//! // A landscape sensor frame on a portrait kiosk with a rotated camera
//! let geometry = resolve(1280.0, 720.0, CaptureOptions { portrait: true, rotate: true });
//! assert_eq!((geometry.canvas_width, geometry.canvas_height), (720, 1280));
//!
//! // Clamp the captured still for the GIF (never upscales)
//! let plan = build_plan(
//!     Size { w: 720, h: 1280 },
//!     ScaleTarget::MaxLongSide(720),
//!     AspectMode::Preserve,
//! );
//! assert_eq!((plan.out.w, plan.out.h), (405, 720));
//! ```

pub mod cpu;
pub mod geometry;
pub mod presets;
