// # Capture Module
//
// Turns a raw camera frame into the normalized still the rest of the pipeline
// works on. Geometry resolution lives in `booth_scale::geometry`; this module
// applies it to pixels.

pub mod frame;

pub use frame::{CAPTURE_JPEG_QUALITY, CapturedStill, RawFrame, render_capture};
