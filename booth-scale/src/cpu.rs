// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out, tightly packed rows on both sides.

use fast_image_resize as fir;
use fir::images::{Image, ImageRef};
use fir::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};

use crate::presets::{AspectMode, ScalePlan, Size};

#[derive(Debug)]
pub enum ScaleError {
    BufferSize { expected: usize, actual: usize },
    EmptyCrop,
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferSize { expected, actual } => {
                write!(f, "RGBA buffer has {} bytes, expected {}", actual, expected)
            }
            ScaleError::EmptyCrop => write!(f, "Crop rectangle does not intersect the frame"),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

#[inline]
fn rgba_len(size: Size) -> usize {
    (size.w as usize) * (size.h as usize) * 4
}

fn check_len(buf: &[u8], size: Size) -> Result<(), ScaleError> {
    let expected = rgba_len(size);
    if buf.len() != expected {
        return Err(ScaleError::BufferSize { expected, actual: buf.len() });
    }
    Ok(())
}

fn options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3))
}

/// Main scaling entry point.
///
/// `src_rgba` must be exactly `plan.input.w * plan.input.h * 4` bytes. The result is
/// `plan.out.w * plan.out.h * 4` bytes; for padded plans the area outside the ROI is
/// filled with the plan's background color.
pub fn scale_rgba_cpu(resizer: &mut Resizer, src_rgba: &[u8], plan: &ScalePlan) -> Result<Vec<u8>, ScaleError> {
    check_len(src_rgba, plan.input)?;
    if plan.is_identity() {
        return Ok(src_rgba.to_vec());
    }

    let content = plan.content_size();
    let scaled = if content == plan.input {
        src_rgba.to_vec()
    } else {
        let src_view = ImageRef::new(plan.input.w, plan.input.h, src_rgba, PixelType::U8x4)?;
        let mut dst = Image::new(content.w, content.h, PixelType::U8x4);
        resizer.resize(&src_view, &mut dst, &options())?;
        dst.into_vec()
    };

    match (plan.aspect, plan.dst_roi) {
        (AspectMode::Pad { bg_rgba }, Some((x, y, w, h))) => {
            let mut canvas = vec![0u8; rgba_len(plan.out)];
            fill_rgba(&mut canvas, bg_rgba);
            blit_rows(&scaled, w, h, &mut canvas, plan.out.w, x, y);
            Ok(canvas)
        }
        _ => Ok(scaled),
    }
}

/// Crop a fractional source rectangle out of `src_rgba` and resample it to `out`.
///
/// The rectangle is clamped to the frame; an empty intersection is an error.
pub fn crop_scale_rgba_cpu(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src: Size,
    crop: (f64, f64, f64, f64),
    out: Size,
) -> Result<Vec<u8>, ScaleError> {
    check_len(src_rgba, src)?;
    let (x, y, w, h) = crop;
    let left = x.clamp(0.0, src.w as f64);
    let top = y.clamp(0.0, src.h as f64);
    let width = w.min(src.w as f64 - left);
    let height = h.min(src.h as f64 - top);
    if !(width > 0.0 && height > 0.0) {
        return Err(ScaleError::EmptyCrop);
    }

    let src_view = ImageRef::new(src.w, src.h, src_rgba, PixelType::U8x4)?;
    let mut dst = Image::new(out.w.max(1), out.h.max(1), PixelType::U8x4);
    let opts = options().crop(left, top, width, height);
    resizer.resize(&src_view, &mut dst, &opts)?;
    Ok(dst.into_vec())
}

#[inline]
fn fill_rgba(dst: &mut [u8], bg: [u8; 4]) {
    for px in dst.chunks_exact_mut(4) {
        px.copy_from_slice(&bg);
    }
}

#[inline]
fn blit_rows(src: &[u8], w: u32, h: u32, dst: &mut [u8], dst_w: u32, x: u32, y: u32) {
    let row_bytes = w as usize * 4;
    let dst_pitch = dst_w as usize * 4;
    for r in 0..h as usize {
        let s = &src[r * row_bytes..(r + 1) * row_bytes];
        let start = (y as usize + r) * dst_pitch + x as usize * 4;
        dst[start..start + row_bytes].copy_from_slice(s);
    }
}
