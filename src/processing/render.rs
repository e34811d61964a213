//! Stateless pixel helpers shared by the reconciler, the compositor and the GIF
//! assembler. All of them go through `booth_scale`'s planning and CPU resizer.

use booth_scale::cpu::{crop_scale_rgba_cpu, scale_rgba_cpu};
use booth_scale::presets::{AspectMode, ScaleTarget, Size, build_plan};
use fast_image_resize::Resizer;
use image::RgbaImage;

use crate::error::{BoothResult, PhotoboothError};

/// Letterbox fill for any area an image does not cover (`#0b1120`).
pub const BACKGROUND_RGBA: [u8; 4] = [0x0b, 0x11, 0x20, 0xff];

fn into_image(size: Size, pixels: Vec<u8>) -> BoothResult<RgbaImage> {
    RgbaImage::from_raw(size.w, size.h, pixels)
        .ok_or_else(|| PhotoboothError::processing("render", "scaled buffer has wrong length"))
}

/// Draw `src` onto a canvas of exactly `target`, fitted inside with its aspect
/// kept (scaling up or down) and centered over `background`.
pub fn render_into(src: &RgbaImage, target: Size, background: [u8; 4]) -> BoothResult<RgbaImage> {
    let plan = build_plan(
        Size::new(src.width(), src.height()),
        ScaleTarget::Exact(target),
        AspectMode::Pad { bg_rgba: background },
    );
    let pixels = scale_rgba_cpu(&mut Resizer::new(), src.as_raw(), &plan)?;
    into_image(plan.out, pixels)
}

/// Resample `src` to exactly `width`×`height`, ignoring its aspect.
pub fn resize_exact(src: &RgbaImage, width: u32, height: u32) -> BoothResult<RgbaImage> {
    let out = Size::new(width.max(1), height.max(1));
    if src.dimensions() == (out.w, out.h) {
        return Ok(src.clone());
    }
    let pixels = crop_scale_rgba_cpu(
        &mut Resizer::new(),
        src.as_raw(),
        Size::new(src.width(), src.height()),
        (0.0, 0.0, src.width() as f64, src.height() as f64),
        out,
    )?;
    into_image(out, pixels)
}
