// # Still Capture
//
// Applies a resolved `CaptureGeometry` to a raw RGBA frame:
//
// ```text
// ┌─────────────┐    ┌──────────────┐    ┌──────────────┐    ┌────────────┐
// │  Camera     │───▶│  Crop +      │───▶│  Rotate 90°  │───▶│  Mirror +  │
// │  frame      │    │  resample    │    │  (optional)  │    │  JPEG q95  │
// └─────────────┘    └──────────────┘    └──────────────┘    └────────────┘
// ```
//
// The crop is resampled straight to the canvas size (or its transpose when the
// still is rotated), so the frame is only walked once by the resizer.

use booth_scale::cpu::crop_scale_rgba_cpu;
use booth_scale::geometry::{CaptureGeometry, CaptureOptions, resolve};
use booth_scale::presets::Size;
use fast_image_resize::Resizer;
use image::{RgbaImage, imageops};
use tracing::debug;

use crate::core::{Dimensions, EncodedImage};
use crate::error::{BoothResult, PhotoboothError};

/// JPEG quality used for captured stills.
pub const CAPTURE_JPEG_QUALITY: u8 = 95;

/// Tightly packed RGBA8 camera frame.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> BoothResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(PhotoboothError::processing(
                "capture",
                format!(
                    "frame {}x{} carries {} bytes, expected {}",
                    width,
                    height,
                    rgba.len(),
                    expected
                ),
            ));
        }
        Ok(Self { width, height, rgba })
    }

    /// Wrap decoded pixels. Empty images are rejected like in [`RawFrame::new`].
    pub fn from_image(image: RgbaImage) -> BoothResult<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    pub fn from_encoded(image: &EncodedImage) -> BoothResult<Self> {
        Self::from_image(image.decode()?)
    }

    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// A normalized still ready to be stored as a photo's input.
#[derive(Debug, Clone)]
pub struct CapturedStill {
    pub image: EncodedImage,
    pub meta: Dimensions,
    pub geometry: CaptureGeometry,
}

/// Crop, rotate and mirror `frame` into the fixed capture aspect, then encode it.
///
/// `mirror` flips the still horizontally, matching what a user sees in a
/// front-facing preview.
pub fn render_capture(
    frame: &RawFrame,
    options: CaptureOptions,
    mirror: bool,
) -> BoothResult<CapturedStill> {
    let geometry = resolve(frame.width as f64, frame.height as f64, options);
    let canvas = Size::new(geometry.canvas_width, geometry.canvas_height);
    let sampled = if options.rotate {
        Size::new(canvas.h, canvas.w)
    } else {
        canvas
    };

    let mut resizer = Resizer::new();
    let pixels = crop_scale_rgba_cpu(
        &mut resizer,
        &frame.rgba,
        frame.size(),
        (
            geometry.source_x,
            geometry.source_y,
            geometry.source_width,
            geometry.source_height,
        ),
        sampled,
    )?;
    let sampled_image = RgbaImage::from_raw(sampled.w, sampled.h, pixels)
        .ok_or_else(|| PhotoboothError::processing("capture", "resampled buffer has wrong length"))?;

    let mut still = if options.rotate {
        imageops::rotate90(&sampled_image)
    } else {
        sampled_image
    };
    if mirror {
        imageops::flip_horizontal_in_place(&mut still);
    }

    debug!(
        frame_width = frame.width,
        frame_height = frame.height,
        canvas_width = geometry.canvas_width,
        canvas_height = geometry.canvas_height,
        rotate = options.rotate,
        "Rendered capture"
    );

    Ok(CapturedStill {
        image: EncodedImage::encode_jpeg(&still, CAPTURE_JPEG_QUALITY)?,
        meta: Dimensions::new(still.width(), still.height()),
        geometry,
    })
}
