//! # GIF Assembly
//!
//! Builds the two-frame "before/after" GIF: the watermarked capture shown for
//! 333 ms, then the watermarked AI result for 833 ms, looping forever.
//!
//! ## State Machine
//!
//! ```text
//! Idle ──assemble()──▶ InProgress ──┬──▶ Done   (blob URL published, session pruned)
//!                                   └──▶ Failed (None, error logged)
//! ```
//!
//! The in-progress flag is held by an RAII guard, so every exit path clears it.
//! A second `assemble` while one is running returns `None` immediately.
//!
//! Each frame is quantized independently to its own 256-color local palette by
//! the GIF encoder; colors are approximate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use booth_scale::presets::{Size, fit_preserve};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use tracing::{debug, error, info};

use super::render::{BACKGROUND_RGBA, render_into};
use super::watermark::{WatermarkCompositor, WatermarkPlacement};
use crate::core::{BlobUrl, Dimensions, EncodedImage, ImageMeta};
use crate::error::{BoothResult, PhotoboothError};
use crate::session::{GifSource, Session};

/// Longest side of a GIF frame.
pub const GIF_MAX_LONG_SIDE: u32 = 720;
/// Display time of the original capture.
pub const INPUT_FRAME_DELAY_MS: u32 = 333;
/// Display time of the AI result.
pub const OUTPUT_FRAME_DELAY_MS: u32 = 833;
/// NeuQuant sampling speed (1 = best quality, 30 = fastest).
const QUANTIZE_SPEED: i32 = 10;

/// Frame size for a photo: its output size, else its input size, else 720×720,
/// scaled down so the longer side is at most [`GIF_MAX_LONG_SIDE`].
pub fn frame_size(meta: &ImageMeta) -> Size {
    let base = meta
        .output
        .or(meta.input)
        .filter(Dimensions::is_valid)
        .map(|d| d.size())
        .unwrap_or(Size::new(GIF_MAX_LONG_SIDE, GIF_MAX_LONG_SIDE));
    let (w, h) = fit_preserve(base, GIF_MAX_LONG_SIDE);
    Size::new(w, h)
}

/// Encode frames (pixels + delay in ms) as an infinitely looping GIF.
pub fn encode_gif(frames: Vec<(RgbaImage, u32)>) -> BoothResult<EncodedImage> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buf, QUANTIZE_SPEED);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| PhotoboothError::encode("GIF", e.to_string()))?;
        for (pixels, delay_ms) in frames {
            let frame = Frame::from_parts(pixels, 0, 0, Delay::from_numer_denom_ms(delay_ms, 1));
            encoder
                .encode_frame(frame)
                .map_err(|e| PhotoboothError::encode("GIF", e.to_string()))?;
        }
    }
    Ok(EncodedImage::new(buf, "image/gif"))
}

struct InProgressGuard<'a>(&'a AtomicBool);

impl<'a> InProgressGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct GifAssembler {
    compositor: Arc<WatermarkCompositor>,
    in_progress: AtomicBool,
}

impl GifAssembler {
    pub fn new(compositor: Arc<WatermarkCompositor>) -> Self {
        Self {
            compositor,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Build a GIF for the newest ready photo and publish it to `session`.
    ///
    /// Returns `None` when another assembly is running, no photo is ready, an
    /// image is missing, encoding fails, or the session was reset meanwhile.
    pub async fn assemble(&self, session: &Session) -> Option<BlobUrl> {
        let Some(_guard) = InProgressGuard::acquire(&self.in_progress) else {
            debug!("GIF assembly already in progress");
            return None;
        };

        let Some(source) = session.gif_source() else {
            debug!("No ready photo with both images; skipping GIF");
            return None;
        };

        let (gif, size) = match self.build(&source).await {
            Ok(built) => built,
            Err(e) => {
                error!(photo_id = %source.photo_id, error = %e, "Failed to assemble GIF");
                return None;
            }
        };

        let bytes = gif.len();
        match session.commit_gif(source.photo_id, source.generation, gif, Dimensions::from(size)) {
            Some(url) => {
                info!(
                    photo_id = %source.photo_id,
                    width = size.w,
                    height = size.h,
                    bytes,
                    "GIF ready"
                );
                Some(url)
            }
            None => {
                debug!(photo_id = %source.photo_id, "Session changed during GIF assembly; result discarded");
                None
            }
        }
    }

    async fn build(&self, source: &GifSource) -> BoothResult<(EncodedImage, Size)> {
        let size = frame_size(&source.meta);
        let input = source.input.clone();
        let output = source.output.clone();

        let (first, second) = tokio::task::spawn_blocking(move || -> BoothResult<_> {
            let first = render_into(&input.decode()?, size, BACKGROUND_RGBA)?;
            let second = render_into(&output.decode()?, size, BACKGROUND_RGBA)?;
            Ok((first, second))
        })
        .await
        .map_err(|e| PhotoboothError::external("tokio", e))??;

        let placement = WatermarkPlacement::gif_frame();
        let first = self.compositor.composite_onto(first, &placement).await;
        let second = self.compositor.composite_onto(second, &placement).await;

        let gif = tokio::task::spawn_blocking(move || {
            encode_gif(vec![
                (first, INPUT_FRAME_DELAY_MS),
                (second, OUTPUT_FRAME_DELAY_MS),
            ])
        })
        .await
        .map_err(|e| PhotoboothError::external("tokio", e))??;

        Ok((gif, size))
    }
}
