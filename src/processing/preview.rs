//! Watermarked previews shown on the kiosk screen.

use tracing::warn;

use super::watermark::{WatermarkCompositor, WatermarkPlacement};
use crate::core::EncodedImage;
use crate::error::{BoothResult, PhotoboothError};

/// JPEG quality for re-encoded previews of lossy sources.
pub const PREVIEW_JPEG_QUALITY: u8 = 92;

/// Draw the preview watermark onto `image` at its natural size.
///
/// JPEG and WebP sources come back as JPEG, everything else as PNG. If the
/// image cannot be decoded or re-encoded the original is returned.
pub async fn watermarked_preview(compositor: &WatermarkCompositor, image: &EncodedImage) -> EncodedImage {
    match render_preview(compositor, image).await {
        Ok(preview) => preview,
        Err(e) => {
            warn!(error = %e, "Failed to render watermarked preview; showing original");
            image.clone()
        }
    }
}

async fn render_preview(compositor: &WatermarkCompositor, image: &EncodedImage) -> BoothResult<EncodedImage> {
    let source = image.clone();
    let pixels = tokio::task::spawn_blocking(move || source.decode())
        .await
        .map_err(|e| PhotoboothError::external("tokio", e))??;

    let marked = compositor
        .composite_onto(pixels, &WatermarkPlacement::preview())
        .await;

    let lossy = image.is_lossy();
    tokio::task::spawn_blocking(move || {
        if lossy {
            EncodedImage::encode_jpeg(&marked, PREVIEW_JPEG_QUALITY)
        } else {
            EncodedImage::encode_png(&marked)
        }
    })
    .await
    .map_err(|e| PhotoboothError::external("tokio", e))?
}
