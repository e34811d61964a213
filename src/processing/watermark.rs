//! # Watermark Compositing
//!
//! Draws the booth's watermark asset onto stills and GIF frames.
//!
//! ## Architecture
//!
//! 1. **WatermarkSource**: where the asset comes from (file on disk, in-memory image)
//! 2. **WatermarkCompositor**: loads the asset once and memoizes it; a failed load
//!    leaves the cell empty so the next render retries
//! 3. **WatermarkPlacement**: size, margin and anchor for one kind of render
//!
//! Compositing never fails a render. If the asset cannot be loaded or drawn the
//! base image is returned unwatermarked and a warning is logged.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use image::{RgbaImage, imageops};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::render::resize_exact;
use crate::core::EncodedImage;
use crate::error::{BoothResult, PhotoboothError};

/// Default share of the canvas width used by uploaded stills.
pub const DEFAULT_UPLOAD_SCALE: f64 = 0.2;

/// Anchor of the watermark on the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatermarkPosition {
    TopLeft,
    TopCenter,
    #[default]
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl WatermarkPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for WatermarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatermarkPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top-left" => Ok(Self::TopLeft),
            "top-center" => Ok(Self::TopCenter),
            "top-right" => Ok(Self::TopRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-center" => Ok(Self::BottomCenter),
            "bottom-right" => Ok(Self::BottomRight),
            other => Err(format!("unknown watermark position '{}'", other)),
        }
    }
}

/// Which canvas measure the watermark width is a fraction of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthBasis {
    CanvasWidth,
    ShortSide,
}

/// Size and anchor rules for one kind of render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkPlacement {
    pub width_ratio: f64,
    pub basis: WidthBasis,
    pub margin_ratio: f64,
    pub min_margin: u32,
    pub position: WatermarkPosition,
}

/// Where the scaled watermark lands on a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl WatermarkPlacement {
    /// On-screen previews: 22% of the width, top-right.
    pub fn preview() -> Self {
        Self {
            width_ratio: 0.22,
            basis: WidthBasis::CanvasWidth,
            margin_ratio: 0.03,
            min_margin: 14,
            position: WatermarkPosition::TopRight,
        }
    }

    /// GIF frames: 22% of the shorter side, bottom-right.
    pub fn gif_frame() -> Self {
        Self {
            width_ratio: 0.22,
            basis: WidthBasis::ShortSide,
            margin_ratio: 0.04,
            min_margin: 10,
            position: WatermarkPosition::BottomRight,
        }
    }

    /// Uploaded stills. Non-finite or non-positive scales fall back to
    /// [`DEFAULT_UPLOAD_SCALE`].
    pub fn upload(position: WatermarkPosition, scale: Option<f64>) -> Self {
        let scale = scale
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_UPLOAD_SCALE);
        Self {
            width_ratio: scale,
            basis: WidthBasis::CanvasWidth,
            margin_ratio: 0.04,
            min_margin: 10,
            position,
        }
    }

    /// Compute the watermark rectangle for a canvas and an asset size.
    /// The asset's aspect is kept; offsets never go negative.
    pub fn layout(&self, canvas: (u32, u32), mark: (u32, u32)) -> WatermarkRect {
        let (canvas_w, canvas_h) = (canvas.0.max(1) as i64, canvas.1.max(1) as i64);
        let (mark_w, mark_h) = (mark.0.max(1) as f64, mark.1.max(1) as f64);
        let short = canvas_w.min(canvas_h) as f64;
        let basis = match self.basis {
            WidthBasis::CanvasWidth => canvas_w as f64,
            WidthBasis::ShortSide => short,
        };

        let width = ((basis * self.width_ratio).round() as i64).max(1);
        let height = ((width as f64 * mark_h / mark_w).round() as i64).max(1);
        let margin = (self.min_margin as i64).max((short * self.margin_ratio).round() as i64);

        let left = margin;
        let center = ((canvas_w - width) as f64 / 2.0).round() as i64;
        let right = canvas_w - width - margin;
        let top = margin;
        let bottom = canvas_h - height - margin;

        let (x, y) = match self.position {
            WatermarkPosition::TopLeft => (left, top),
            WatermarkPosition::TopCenter => (center, top),
            WatermarkPosition::TopRight => (right, top),
            WatermarkPosition::BottomLeft => (left, bottom),
            WatermarkPosition::BottomCenter => (center, bottom),
            WatermarkPosition::BottomRight => (right, bottom),
        };

        WatermarkRect {
            x: x.max(0) as u32,
            y: y.max(0) as u32,
            width: width as u32,
            height: height as u32,
        }
    }
}

/// Provider of the watermark asset's pixels.
#[async_trait]
pub trait WatermarkSource: Send + Sync {
    async fn load(&self) -> BoothResult<RgbaImage>;

    /// Human-readable origin, used in log lines.
    fn describe(&self) -> String;
}

/// Watermark PNG read from disk.
#[derive(Debug, Clone)]
pub struct FileWatermark {
    path: PathBuf,
}

impl FileWatermark {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WatermarkSource for FileWatermark {
    async fn load(&self) -> BoothResult<RgbaImage> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| PhotoboothError::io_at("read watermark", &self.path, e))?;
        tokio::task::spawn_blocking(move || EncodedImage::sniff(bytes).decode())
            .await
            .map_err(|e| PhotoboothError::external("tokio", e))?
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Watermark already held in memory.
#[derive(Debug, Clone)]
pub struct StaticWatermark {
    image: RgbaImage,
}

impl StaticWatermark {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }
}

#[async_trait]
impl WatermarkSource for StaticWatermark {
    async fn load(&self) -> BoothResult<RgbaImage> {
        Ok(self.image.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory {}x{}", self.image.width(), self.image.height())
    }
}

/// Draws a memoized watermark onto images.
pub struct WatermarkCompositor {
    source: Arc<dyn WatermarkSource>,
    asset: OnceCell<Arc<RgbaImage>>,
}

impl WatermarkCompositor {
    pub fn new(source: impl WatermarkSource + 'static) -> Self {
        Self::from_source(Arc::new(source))
    }

    pub fn from_source(source: Arc<dyn WatermarkSource>) -> Self {
        Self {
            source,
            asset: OnceCell::new(),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(FileWatermark::new(path))
    }

    /// The decoded asset. Concurrent callers share a single load.
    pub async fn asset(&self) -> BoothResult<Arc<RgbaImage>> {
        self.asset
            .get_or_try_init(|| async {
                let image = self.source.load().await?;
                debug!(
                    source = %self.source.describe(),
                    width = image.width(),
                    height = image.height(),
                    "Loaded watermark"
                );
                Ok::<_, PhotoboothError>(Arc::new(image))
            })
            .await
            .cloned()
    }

    /// Draw the watermark onto `base` according to `placement`.
    pub async fn composite_onto(&self, mut base: RgbaImage, placement: &WatermarkPlacement) -> RgbaImage {
        let mark = match self.asset().await {
            Ok(mark) => mark,
            Err(e) => {
                warn!(source = %self.source.describe(), error = %e, "Watermark unavailable; rendering without it");
                return base;
            }
        };
        if let Err(e) = draw_watermark(&mut base, &mark, placement) {
            warn!(error = %e, "Failed to draw watermark; rendering without it");
        }
        base
    }
}

/// Scale `mark` per `placement` and alpha-blend it onto `base`.
pub fn draw_watermark(
    base: &mut RgbaImage,
    mark: &RgbaImage,
    placement: &WatermarkPlacement,
) -> BoothResult<WatermarkRect> {
    let rect = placement.layout(base.dimensions(), mark.dimensions());
    let scaled = resize_exact(mark, rect.width, rect.height)?;
    imageops::overlay(base, &scaled, rect.x as i64, rect.y as i64);
    Ok(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mark() -> RgbaImage {
        RgbaImage::from_pixel(100, 50, Rgba([255, 0, 0, 255]))
    }

    struct CountingSource {
        loads: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl WatermarkSource for CountingSource {
        async fn load(&self) -> BoothResult<RgbaImage> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_first && n == 0 {
                return Err(PhotoboothError::processing("load watermark", "disk hiccup"));
            }
            Ok(mark())
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_preview_layout() {
        let rect = WatermarkPlacement::preview().layout((1080, 1920), (100, 50));
        assert_eq!(rect, WatermarkRect { x: 810, y: 32, width: 238, height: 119 });
    }

    #[test]
    fn test_gif_frame_layout() {
        let rect = WatermarkPlacement::gif_frame().layout((405, 720), (100, 50));
        assert_eq!(rect, WatermarkRect { x: 300, y: 659, width: 89, height: 45 });
    }

    #[test]
    fn test_upload_layout_positions() {
        let placement = WatermarkPlacement::upload(WatermarkPosition::BottomCenter, Some(0.2));
        let rect = placement.layout((1000, 500), (100, 50));
        assert_eq!(rect, WatermarkRect { x: 400, y: 380, width: 200, height: 100 });

        let placement = WatermarkPlacement::upload(WatermarkPosition::TopLeft, None);
        assert_eq!(placement.width_ratio, DEFAULT_UPLOAD_SCALE);
        let rect = placement.layout((1000, 500), (100, 50));
        assert_eq!((rect.x, rect.y), (20, 20));

        let placement = WatermarkPlacement::upload(WatermarkPosition::TopRight, Some(f64::NAN));
        assert_eq!(placement.width_ratio, DEFAULT_UPLOAD_SCALE);
    }

    #[test]
    fn test_layout_clamps_on_tiny_canvas() {
        let placement = WatermarkPlacement::upload(WatermarkPosition::BottomRight, None);
        let rect = placement.layout((10, 10), (100, 50));
        assert_eq!((rect.x, rect.y), (0, 0));
    }

    #[test]
    fn test_position_parsing() {
        assert_eq!("Bottom-Left".parse::<WatermarkPosition>(), Ok(WatermarkPosition::BottomLeft));
        assert!("middle".parse::<WatermarkPosition>().is_err());
        assert_eq!(WatermarkPosition::default(), WatermarkPosition::TopRight);
    }

    #[tokio::test]
    async fn test_asset_loaded_once_for_concurrent_callers() {
        let source = Arc::new(CountingSource { loads: AtomicUsize::new(0), fail_first: false });
        let compositor = WatermarkCompositor::from_source(source.clone());

        let (a, b) = tokio::join!(compositor.asset(), compositor.asset());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried_and_render_survives() {
        let source = Arc::new(CountingSource { loads: AtomicUsize::new(0), fail_first: true });
        let compositor = WatermarkCompositor::from_source(source.clone());
        let base = RgbaImage::from_pixel(200, 200, Rgba([0, 0, 0, 255]));

        let first = compositor.composite_onto(base.clone(), &WatermarkPlacement::preview()).await;
        assert_eq!(first, base);

        let second = compositor.composite_onto(base.clone(), &WatermarkPlacement::preview()).await;
        assert_ne!(second, base);
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }
}
