//! Pixel dimensions and per-photo capture metadata.

use booth_scale::presets::Size;
use serde::Serialize;

/// Orientation derived from a width/height pair. Square images count as portrait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Whole-pixel dimensions of an image plus the derived aspect and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub aspect: f64,
    pub orientation: Orientation,
}

impl Dimensions {
    /// Build dimensions from whole pixels; zero sides are raised to 1.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            aspect: width as f64 / height as f64,
            orientation: if height >= width {
                Orientation::Portrait
            } else {
                Orientation::Landscape
            },
        }
    }

    /// Round fractional sizes to whole pixels, minimum 1.
    pub fn from_size(width: f64, height: f64) -> Self {
        let round = |v: f64| {
            if v.is_finite() && v >= 1.0 {
                v.round() as u32
            } else {
                1
            }
        };
        Self::new(round(width), round(height))
    }

    /// Like [`Dimensions::from_size`] but rejects non-finite or non-positive input.
    pub fn normalize(width: f64, height: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        (valid(width) && valid(height)).then(|| Self::from_size(width, height))
    }

    /// 1×1 placeholder used when nothing better is known.
    pub fn fallback() -> Self {
        Self::new(1, 1)
    }

    /// True when both sides are non-zero. Values built through the constructors
    /// always are; this guards against hand-assembled structs.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl From<Size> for Dimensions {
    fn from(size: Size) -> Self {
        Self::new(size.w, size.h)
    }
}

/// Dimensions recorded for one photo across the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ImageMeta {
    pub input: Option<Dimensions>,
    pub output: Option<Dimensions>,
    pub gif: Option<Dimensions>,
}
