//! # Configuration Module
//!
//! Configuration for a booth deployment: where the AI transform and upload
//! endpoints live, where uploads and the watermark asset sit on disk, and how
//! uploaded stills are watermarked.
//!
//! ## Overview
//!
//! Values come from three layers, later ones winning:
//! - **Defaults**: [`BoothConfig::default`]
//! - **Environment**: [`BoothConfig::from_env`]
//! - **CLI flags**: applied by the `photobooth` binary
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `PHOTOBOOTH_TRANSFORM_URL` | `transform_url` | unset |
//! | `PHOTOBOOTH_UPLOAD_URL` | `upload_url` | unset (local storage) |
//! | `PHOTOBOOTH_MODEL` | `model` | `gemini-2.5-flash-image` |
//! | `WATERMARK_FILE_PATH` | `watermark_path` | `public/watermark.png` |
//! | `UPLOAD_BASE_DIR` | `upload_base_dir` | `public/uploads` |
//! | `PUBLIC_BASE_URL` | `public_base_url` | `http://localhost:3000` |
//! | `WATERMARK_POSITION` | `watermark_position` | `top-right` |
//! | `WATERMARK_VARIANT` | `watermark_variant` | `putih` |
//! | `WATERMARK_SCALE` | `watermark_scale` | `0.2` |
//! | `PHOTOBOOTH_DEBUG_LOGS` | `debug_logs` | `false` |
//! | `PHOTOBOOTH_HTTP_TIMEOUT_SECS` | `http_timeout_secs` | `60` |
//!
//! ## Examples
//!
//! ```rust
//! use photobooth::config::config::BoothConfig;
//!
//! let config = BoothConfig::default();
//! assert!(config.validate().is_ok());
//!
//! let config = BoothConfig::from_lookup(|key| match key {
//!     "WATERMARK_POSITION" => Some("bottom-left".to_string()),
//!     "WATERMARK_SCALE" => Some("0.3".to_string()),
//!     _ => None,
//! })
//! .unwrap();
//! assert_eq!(config.watermark_scale, 0.3);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use booth_scale::geometry::CaptureOptions;

use crate::error::{BoothResult, PhotoboothError};
use crate::processing::WatermarkPosition;
use crate::transform::DEFAULT_MODEL;
use crate::upload::{WatermarkAssets, WatermarkOptions, WatermarkVariant};

/// Configuration for one booth deployment.
///
/// # Field Descriptions
///
/// - `transform_url`: JSON endpoint of the AI image transform
/// - `upload_url`: multipart upload endpoint; when unset, uploads are stored
///   locally under `upload_base_dir`
/// - `watermark_*`: asset and placement for watermarked renders
#[derive(Debug, Clone, PartialEq)]
pub struct BoothConfig {
    /// Endpoint of the AI image transform.
    pub transform_url: Option<String>,

    /// Endpoint of the upload server (`.../api/upload`).
    pub upload_url: Option<String>,

    /// Model requested from the transform service.
    pub model: String,

    /// Watermark PNG used by previews, GIF frames and uploads.
    ///
    /// `watermark-putih.png` and `watermark-hitam.png` next to it provide the
    /// white and black upload variants.
    pub watermark_path: PathBuf,

    /// Root directory for locally stored uploads.
    pub upload_base_dir: PathBuf,

    /// Base of public links to locally stored uploads.
    pub public_base_url: String,

    /// Anchor of the watermark on uploaded stills.
    pub watermark_position: WatermarkPosition,

    /// Watermark asset variant for uploaded stills.
    pub watermark_variant: WatermarkVariant,

    /// Watermark width as a fraction of the still's width. Must be in (0, 1].
    pub watermark_scale: f64,

    /// Raise log verbosity to debug.
    pub debug_logs: bool,

    /// Timeout for every HTTP request, in seconds (1-600).
    pub http_timeout_secs: u64,

    /// Whether sessions capture portrait (9:16) stills.
    pub portrait: bool,

    /// Whether stills are mirrored like a front-camera preview.
    pub mirror: bool,
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            transform_url: None,
            upload_url: None,
            model: DEFAULT_MODEL.to_string(),
            watermark_path: PathBuf::from("public/watermark.png"),
            upload_base_dir: PathBuf::from("public/uploads"),
            public_base_url: "http://localhost:3000".to_string(),
            watermark_position: WatermarkPosition::TopRight,
            watermark_variant: WatermarkVariant::White,
            watermark_scale: 0.2,
            debug_logs: false,
            http_timeout_secs: 60,
            portrait: true,
            mirror: true,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl BoothConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> BoothResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, starting from the defaults.
    ///
    /// Unparseable values are configuration errors. Empty strings count as unset.
    pub fn from_lookup<F>(lookup: F) -> BoothResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get("PHOTOBOOTH_TRANSFORM_URL") {
            config.transform_url = Some(url);
        }
        if let Some(url) = get("PHOTOBOOTH_UPLOAD_URL") {
            config.upload_url = Some(url);
        }
        if let Some(model) = get("PHOTOBOOTH_MODEL") {
            config.model = model;
        }
        if let Some(path) = get("WATERMARK_FILE_PATH") {
            config.watermark_path = PathBuf::from(path);
        }
        if let Some(dir) = get("UPLOAD_BASE_DIR") {
            config.upload_base_dir = PathBuf::from(dir);
        }
        if let Some(url) = get("PUBLIC_BASE_URL") {
            config.public_base_url = url;
        }
        if let Some(value) = get("WATERMARK_POSITION") {
            config.watermark_position = value
                .parse()
                .map_err(|reason: String| PhotoboothError::config("WATERMARK_POSITION", &value, reason))?;
        }
        if let Some(value) = get("WATERMARK_VARIANT") {
            config.watermark_variant = value
                .parse()
                .map_err(|reason: String| PhotoboothError::config("WATERMARK_VARIANT", &value, reason))?;
        }
        if let Some(value) = get("WATERMARK_SCALE") {
            config.watermark_scale = value
                .trim()
                .parse()
                .map_err(|_| PhotoboothError::config("WATERMARK_SCALE", &value, "not a number"))?;
        }
        if let Some(value) = get("PHOTOBOOTH_DEBUG_LOGS") {
            config.debug_logs = parse_bool(&value)
                .ok_or_else(|| PhotoboothError::config("PHOTOBOOTH_DEBUG_LOGS", &value, "not a boolean"))?;
        }
        if let Some(value) = get("PHOTOBOOTH_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = value.trim().parse().map_err(|_| {
                PhotoboothError::config("PHOTOBOOTH_HTTP_TIMEOUT_SECS", &value, "not a whole number")
            })?;
        }

        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name must not be empty".to_string());
        }
        if !(self.watermark_scale.is_finite() && self.watermark_scale > 0.0 && self.watermark_scale <= 1.0) {
            return Err("Watermark scale must be greater than 0 and at most 1".to_string());
        }
        if !(1..=600).contains(&self.http_timeout_secs) {
            return Err("HTTP timeout must be between 1 and 600 seconds".to_string());
        }
        for (name, url) in [("Transform URL", &self.transform_url), ("Upload URL", &self.upload_url)] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(format!("{} must start with http:// or https://", name));
                }
            }
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Capture options for a camera that delivers frames in the session's orientation.
    pub fn capture_options(&self, rotate: bool) -> CaptureOptions {
        CaptureOptions {
            portrait: self.portrait,
            rotate,
        }
    }

    /// Watermark settings forwarded with still uploads.
    pub fn watermark_options(&self) -> WatermarkOptions {
        WatermarkOptions {
            position: Some(self.watermark_position),
            variant: Some(self.watermark_variant),
            scale: Some(self.watermark_scale),
        }
    }

    pub fn watermark_assets(&self) -> WatermarkAssets {
        WatermarkAssets::beside(&self.watermark_path)
    }
}
