//! # Local Upload Storage
//!
//! The server side of the upload endpoint, usable in-process as an
//! [`Uploader`].
//!
//! ## Layout
//!
//! ```text
//! <base>/img/photobooth_<unix millis>.<ext>   stills (watermarked)
//! <base>/gif/photobooth_<unix millis>.gif     GIFs (stored untouched)
//! ```
//!
//! The public link is `<public base URL>/uploads/<img|gif>/<file>` and the
//! reply carries a QR code for it.
//!
//! ## Watermark variants
//!
//! `putih` (white) and `hitam` (black) select sibling assets of the default
//! watermark. A missing variant falls back to white, then black, then the
//! default asset. Without a default asset nothing is watermarked.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{QrEncoder, QrOptions, UploadRequest, UploadResponse, Uploader, WatermarkOptions, WatermarkVariant};
use crate::core::EncodedImage;
use crate::error::{BoothResult, PhotoboothError};
use crate::processing::watermark::{WatermarkCompositor, WatermarkPlacement, draw_watermark};

/// JPEG quality for watermarked uploads.
pub const UPLOAD_JPEG_QUALITY: u8 = 92;
const FILE_PREFIX: &str = "photobooth";

/// Trim trailing slashes and force a scheme. Empty input yields `None`.
///
/// ```rust
/// use photobooth::upload::storage::normalize_base_url;
///
/// assert_eq!(normalize_base_url("booth.local:3000/").as_deref(), Some("http://booth.local:3000"));
/// assert_eq!(normalize_base_url("https://x.io//").as_deref(), Some("https://x.io"));
/// ```
pub fn normalize_base_url(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if has_scheme(trimmed) {
        return Some(trimmed.to_string());
    }
    let without_slashes = trimmed.trim_start_matches('/');
    let without_proto = match without_slashes.split_once(':') {
        Some((scheme, rest)) if is_scheme(scheme) && !rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => without_slashes,
    };
    Some(format!("http://{}", without_proto))
}

fn is_scheme(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

fn has_scheme(value: &str) -> bool {
    value
        .split_once("://")
        .is_some_and(|(scheme, _)| is_scheme(scheme))
}

/// Watermark files for uploaded stills.
#[derive(Debug, Clone)]
pub struct WatermarkAssets {
    pub default: PathBuf,
    pub white: Option<PathBuf>,
    pub black: Option<PathBuf>,
}

impl WatermarkAssets {
    pub fn single(default: impl Into<PathBuf>) -> Self {
        Self {
            default: default.into(),
            white: None,
            black: None,
        }
    }

    /// Default asset plus `watermark-putih.png` / `watermark-hitam.png` next to it.
    pub fn beside(default: impl Into<PathBuf>) -> Self {
        let default = default.into();
        let dir = default.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            white: Some(dir.join("watermark-putih.png")),
            black: Some(dir.join("watermark-hitam.png")),
            default,
        }
    }

    /// File to draw for `variant`, or `None` when the default asset is missing.
    pub async fn resolve(&self, variant: WatermarkVariant) -> Option<PathBuf> {
        if !exists(&self.default).await {
            return None;
        }
        let desired = match variant {
            WatermarkVariant::White => self.white.as_ref(),
            WatermarkVariant::Black => self.black.as_ref(),
            WatermarkVariant::Default => Some(&self.default),
        };
        for candidate in [desired, self.white.as_ref(), self.black.as_ref()].into_iter().flatten() {
            if exists(candidate).await {
                return Some(candidate.clone());
            }
        }
        Some(self.default.clone())
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Disk-backed [`Uploader`].
pub struct LocalStorage {
    base_dir: PathBuf,
    public_base_url: String,
    assets: Option<WatermarkAssets>,
    defaults: WatermarkOptions,
    qr: Arc<dyn QrEncoder>,
    qr_options: QrOptions,
    compositors: Mutex<HashMap<PathBuf, Arc<WatermarkCompositor>>>,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>, public_base_url: &str, qr: Arc<dyn QrEncoder>) -> Self {
        Self {
            base_dir: base_dir.into(),
            public_base_url: normalize_base_url(public_base_url)
                .unwrap_or_else(|| "http://localhost".to_string()),
            assets: None,
            defaults: WatermarkOptions::default(),
            qr,
            qr_options: QrOptions::default(),
            compositors: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_watermark(mut self, assets: WatermarkAssets) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Settings applied when a request leaves them unset.
    pub fn with_defaults(mut self, defaults: WatermarkOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    fn compositor(&self, path: &Path) -> Arc<WatermarkCompositor> {
        self.compositors
            .lock()
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(WatermarkCompositor::from_path(path)))
            .clone()
    }

    /// Watermark a still, or return it untouched if that is not possible.
    async fn watermark(&self, image: &EncodedImage, options: &WatermarkOptions) -> EncodedImage {
        let Some(assets) = &self.assets else {
            return image.clone();
        };
        if image.is_empty() || !image.mime().to_ascii_lowercase().starts_with("image/") {
            return image.clone();
        }
        let variant = options.variant.or(self.defaults.variant).unwrap_or_default();
        let Some(path) = assets.resolve(variant).await else {
            debug!("No watermark asset on disk; storing original");
            return image.clone();
        };
        let mark = match self.compositor(&path).asset().await {
            Ok(mark) => mark,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unable to read watermark; storing original");
                return image.clone();
            }
        };

        let placement = WatermarkPlacement::upload(
            options.position.or(self.defaults.position).unwrap_or_default(),
            options.scale.or(self.defaults.scale),
        );
        let source = image.clone();
        let result = tokio::task::spawn_blocking(move || -> BoothResult<EncodedImage> {
            let mut pixels = source.decode()?;
            draw_watermark(&mut pixels, &mark, &placement)?;
            match source.extension() {
                "jpg" => EncodedImage::encode_jpeg(&pixels, UPLOAD_JPEG_QUALITY),
                "webp" => EncodedImage::encode_webp(&pixels),
                _ => EncodedImage::encode_png(&pixels),
            }
        })
        .await
        .map_err(|e| PhotoboothError::external("tokio", e));

        match result {
            Ok(Ok(marked)) => {
                debug!(variant = %variant, "Applied watermark to uploaded photo");
                marked
            }
            Ok(Err(e)) | Err(e) => {
                warn!(error = %e, "Failed to apply watermark; storing original");
                image.clone()
            }
        }
    }
}

#[async_trait]
impl Uploader for LocalStorage {
    async fn upload(&self, request: UploadRequest) -> BoothResult<UploadResponse> {
        let extension = request
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "jpg".to_string());
        let is_gif = extension == "gif";
        let sub_dir = if is_gif { "gif" } else { "img" };
        let filename = format!("{}_{}.{}", FILE_PREFIX, unix_millis(), extension);
        let dir = self.base_dir.join(sub_dir);
        let path = dir.join(&filename);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PhotoboothError::io_at("create upload directory", &dir, e))?;

        let stored = if is_gif {
            request.image.clone()
        } else {
            self.watermark(&request.image, &request.watermark).await
        };
        tokio::fs::write(&path, stored.bytes())
            .await
            .map_err(|e| PhotoboothError::io_at("write upload", &path, e))?;
        info!(path = %path.display(), bytes = stored.len(), "Stored upload");

        let web_path = format!("uploads/{}/{}", sub_dir, filename);
        let direct_link = format!("{}/{}", self.public_base_url, web_path);
        let qr = self.qr.encode(&direct_link, &self.qr_options).await?;

        Ok(UploadResponse {
            success: true,
            direct_link: Some(direct_link),
            download_url: Some(format!("/{}", web_path)),
            qr_code: Some(qr.as_str().to_string()),
            filename: Some(filename),
        })
    }
}
