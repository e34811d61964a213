//! # Photobooth
//!
//! High-level facade wiring the pipeline stages to one [`Session`]. Provides a
//! builder-pattern API for choosing collaborators.
//!
//! ## Architecture
//!
//! 1. **Collaborators**: [`ImageTransformer`], [`Uploader`], [`QrEncoder`] and
//!    [`WatermarkSource`] traits, supplied by the builder
//! 2. **Photobooth**: owns the session, the compositor, the GIF assembler and
//!    the upload coordinator
//! 3. **PhotoboothBuilder**: fluent configuration, or [`PhotoboothBuilder::from_config`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use photobooth::booth::{Photobooth, SnapRequest};
//! use photobooth::capture::RawFrame;
//! use photobooth::config::BoothConfig;
//! use photobooth::upload::PrepareOptions;
//!
//! # async fn example(frame: RawFrame) -> photobooth::BoothResult<()> {
//! let booth = Photobooth::builder()
//!     .from_config(&BoothConfig::from_env()?)?
//!     .build()?;
//!
//! let id = booth
//!     .snap_frame(frame, false, SnapRequest::new("default", "Turn this into a comic"))
//!     .await?;
//! booth.make_gif().await;
//! booth.prepare_downloads(Some(id), PrepareOptions::default()).await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{error, info};

use crate::capture::{CapturedStill, RawFrame, render_capture};
use crate::config::BoothConfig;
use crate::core::{BlobUrl, EncodedImage};
use crate::error::{BoothResult, PhotoboothError, Retryable};
use crate::processing::{
    FileWatermark, GifAssembler, WatermarkCompositor, WatermarkSource, reconcile, watermarked_preview,
};
use crate::session::{PhotoId, Session};
use crate::transform::{DEFAULT_MODEL, HttpTransformer, ImageTransformer, TransformRequest};
use crate::upload::{
    HttpUploader, LocalStorage, PrepareOptions, QrCodeEncoder, QrEncoder, UploadCoordinator, Uploader,
    WatermarkOptions,
};

/// Mode selecting the user-written prompt.
pub const CUSTOM_MODE: &str = "custom";

/// What to ask the AI for when snapping a photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapRequest {
    pub mode: String,
    /// Prompt of the selected mode.
    pub prompt: String,
    /// User prompt, used when `mode` is [`CUSTOM_MODE`].
    pub custom_prompt: Option<String>,
}

impl SnapRequest {
    pub fn new(mode: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            prompt: prompt.into(),
            custom_prompt: None,
        }
    }

    pub fn custom(prompt: impl Into<String>) -> Self {
        Self {
            mode: CUSTOM_MODE.to_string(),
            prompt: String::new(),
            custom_prompt: Some(prompt.into()),
        }
    }

    pub fn effective_prompt(&self) -> &str {
        match (&self.custom_prompt, self.mode == CUSTOM_MODE) {
            (Some(custom), true) => custom,
            _ => &self.prompt,
        }
    }
}

pub struct Photobooth {
    session: Arc<Session>,
    transformer: Arc<dyn ImageTransformer>,
    compositor: Arc<WatermarkCompositor>,
    gif: Arc<GifAssembler>,
    coordinator: UploadCoordinator,
    model: String,
    mirror: bool,
    portrait: bool,
}

impl Photobooth {
    /// Create a new builder.
    pub fn builder() -> PhotoboothBuilder {
        PhotoboothBuilder::new()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn compositor(&self) -> &Arc<WatermarkCompositor> {
        &self.compositor
    }

    /// Normalize a camera frame into a still. `rotate` marks a sensor whose
    /// frames are turned 90° from the session orientation.
    pub async fn capture(&self, frame: RawFrame, rotate: bool) -> BoothResult<CapturedStill> {
        let options = booth_scale::geometry::CaptureOptions {
            portrait: self.portrait,
            rotate,
        };
        let mirror = self.mirror;
        tokio::task::spawn_blocking(move || render_capture(&frame, options, mirror))
            .await
            .map_err(|e| PhotoboothError::external("tokio", e))?
    }

    /// Store a captured still and run the AI transform on it.
    ///
    /// The photo is listed as busy until the transform settles. A failure is
    /// recorded on the photo rather than returned; the id comes back either way.
    pub async fn snap(&self, still: CapturedStill, request: SnapRequest) -> PhotoId {
        let id = self
            .session
            .begin_capture(request.mode.clone(), still.image.clone(), still.meta);

        let transform = TransformRequest {
            model: self.model.clone(),
            prompt: request.effective_prompt().to_string(),
            input_image: still.image,
        };
        let result = match self.transformer.transform(transform).await {
            Ok(output) => {
                let target = still.meta;
                tokio::task::spawn_blocking(move || reconcile(&output, Some(&target)))
                    .await
                    .map_err(|e| PhotoboothError::external("tokio", e))
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(reconciled) => {
                self.session.complete_transform(id, reconciled.image, reconciled.meta);
                info!(photo_id = %id, mode = %request.mode, "Photo transformed");
            }
            Err(e) => {
                error!(photo_id = %id, retryable = e.is_retryable(), error = %e, "Error processing photo");
                self.session.fail_transform(id, e.to_string());
            }
        }
        id
    }

    /// [`Photobooth::capture`] followed by [`Photobooth::snap`].
    pub async fn snap_frame(&self, frame: RawFrame, rotate: bool, request: SnapRequest) -> BoothResult<PhotoId> {
        let still = self.capture(frame, rotate).await?;
        Ok(self.snap(still, request).await)
    }

    pub async fn make_gif(&self) -> Option<BlobUrl> {
        self.gif.assemble(&self.session).await
    }

    pub async fn prepare_downloads(&self, photo_id: Option<PhotoId>, options: PrepareOptions) -> bool {
        self.coordinator.prepare(photo_id, options).await
    }

    /// Watermarked preview of one photo's AI output.
    pub async fn preview(&self, photo_id: PhotoId) -> Option<EncodedImage> {
        let output = self.session.output(photo_id)?;
        Some(watermarked_preview(&self.compositor, &output).await)
    }

    /// Watermarked previews of every transformed photo, newest first.
    pub async fn previews(&self) -> Vec<(PhotoId, EncodedImage)> {
        let outputs: Vec<(PhotoId, EncodedImage)> = self
            .session
            .photos()
            .into_iter()
            .filter(|photo| !photo.is_busy)
            .filter_map(|photo| self.session.output(photo.id).map(|output| (photo.id, output)))
            .collect();

        join_all(outputs.into_iter().map(|(id, output)| async move {
            (id, watermarked_preview(&self.compositor, &output).await)
        }))
        .await
    }

    pub fn delete_photo(&self, photo_id: PhotoId) -> bool {
        self.session.delete_photo(photo_id)
    }

    pub fn reset_session(&self) {
        self.session.reset();
    }

    /// Start over for the next guest; in-flight preparations are abandoned.
    pub fn retake(&self) {
        self.session.retake();
    }

    /// Abandon in-flight preparations without touching photos.
    pub fn cancel_preparation(&self) {
        self.session.cancel_uploads();
    }

    pub fn hide_gif(&self) {
        self.session.hide_gif();
    }
}

/// Builder for [`Photobooth`].
pub struct PhotoboothBuilder {
    session: Option<Arc<Session>>,
    transformer: Option<Arc<dyn ImageTransformer>>,
    uploader: Option<Arc<dyn Uploader>>,
    qr: Option<Arc<dyn QrEncoder>>,
    watermark: Option<Arc<dyn WatermarkSource>>,
    upload_watermark: WatermarkOptions,
    model: String,
    portrait: bool,
    mirror: bool,
}

impl Default for PhotoboothBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotoboothBuilder {
    /// Create a new builder with no collaborators.
    pub fn new() -> Self {
        Self {
            session: None,
            transformer: None,
            uploader: None,
            qr: None,
            watermark: None,
            upload_watermark: WatermarkOptions::default(),
            model: DEFAULT_MODEL.to_string(),
            portrait: true,
            mirror: true,
        }
    }

    /// Wire HTTP collaborators, local storage and the watermark file from `config`.
    ///
    /// Without an upload URL, uploads go to [`LocalStorage`] under the
    /// configured base directory.
    pub fn from_config(mut self, config: &BoothConfig) -> BoothResult<Self> {
        config
            .validate()
            .map_err(|reason| PhotoboothError::config("config", "", reason))?;

        let qr: Arc<dyn QrEncoder> = Arc::new(QrCodeEncoder::new());
        if let Some(url) = &config.transform_url {
            let transformer: Arc<dyn ImageTransformer> =
                Arc::new(HttpTransformer::new(url, config.http_timeout())?);
            self.transformer = Some(transformer);
        }
        let uploader: Arc<dyn Uploader> = match &config.upload_url {
            Some(url) => Arc::new(HttpUploader::new(url, config.http_timeout())?),
            None => Arc::new(
                LocalStorage::new(&config.upload_base_dir, &config.public_base_url, qr.clone())
                    .with_watermark(config.watermark_assets())
                    .with_defaults(config.watermark_options()),
            ),
        };
        self.uploader = Some(uploader);
        self.qr = Some(qr);
        self.watermark = Some(Arc::new(FileWatermark::new(&config.watermark_path)));
        self.upload_watermark = config.watermark_options();
        self.model = config.model.clone();
        self.portrait = config.portrait;
        self.mirror = config.mirror;
        Ok(self)
    }

    /// Share an existing session instead of creating one.
    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn ImageTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_qr_encoder(mut self, qr: Arc<dyn QrEncoder>) -> Self {
        self.qr = Some(qr);
        self
    }

    pub fn with_watermark(mut self, source: Arc<dyn WatermarkSource>) -> Self {
        self.watermark = Some(source);
        self
    }

    /// Watermark settings forwarded with still uploads.
    pub fn with_upload_watermark(mut self, options: WatermarkOptions) -> Self {
        self.upload_watermark = options;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_portrait(mut self, portrait: bool) -> Self {
        self.portrait = portrait;
        self
    }

    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// Build the booth with the configured components.
    pub fn build(self) -> BoothResult<Photobooth> {
        let transformer = self.transformer.ok_or_else(|| {
            PhotoboothError::config("transformer", "unset", "no AI transform configured")
                .with_recovery_suggestion("Set PHOTOBOOTH_TRANSFORM_URL or pass --transform-url")
        })?;
        let uploader = self
            .uploader
            .ok_or_else(|| PhotoboothError::config("uploader", "unset", "no upload target configured"))?;
        let qr = self.qr.unwrap_or_else(|| Arc::new(QrCodeEncoder::new()));
        let watermark = self
            .watermark
            .unwrap_or_else(|| Arc::new(FileWatermark::new(BoothConfig::default().watermark_path)));

        let session = self.session.unwrap_or_default();
        let compositor = Arc::new(WatermarkCompositor::from_source(watermark));
        let gif = Arc::new(GifAssembler::new(compositor.clone()));
        let coordinator = UploadCoordinator::new(session.clone(), gif.clone(), uploader, qr)
            .with_watermark(self.upload_watermark);

        Ok(Photobooth {
            session,
            transformer,
            compositor,
            gif,
            coordinator,
            model: self.model,
            mirror: self.mirror,
            portrait: self.portrait,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_prompt() {
        assert_eq!(SnapRequest::new("comic", "Make it a comic").effective_prompt(), "Make it a comic");
        assert_eq!(SnapRequest::custom("A knight").effective_prompt(), "A knight");

        let mut request = SnapRequest::new("comic", "Make it a comic");
        request.custom_prompt = Some("ignored".to_string());
        assert_eq!(request.effective_prompt(), "Make it a comic");
    }

    #[test]
    fn test_build_requires_transformer() {
        let err = Photobooth::builder().build().err().unwrap();
        assert_eq!(err.category(), "config");
    }
}
