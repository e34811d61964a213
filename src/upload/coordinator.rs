//! # Download Preparation
//!
//! Uploads the still and the GIF and produces a QR code for each, so the kiosk
//! can show its download and print screens.
//!
//! ## Protocol
//!
//! `prepare` checks its preconditions in order and bails out with `false` on
//! the first one that fails:
//!
//! 1. a photo id was given
//! 2. unless forced, a previous `Ready` returns `true` and a previous `Error`
//!    returns `false`
//! 3. no other preparation is running
//! 4. the photo exists and is not busy
//! 5. its AI output is in the image store
//!
//! When every URL and QR code is already cached (and not forced) the photo is
//! marked `Ready` without touching the network. A forced run still reuses
//! whichever URL and QR pair is cached and uploads only the missing artifact.
//!
//! Otherwise it claims the busy flag and a fresh upload epoch. After every
//! suspension point it compares its epoch with the session's; a newer
//! preparation or a retake makes it return `false` without writing anything.
//! Results land in the session in one atomic commit.
//!
//! ## Failure handling
//!
//! If an upload fails, a QR code for a best-effort URL (the data URL of the
//! still, the blob URL of the GIF) is used instead. Only when that also fails
//! does the preparation fail, and the photo is marked `Error`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use super::{QrEncoder, QrOptions, UploadRequest, Uploader, WatermarkOptions};
use crate::core::{DataUrl, EncodedImage, EpochToken};
use crate::error::{BoothResult, PhotoboothError, Retryable};
use crate::processing::GifAssembler;
use crate::session::{DownloadCommit, PhotoId, PrepareStatus, QrCodes, Session};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Redo the preparation even if a status or cached artifacts exist.
    pub force: bool,
}

impl PrepareOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// URL and QR code for one uploaded artifact.
#[derive(Debug, Clone)]
struct Artifact {
    url: String,
    qr: DataUrl,
}

enum Step<T> {
    Continue(T),
    Superseded,
}

pub struct UploadCoordinator {
    session: Arc<Session>,
    gif: Arc<GifAssembler>,
    uploader: Arc<dyn Uploader>,
    qr: Arc<dyn QrEncoder>,
    qr_options: QrOptions,
    watermark: WatermarkOptions,
}

impl UploadCoordinator {
    pub fn new(
        session: Arc<Session>,
        gif: Arc<GifAssembler>,
        uploader: Arc<dyn Uploader>,
        qr: Arc<dyn QrEncoder>,
    ) -> Self {
        Self {
            session,
            gif,
            uploader,
            qr,
            qr_options: QrOptions::default(),
            watermark: WatermarkOptions::default(),
        }
    }

    /// Watermark settings forwarded with still uploads.
    pub fn with_watermark(mut self, watermark: WatermarkOptions) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn with_qr_options(mut self, options: QrOptions) -> Self {
        self.qr_options = options;
        self
    }

    /// Make sure `photo_id` has uploaded artifacts and QR codes.
    ///
    /// Returns `true` when downloads are ready. Superseded, invalid and failed
    /// preparations return `false`.
    pub async fn prepare(&self, photo_id: Option<PhotoId>, options: PrepareOptions) -> bool {
        let Some(photo_id) = photo_id else {
            return false;
        };

        if !options.force {
            match self.session.prepared_status(photo_id) {
                Some(PrepareStatus::Ready) => return true,
                Some(PrepareStatus::Error) => return false,
                None => {}
            }
        }

        if self.session.is_uploading() {
            debug!(%photo_id, "Preparation already running");
            return false;
        }

        match self.session.photo(photo_id) {
            Some(photo) if !photo.is_busy => {}
            _ => return false,
        }

        let Some(still) = self.session.output(photo_id) else {
            return false;
        };

        let cached = self.session.artifact_cache(photo_id);
        if cached.is_complete() && !options.force {
            self.session.mark_prepared(photo_id, PrepareStatus::Ready);
            return true;
        }

        let Some(token) = self.session.begin_upload() else {
            debug!(%photo_id, "Preparation already running");
            return false;
        };

        let result = self.run(token, photo_id, still).await;
        let ready = match result {
            Ok(Step::Continue(())) => true,
            Ok(Step::Superseded) => {
                debug!(%photo_id, "Preparation superseded; results discarded");
                false
            }
            Err(e) => {
                warn!(%photo_id, error = %e, "Failed to prepare downloads");
                self.session.fail_upload(token, photo_id);
                false
            }
        };
        self.session.finish_upload(token);
        ready
    }

    async fn run(
        &self,
        token: EpochToken,
        photo_id: PhotoId,
        still: EncodedImage,
    ) -> BoothResult<Step<()>> {
        let gif_url = match self.session.gif_url() {
            Some(url) => url,
            None => self.gif.assemble(&self.session).await.ok_or_else(|| {
                PhotoboothError::state("preparing downloads", "ensure GIF", "GIF is not available")
            })?,
        };
        if !self.session.is_current(token) {
            return Ok(Step::Superseded);
        }

        // Cached pairs are reused even when forced.
        let cached = self.session.artifact_cache(photo_id);

        let photo = match (cached.photo_url, cached.qr_codes.photo) {
            (Some(url), Some(qr)) => Artifact { url, qr },
            _ => {
                let request = UploadRequest {
                    filename: format!("{}-foto-{}.{}", FILE_PREFIX, unix_millis(), still.extension()),
                    image: still.clone(),
                    watermark: self.watermark,
                };
                match self.publish(request, still.to_data_url().as_str(), token).await? {
                    Step::Continue(artifact) => artifact,
                    Step::Superseded => return Ok(Step::Superseded),
                }
            }
        };

        let gif = match (cached.gif_url, cached.qr_codes.gif) {
            (Some(url), Some(qr)) => Artifact { url, qr },
            _ => {
                let bytes = self.session.gif().ok_or_else(|| {
                    PhotoboothError::state("preparing downloads", "upload GIF", "GIF was discarded")
                })?;
                let request = UploadRequest {
                    filename: format!("{}-gif-{}.gif", FILE_PREFIX, unix_millis()),
                    image: bytes,
                    watermark: WatermarkOptions::default(),
                };
                match self.publish(request, gif_url.as_str(), token).await? {
                    Step::Continue(artifact) => artifact,
                    Step::Superseded => return Ok(Step::Superseded),
                }
            }
        };

        let committed = self.session.commit_downloads(
            token,
            DownloadCommit {
                photo_id,
                photo_url: Some(photo.url),
                gif_url: Some(gif.url),
                qr_codes: QrCodes {
                    photo: Some(photo.qr),
                    gif: Some(gif.qr),
                },
            },
        );
        if !committed {
            return Ok(Step::Superseded);
        }
        info!(%photo_id, "Downloads ready");
        Ok(Step::Continue(()))
    }

    /// Upload one artifact and get its QR code, falling back to a QR code for
    /// `fallback_url` when the upload fails.
    async fn publish(
        &self,
        request: UploadRequest,
        fallback_url: &str,
        token: EpochToken,
    ) -> BoothResult<Step<Artifact>> {
        let filename = request.filename.clone();
        let uploaded = self.uploader.upload(request).await;
        if !self.session.is_current(token) {
            return Ok(Step::Superseded);
        }

        let uploaded = uploaded.and_then(|response| {
            let url = response.link().map(str::to_string).ok_or_else(|| {
                PhotoboothError::upload(&filename, None, "reply is missing success or directLink")
            })?;
            Ok((url, response.qr()))
        });

        let artifact = match uploaded {
            Ok((url, Some(qr))) => Artifact { url, qr },
            Ok((url, None)) => {
                let qr = self.qr.encode(&url, &self.qr_options).await?;
                Artifact { url, qr }
            }
            Err(e) => {
                warn!(
                    filename = %filename,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Upload failed; using fallback QR code"
                );
                let qr = self.qr.encode(fallback_url, &self.qr_options).await?;
                debug!(filename = %filename, "QR code generated for fallback URL");
                Artifact {
                    url: fallback_url.to_string(),
                    qr,
                }
            }
        };

        if !self.session.is_current(token) {
            return Ok(Step::Superseded);
        }
        Ok(Step::Continue(artifact))
    }
}

const FILE_PREFIX: &str = "photobooth";

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
