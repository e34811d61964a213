//! # Booth Session
//!
//! The explicit session context shared by every pipeline stage.
//!
//! ## Architecture
//!
//! All mutable state (photos, image store, cloud URLs, QR codes, prepared
//! download statuses, the GIF blob) lives in one [`SessionState`] behind a
//! `parking_lot::Mutex`. Each state transition is a single critical section and
//! the lock is never held across an `.await`, so readers never observe a half
//! applied update. Readers get cloned snapshots.
//!
//! Two counters sit beside the state:
//!
//! - the **upload epoch**, advanced by every download preparation and by
//!   retake; commits from an older epoch are dropped
//! - the **generation**, advanced by every reset; GIF assembly started before a
//!   reset is discarded
//!
//! ## Lifecycle
//!
//! ```text
//! new ──▶ capture ──▶ transform ──▶ GIF ──▶ prepare downloads
//!  ▲                                               │
//!  └──────────────── retake / reset ◀──────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::core::{
    BlobRegistry, BlobUrl, DataUrl, Dimensions, EncodedImage, EpochToken, ImageMeta, UploadEpoch,
};

/// Identifier of a photo within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PhotoId(u64);

impl PhotoId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One capture and its AI transform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Photo {
    pub id: PhotoId,
    pub mode: String,
    pub is_busy: bool,
    pub error: Option<String>,
}

/// Outcome of a download preparation. Absent means never attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepareStatus {
    Ready,
    Error,
}

/// Key of an uploaded artifact's public URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Photo(PhotoId),
    Gif,
}

/// QR codes for the still and the GIF; downloads are ready only with both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QrCodes {
    pub photo: Option<DataUrl>,
    pub gif: Option<DataUrl>,
}

impl QrCodes {
    pub fn is_complete(&self) -> bool {
        self.photo.is_some() && self.gif.is_some()
    }
}

/// Everything the GIF assembler needs, captured in one snapshot.
#[derive(Debug, Clone)]
pub struct GifSource {
    pub photo_id: PhotoId,
    pub input: EncodedImage,
    pub output: EncodedImage,
    pub meta: ImageMeta,
    pub generation: u64,
}

/// Upload-related cache entries for one photo.
#[derive(Debug, Clone, Default)]
pub struct ArtifactCache {
    pub photo_url: Option<String>,
    pub gif_url: Option<String>,
    pub qr_codes: QrCodes,
}

impl ArtifactCache {
    /// Both URLs and both QR codes are present.
    pub fn is_complete(&self) -> bool {
        self.photo_url.is_some() && self.gif_url.is_some() && self.qr_codes.is_complete()
    }
}

/// Result of a preparation, committed in one critical section.
#[derive(Debug, Clone)]
pub struct DownloadCommit {
    pub photo_id: PhotoId,
    pub photo_url: Option<String>,
    pub gif_url: Option<String>,
    pub qr_codes: QrCodes,
}

#[derive(Debug, Default)]
struct SessionState {
    /// Newest first.
    photos: Vec<Photo>,
    inputs: HashMap<PhotoId, EncodedImage>,
    outputs: HashMap<PhotoId, EncodedImage>,
    meta: HashMap<PhotoId, ImageMeta>,
    cloud_urls: HashMap<CacheKey, String>,
    qr_codes: QrCodes,
    prepared: HashMap<PhotoId, PrepareStatus>,
    blobs: BlobRegistry,
    gif_url: Option<BlobUrl>,
    gif_visible: bool,
    uploading: bool,
    generation: u64,
}

impl SessionState {
    fn purge_images(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
        self.meta.clear();
    }

    fn reset(&mut self) {
        self.purge_images();
        self.photos.clear();
        if let Some(url) = self.gif_url.take() {
            self.blobs.revoke(&url);
        }
        self.gif_visible = false;
        self.generation += 1;
    }
}

/// Shared session context.
#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<SessionState>,
    epoch: UploadEpoch,
    next_photo: AtomicU64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- capture & transform ----

    /// Record a fresh capture as a busy photo at the front of the list.
    pub fn begin_capture(&self, mode: impl Into<String>, input: EncodedImage, input_meta: Dimensions) -> PhotoId {
        let id = PhotoId(self.next_photo.fetch_add(1, Ordering::Relaxed) + 1);
        let mut state = self.state.lock();
        state.inputs.insert(id, input);
        state.meta.insert(
            id,
            ImageMeta {
                input: Some(input_meta),
                ..ImageMeta::default()
            },
        );
        state.photos.insert(
            0,
            Photo {
                id,
                mode: mode.into(),
                is_busy: true,
                error: None,
            },
        );
        id
    }

    /// Store the reconciled AI output and mark the photo ready.
    /// Returns `false` if the photo was deleted in the meantime.
    pub fn complete_transform(&self, id: PhotoId, output: EncodedImage, output_meta: Dimensions) -> bool {
        let mut state = self.state.lock();
        let Some(photo) = state.photos.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        photo.is_busy = false;
        photo.error = None;
        state.outputs.insert(id, output);
        state.meta.entry(id).or_default().output = Some(output_meta);
        true
    }

    /// Record a transform failure on the photo and clear its busy flag.
    pub fn fail_transform(&self, id: PhotoId, message: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        match state.photos.iter_mut().find(|p| p.id == id) {
            Some(photo) => {
                photo.is_busy = false;
                photo.error = Some(message.into());
                true
            }
            None => false,
        }
    }

    // ---- snapshots ----

    pub fn photos(&self) -> Vec<Photo> {
        self.state.lock().photos.clone()
    }

    pub fn photo(&self, id: PhotoId) -> Option<Photo> {
        self.state.lock().photos.iter().find(|p| p.id == id).cloned()
    }

    pub fn input(&self, id: PhotoId) -> Option<EncodedImage> {
        self.state.lock().inputs.get(&id).cloned()
    }

    pub fn output(&self, id: PhotoId) -> Option<EncodedImage> {
        self.state.lock().outputs.get(&id).cloned()
    }

    pub fn meta(&self, id: PhotoId) -> Option<ImageMeta> {
        self.state.lock().meta.get(&id).copied()
    }

    /// Ids with any entry in the image store, sorted.
    pub fn stored_ids(&self) -> Vec<PhotoId> {
        let state = self.state.lock();
        let mut ids: Vec<PhotoId> = state
            .inputs
            .keys()
            .chain(state.outputs.keys())
            .chain(state.meta.keys())
            .copied()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    // ---- GIF ----

    /// Snapshot of the newest non-busy photo, if both its images are stored.
    pub fn gif_source(&self) -> Option<GifSource> {
        let state = self.state.lock();
        let photo = state.photos.iter().find(|p| !p.is_busy)?;
        Some(GifSource {
            photo_id: photo.id,
            input: state.inputs.get(&photo.id)?.clone(),
            output: state.outputs.get(&photo.id)?.clone(),
            meta: state.meta.get(&photo.id).copied().unwrap_or_default(),
            generation: state.generation,
        })
    }

    /// Publish an assembled GIF for `photo_id` and prune the session to that photo.
    ///
    /// Returns `None` when the session was reset since `generation` was read or
    /// the photo is gone; nothing is written in that case.
    pub fn commit_gif(
        &self,
        photo_id: PhotoId,
        generation: u64,
        gif: EncodedImage,
        gif_meta: Dimensions,
    ) -> Option<BlobUrl> {
        let mut state = self.state.lock();
        if state.generation != generation || !state.photos.iter().any(|p| p.id == photo_id) {
            return None;
        }

        if let Some(previous) = state.gif_url.take() {
            state.blobs.revoke(&previous);
        }
        let url = state.blobs.issue(gif);
        state.gif_url = Some(url.clone());
        state.gif_visible = true;
        state.meta.entry(photo_id).or_default().gif = Some(gif_meta);

        state.inputs.retain(|id, _| *id == photo_id);
        state.outputs.retain(|id, _| *id == photo_id);
        state.meta.retain(|id, _| *id == photo_id);
        state.photos.retain(|p| p.id == photo_id);
        Some(url)
    }

    pub fn gif_url(&self) -> Option<BlobUrl> {
        self.state.lock().gif_url.clone()
    }

    /// Bytes of the current GIF.
    pub fn gif(&self) -> Option<EncodedImage> {
        let state = self.state.lock();
        state.gif_url.as_ref().and_then(|url| state.blobs.resolve(url))
    }

    pub fn is_gif_visible(&self) -> bool {
        self.state.lock().gif_visible
    }

    /// Hide the GIF from the display without discarding it.
    pub fn hide_gif(&self) {
        self.state.lock().gif_visible = false;
    }

    // ---- deletion & reset ----

    /// Remove a photo and every cache entry keyed by it.
    pub fn delete_photo(&self, id: PhotoId) -> bool {
        let mut state = self.state.lock();
        let before = state.photos.len();
        state.photos.retain(|p| p.id != id);
        state.inputs.remove(&id);
        state.outputs.remove(&id);
        state.meta.remove(&id);
        state.prepared.remove(&id);
        state.cloud_urls.remove(&CacheKey::Photo(id));
        state.photos.len() != before
    }

    /// Drop all photos, images and the GIF blob.
    pub fn reset(&self) {
        self.state.lock().reset();
        debug!("Session reset");
    }

    /// Abandon in-flight preparations: advance the epoch and release the busy flag.
    pub fn cancel_uploads(&self) {
        let mut state = self.state.lock();
        self.epoch.advance();
        state.uploading = false;
    }

    /// Start over: cancel uploads, reset the session and clear every upload cache.
    pub fn retake(&self) {
        let mut state = self.state.lock();
        self.epoch.advance();
        state.uploading = false;
        state.reset();
        state.cloud_urls.clear();
        state.qr_codes = QrCodes::default();
        state.prepared.clear();
        debug!("Session retake");
    }

    // ---- downloads ----

    pub fn prepared_status(&self, id: PhotoId) -> Option<PrepareStatus> {
        self.state.lock().prepared.get(&id).copied()
    }

    pub fn is_uploading(&self) -> bool {
        self.state.lock().uploading
    }

    pub fn cloud_url(&self, key: CacheKey) -> Option<String> {
        self.state.lock().cloud_urls.get(&key).cloned()
    }

    pub fn qr_codes(&self) -> QrCodes {
        self.state.lock().qr_codes.clone()
    }

    pub fn artifact_cache(&self, id: PhotoId) -> ArtifactCache {
        let state = self.state.lock();
        ArtifactCache {
            photo_url: state.cloud_urls.get(&CacheKey::Photo(id)).cloned(),
            gif_url: state.cloud_urls.get(&CacheKey::Gif).cloned(),
            qr_codes: state.qr_codes.clone(),
        }
    }

    pub fn mark_prepared(&self, id: PhotoId, status: PrepareStatus) {
        self.state.lock().prepared.insert(id, status);
    }

    /// Claim the busy flag and start a new epoch. `None` if a preparation is running.
    pub fn begin_upload(&self) -> Option<EpochToken> {
        let mut state = self.state.lock();
        if state.uploading {
            return None;
        }
        state.uploading = true;
        Some(self.epoch.advance())
    }

    pub fn is_current(&self, token: EpochToken) -> bool {
        self.epoch.is_current(token)
    }

    /// Release the busy flag, unless a newer epoch now owns it.
    pub fn finish_upload(&self, token: EpochToken) {
        let mut state = self.state.lock();
        if self.epoch.is_current(token) {
            state.uploading = false;
        }
    }

    /// Record a failed preparation if `token` is still current.
    pub fn fail_upload(&self, token: EpochToken, id: PhotoId) -> bool {
        let mut state = self.state.lock();
        if !self.epoch.is_current(token) {
            return false;
        }
        state.prepared.insert(id, PrepareStatus::Error);
        true
    }

    /// Write URLs, QR codes and the `Ready` status in one step, if `token` is
    /// still current. Returns whether anything was written.
    pub fn commit_downloads(&self, token: EpochToken, commit: DownloadCommit) -> bool {
        let mut state = self.state.lock();
        if !self.epoch.is_current(token) {
            return false;
        }
        if let Some(url) = commit.photo_url {
            state.cloud_urls.insert(CacheKey::Photo(commit.photo_id), url);
        }
        if let Some(url) = commit.gif_url {
            state.cloud_urls.insert(CacheKey::Gif, url);
        }
        state.qr_codes = commit.qr_codes;
        state.prepared.insert(commit.photo_id, PrepareStatus::Ready);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: u8) -> EncodedImage {
        EncodedImage::new(vec![tag], "image/png")
    }

    fn ready_photo(session: &Session, tag: u8) -> PhotoId {
        let id = session.begin_capture("default", image(tag), Dimensions::new(9, 16));
        session.complete_transform(id, image(tag + 100), Dimensions::new(9, 16));
        id
    }

    #[test]
    fn test_photos_are_newest_first() {
        let session = Session::new();
        let a = ready_photo(&session, 1);
        let b = session.begin_capture("custom", image(2), Dimensions::new(9, 16));

        let photos = session.photos();
        assert_eq!(photos.iter().map(|p| p.id).collect::<Vec<_>>(), vec![b, a]);
        assert!(photos[0].is_busy);
        assert!(!photos[1].is_busy);
    }

    #[test]
    fn test_gif_source_skips_busy_photos() {
        let session = Session::new();
        let a = ready_photo(&session, 1);
        session.begin_capture("default", image(2), Dimensions::new(9, 16));

        assert_eq!(session.gif_source().map(|s| s.photo_id), Some(a));
    }

    #[test]
    fn test_failed_transform_is_not_a_gif_source() {
        let session = Session::new();
        let id = session.begin_capture("default", image(1), Dimensions::new(9, 16));
        assert!(session.fail_transform(id, "quota exceeded"));

        let photo = session.photo(id).unwrap();
        assert!(!photo.is_busy);
        assert_eq!(photo.error.as_deref(), Some("quota exceeded"));
        assert!(session.gif_source().is_none());
    }

    #[test]
    fn test_commit_gif_prunes_and_revokes() {
        let session = Session::new();
        let a = ready_photo(&session, 1);
        let b = ready_photo(&session, 2);
        let generation = session.generation();

        let first = session.commit_gif(b, generation, image(9), Dimensions::new(9, 16)).unwrap();
        assert_eq!(session.stored_ids(), vec![b]);
        assert_eq!(session.photos().len(), 1);
        assert!(session.meta(b).unwrap().gif.is_some());
        assert!(session.input(a).is_none());

        let second = session.commit_gif(b, generation, image(10), Dimensions::new(9, 16)).unwrap();
        assert_ne!(first, second);
        assert_eq!(session.gif().map(|g| g.bytes().to_vec()), Some(vec![10]));
    }

    #[test]
    fn test_commit_gif_after_reset_is_discarded() {
        let session = Session::new();
        let id = ready_photo(&session, 1);
        let generation = session.generation();
        session.reset();

        assert!(session.commit_gif(id, generation, image(9), Dimensions::new(9, 16)).is_none());
        assert!(session.gif_url().is_none());
    }

    #[test]
    fn test_stale_epoch_cannot_commit() {
        let session = Session::new();
        let id = ready_photo(&session, 1);
        let stale = session.begin_upload().unwrap();
        assert!(session.begin_upload().is_none());

        session.cancel_uploads();
        let fresh = session.begin_upload().unwrap();

        let commit = DownloadCommit {
            photo_id: id,
            photo_url: Some("http://x/stale".into()),
            gif_url: None,
            qr_codes: QrCodes::default(),
        };
        assert!(!session.commit_downloads(stale, commit.clone()));
        assert!(!session.fail_upload(stale, id));
        session.finish_upload(stale);
        assert!(session.is_uploading());

        assert!(session.commit_downloads(fresh, commit));
        assert_eq!(session.prepared_status(id), Some(PrepareStatus::Ready));
        session.finish_upload(fresh);
        assert!(!session.is_uploading());
    }

    #[test]
    fn test_retake_clears_everything() {
        let session = Session::new();
        let id = ready_photo(&session, 1);
        session.commit_gif(id, session.generation(), image(9), Dimensions::new(9, 16));
        session.mark_prepared(id, PrepareStatus::Ready);
        let token = session.begin_upload().unwrap();

        session.retake();
        assert!(!session.is_current(token));
        assert!(!session.is_uploading());
        assert!(session.photos().is_empty());
        assert!(session.stored_ids().is_empty());
        assert!(session.gif().is_none());
        assert!(session.prepared_status(id).is_none());
        assert_eq!(session.qr_codes(), QrCodes::default());
    }

    #[test]
    fn test_delete_photo_removes_entries() {
        let session = Session::new();
        let a = ready_photo(&session, 1);
        let b = ready_photo(&session, 2);

        assert!(session.delete_photo(a));
        assert!(!session.delete_photo(a));
        assert_eq!(session.stored_ids(), vec![b]);
    }
}
