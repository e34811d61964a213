//! Download preparation: preconditions, caching, fallbacks and supersession.

mod common;

use std::sync::Arc;

use common::fixtures::{TestBooth, booth, booth_with, snap};
use common::mocks::{MockTransformer, MockUploader, qr_text};
use image::{Rgba, RgbaImage};
use photobooth::core::{Dimensions, EncodedImage};
use photobooth::session::{CacheKey, PrepareStatus};
use photobooth::upload::PrepareOptions;

#[tokio::test]
async fn test_prepare_without_photo_id() {
    let test = booth();
    snap(&test).await;

    assert!(!test.booth.prepare_downloads(None, PrepareOptions::default()).await);
    assert_eq!(test.uploader.calls(), 0);
}

#[tokio::test]
async fn test_prepare_uploads_photo_and_gif() {
    let test = booth();
    let id = snap(&test).await;

    assert!(test.booth.prepare_downloads(Some(id), PrepareOptions::default()).await);

    let session = test.booth.session();
    assert_eq!(session.prepared_status(id), Some(PrepareStatus::Ready));
    assert!(!session.is_uploading());
    assert!(session.gif_url().is_some(), "preparation assembles a missing GIF");

    let filenames = test.uploader.filenames();
    assert_eq!(filenames.len(), 2);
    assert!(filenames[0].starts_with("photobooth-foto-"));
    assert!(filenames[1].starts_with("photobooth-gif-"));
    assert!(filenames[1].ends_with(".gif"));

    let photo_url = session.cloud_url(CacheKey::Photo(id)).unwrap();
    let gif_url = session.cloud_url(CacheKey::Gif).unwrap();
    assert_eq!(photo_url, format!("https://cdn.test/1/{}", filenames[0]));
    assert_eq!(gif_url, format!("https://cdn.test/2/{}", filenames[1]));

    let qr = session.qr_codes();
    assert_eq!(qr_text(qr.photo.as_ref().unwrap()), photo_url);
    assert_eq!(qr_text(qr.gif.as_ref().unwrap()), gif_url);
}

#[tokio::test]
async fn test_ready_photo_skips_network() {
    let test = booth();
    let id = snap(&test).await;
    assert!(test.booth.prepare_downloads(Some(id), PrepareOptions::default()).await);
    let uploads = test.uploader.calls();
    let codes = test.qr.calls();

    assert!(test.booth.prepare_downloads(Some(id), PrepareOptions::default()).await);
    assert!(test.booth.prepare_downloads(Some(id), PrepareOptions::default()).await);

    assert_eq!(test.uploader.calls(), uploads);
    assert_eq!(test.qr.calls(), codes);
}

#[tokio::test]
async fn test_forced_prepare_reuses_cached_artifacts() {
    let test = booth();
    let id = snap(&test).await;
    assert!(test.booth.prepare_downloads(Some(id), PrepareOptions::default()).await);
    assert_eq!(test.uploader.calls(), 2);
    let session = test.booth.session();
    let photo_url = session.cloud_url(CacheKey::Photo(id)).unwrap();
    let codes = test.qr.calls();

    assert!(test.booth.prepare_downloads(Some(id), PrepareOptions::forced()).await);

    assert_eq!(test.uploader.calls(), 2);
    assert_eq!(test.qr.calls(), codes);
    assert_eq!(session.cloud_url(CacheKey::Photo(id)), Some(photo_url));
    assert_eq!(session.prepared_status(id), Some(PrepareStatus::Ready));
}

#[tokio::test]
async fn test_forced_prepare_uploads_only_missing_photo() {
    let test = booth();
    let first = snap(&test).await;
    assert!(test.booth.prepare_downloads(Some(first), PrepareOptions::default()).await);
    let session = test.booth.session();
    let gif_url = session.cloud_url(CacheKey::Gif).unwrap();

    // A new still has no link of its own; the GIF pair stays cached.
    let second = snap(&test).await;
    assert!(session.cloud_url(CacheKey::Photo(second)).is_none());

    assert!(test.booth.prepare_downloads(Some(second), PrepareOptions::forced()).await);

    let filenames = test.uploader.filenames();
    assert_eq!(filenames.len(), 3);
    assert!(filenames[2].starts_with("photobooth-foto-"));
    assert_eq!(session.cloud_url(CacheKey::Gif), Some(gif_url));
    let photo_url = session.cloud_url(CacheKey::Photo(second)).unwrap();
    assert_eq!(photo_url, format!("https://cdn.test/3/{}", filenames[2]));
    assert_eq!(qr_text(session.qr_codes().photo.as_ref().unwrap()), photo_url);
}

#[tokio::test]
async fn test_failed_upload_falls_back_to_local_urls() {
    let test = booth();
    let id = snap(&test).await;
    test.uploader.set_failing(true);

    assert!(test.booth.prepare_downloads(Some(id), PrepareOptions::default()).await);

    let session = test.booth.session();
    assert_eq!(session.prepared_status(id), Some(PrepareStatus::Ready));

    let qr = session.qr_codes();
    let photo_text = qr_text(qr.photo.as_ref().unwrap());
    let gif_text = qr_text(qr.gif.as_ref().unwrap());
    assert!(photo_text.starts_with("data:image/"));
    assert_eq!(photo_text, session.output(id).unwrap().to_data_url().as_str());
    assert_eq!(gif_text, session.gif_url().unwrap().as_str());
    assert_eq!(session.cloud_url(CacheKey::Gif), Some(gif_text));
}

#[tokio::test]
async fn test_failed_fallback_marks_error() {
    let test = booth();
    let id = snap(&test).await;
    test.uploader.set_failing(true);
    test.qr.set_failing(true);

    assert!(!test.booth.prepare_downloads(Some(id), PrepareOptions::default()).await);

    let session = test.booth.session();
    assert_eq!(session.prepared_status(id), Some(PrepareStatus::Error));
    assert!(!session.is_uploading());
    assert!(!session.qr_codes().is_complete());

    // The error sticks until a forced retry.
    let uploads = test.uploader.calls();
    assert!(!test.booth.prepare_downloads(Some(id), PrepareOptions::default()).await);
    assert_eq!(test.uploader.calls(), uploads);

    test.uploader.set_failing(false);
    test.qr.set_failing(false);
    assert!(test.booth.prepare_downloads(Some(id), PrepareOptions::forced()).await);
    assert_eq!(session.prepared_status(id), Some(PrepareStatus::Ready));
}

#[tokio::test]
async fn test_busy_photo_is_not_prepared() {
    let test = booth();
    let session = test.booth.session();
    let still = EncodedImage::encode_png(&RgbaImage::from_pixel(9, 16, Rgba([0, 0, 0, 255]))).unwrap();
    let id = session.begin_capture("default", still, Dimensions::new(9, 16));

    assert!(!test.booth.prepare_downloads(Some(id), PrepareOptions::forced()).await);
    assert_eq!(test.uploader.calls(), 0);
    assert_eq!(session.prepared_status(id), None);
}

#[tokio::test]
async fn test_photo_without_output_is_not_prepared() {
    let test = booth_with(MockTransformer::failing(), MockUploader::new());
    let id = snap(&test).await;

    let photo = test.booth.session().photo(id).unwrap();
    assert!(!photo.is_busy);
    assert!(photo.error.is_some());

    assert!(!test.booth.prepare_downloads(Some(id), PrepareOptions::default()).await);
    assert_eq!(test.uploader.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_prepare_is_rejected() {
    let test = Arc::new(booth_with(MockTransformer::new(64), MockUploader::gated()));
    let id = snap(&test).await;

    let first = spawn_prepare(&test, id, PrepareOptions::default());
    test.uploader.wait_entered().await;
    assert!(test.booth.session().is_uploading());

    assert!(!test.booth.prepare_downloads(Some(id), PrepareOptions::default()).await);

    test.uploader.release();
    assert!(first.await.unwrap());
    assert_eq!(test.uploader.calls(), 2);
}

#[tokio::test]
async fn test_superseded_prepare_writes_nothing() {
    let test = Arc::new(booth_with(MockTransformer::new(64), MockUploader::gated()));
    let id = snap(&test).await;

    let first = spawn_prepare(&test, id, PrepareOptions::default());
    test.uploader.wait_entered().await;

    test.booth.cancel_preparation();
    assert!(test.booth.prepare_downloads(Some(id), PrepareOptions::forced()).await);

    let session = test.booth.session();
    let committed_photo = session.cloud_url(CacheKey::Photo(id)).unwrap();
    let committed_gif = session.cloud_url(CacheKey::Gif).unwrap();
    let committed_qr = session.qr_codes();
    assert!(committed_photo.starts_with("https://cdn.test/2/"));
    assert!(committed_gif.starts_with("https://cdn.test/3/"));

    test.uploader.release();
    assert!(!first.await.unwrap());

    // The stale run stopped after its first upload and left the newer results alone.
    assert_eq!(test.uploader.calls(), 3);
    assert_eq!(session.cloud_url(CacheKey::Photo(id)), Some(committed_photo));
    assert_eq!(session.cloud_url(CacheKey::Gif), Some(committed_gif));
    assert_eq!(session.qr_codes(), committed_qr);
    assert_eq!(session.prepared_status(id), Some(PrepareStatus::Ready));
    assert!(!session.is_uploading());
}

#[tokio::test]
async fn test_retake_discards_running_prepare() {
    let test = Arc::new(booth_with(MockTransformer::new(64), MockUploader::gated()));
    let id = snap(&test).await;

    let first = spawn_prepare(&test, id, PrepareOptions::default());
    test.uploader.wait_entered().await;

    test.booth.retake();
    test.uploader.release();
    assert!(!first.await.unwrap());

    let session = test.booth.session();
    assert!(session.photos().is_empty());
    assert_eq!(session.prepared_status(id), None);
    assert_eq!(session.cloud_url(CacheKey::Photo(id)), None);
    assert_eq!(session.cloud_url(CacheKey::Gif), None);
    assert!(!session.qr_codes().is_complete());
    assert!(!session.is_uploading());
}

fn spawn_prepare(
    test: &Arc<TestBooth>,
    id: photobooth::PhotoId,
    options: PrepareOptions,
) -> tokio::task::JoinHandle<bool> {
    let test = Arc::clone(test);
    tokio::spawn(async move { test.booth.prepare_downloads(Some(id), options).await })
}
