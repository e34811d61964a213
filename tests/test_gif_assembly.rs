//! Before/after GIF assembly against a live session.

mod common;

use std::io::Cursor;
use std::sync::Arc;

use common::fixtures::{booth, gradient_frame, snap};
use common::mocks::{MockQrEncoder, MockTransformer, MockUploader};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, Rgba, RgbaImage};
use photobooth::booth::{Photobooth, SnapRequest};
use photobooth::core::{Dimensions, EncodedImage};
use photobooth::processing::FileWatermark;

#[tokio::test]
async fn test_no_ready_photo_leaves_store_untouched() {
    let test = booth();
    let session = test.booth.session();
    let still = EncodedImage::encode_png(&RgbaImage::from_pixel(9, 16, Rgba([10, 10, 10, 255]))).unwrap();
    let busy = session.begin_capture("default", still, Dimensions::new(9, 16));

    assert!(test.booth.make_gif().await.is_none());
    assert!(session.gif_url().is_none());
    assert_eq!(session.stored_ids(), vec![busy]);
    assert_eq!(session.photos().len(), 1);
}

#[tokio::test]
async fn test_gif_prunes_session_to_newest_photo() {
    let test = booth();
    snap(&test).await;
    snap(&test).await;
    let newest = snap(&test).await;

    let url = test.booth.make_gif().await.expect("GIF for the newest photo");
    assert!(url.as_str().starts_with("blob:"));

    let session = test.booth.session();
    assert_eq!(session.stored_ids(), vec![newest]);
    let photos = session.photos();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].id, newest);
    assert!(session.is_gif_visible());

    let gif_meta = session.meta(newest).and_then(|meta| meta.gif).unwrap();
    assert_eq!((gif_meta.width, gif_meta.height), (180, 320));
}

#[tokio::test]
async fn test_gif_frames_and_timing() {
    let test = booth();
    snap(&test).await;
    test.booth.make_gif().await.unwrap();

    let gif = test.booth.session().gif().unwrap();
    assert_eq!(gif.mime(), "image/gif");

    let decoder = GifDecoder::new(Cursor::new(gif.bytes().to_vec())).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 2);

    for frame in &frames {
        assert_eq!(frame.buffer().dimensions(), (180, 320));
    }
    let delays: Vec<u32> = frames
        .iter()
        .map(|f| {
            let (numer, denom) = f.delay().numer_denom_ms();
            numer / denom
        })
        .collect();
    assert_eq!(delays, vec![330, 830]);
}

#[tokio::test]
async fn test_concurrent_assembly_yields_one_gif() {
    let test = booth();
    snap(&test).await;

    let (a, b) = tokio::join!(test.booth.make_gif(), test.booth.make_gif());
    assert_eq!(
        a.is_some() as u8 + b.is_some() as u8,
        1,
        "exactly one of two overlapping calls assembles"
    );
    assert!(test.booth.session().gif_url().is_some());
}

#[tokio::test]
async fn test_newer_gif_replaces_previous() {
    let test = booth();
    snap(&test).await;
    let first = test.booth.make_gif().await.unwrap();

    let id = snap(&test).await;
    let second = test.booth.make_gif().await.unwrap();

    let session = test.booth.session();
    assert_ne!(first, second);
    assert_eq!(session.gif_url(), Some(second));
    assert_eq!(session.stored_ids(), vec![id]);
}

#[tokio::test]
async fn test_reset_discards_stale_gif() {
    let test = booth();
    let id = snap(&test).await;
    let session = test.booth.session();

    let source = session.gif_source().unwrap();
    assert_eq!(source.photo_id, id);
    session.reset();

    let gif = EncodedImage::new(vec![0x47, 0x49, 0x46], "image/gif");
    assert!(session.commit_gif(id, source.generation, gif, Dimensions::new(9, 16)).is_none());
    assert!(session.gif_url().is_none());
    assert!(session.stored_ids().is_empty());
}

#[tokio::test]
async fn test_missing_watermark_does_not_block_gif() {
    let booth = Photobooth::builder()
        .with_transformer(MockTransformer::new(32))
        .with_uploader(MockUploader::new())
        .with_qr_encoder(MockQrEncoder::new())
        .with_watermark(Arc::new(FileWatermark::new("/nonexistent/watermark.png")))
        .build()
        .unwrap();

    booth
        .snap_frame(gradient_frame(320, 180), true, SnapRequest::new("default", "Comic"))
        .await
        .unwrap();
    assert!(booth.make_gif().await.is_some());
}
