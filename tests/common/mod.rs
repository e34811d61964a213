//! Common test utilities and helpers for the photobooth tests
//!
//! Mock collaborators stand in for the AI transform, the upload server and
//! the QR renderer so the pipeline can run without a network.

#![allow(dead_code)]

/// Mock collaborators with call counters
pub mod mocks {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use parking_lot::Mutex;
    use photobooth::core::{DataUrl, EncodedImage};
    use photobooth::error::{BoothResult, PhotoboothError};
    use photobooth::transform::{ImageTransformer, TransformRequest};
    use photobooth::upload::{QrEncoder, QrOptions, UploadRequest, UploadResponse, Uploader};
    use tokio::sync::Notify;

    /// AI transform returning a solid square, or failing on demand.
    pub struct MockTransformer {
        side: u32,
        fail: AtomicBool,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl MockTransformer {
        /// Transformer whose outputs are `side` x `side` PNGs.
        pub fn new(side: u32) -> Arc<Self> {
            Arc::new(Self {
                side,
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn failing() -> Arc<Self> {
            let transformer = Self::new(8);
            transformer.fail.store(true, Ordering::SeqCst);
            transformer
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().clone()
        }
    }

    #[async_trait]
    impl ImageTransformer for MockTransformer {
        async fn transform(&self, request: TransformRequest) -> BoothResult<EncodedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().push(request.prompt);
            if self.fail.load(Ordering::SeqCst) {
                return Err(PhotoboothError::transform(Some(500), "model overloaded"));
            }
            let image = RgbaImage::from_pixel(self.side, self.side, Rgba([40, 200, 120, 255]));
            EncodedImage::encode_png(&image)
        }
    }

    /// Upload server double.
    ///
    /// Links are numbered in call order. A gate holds the first upload until
    /// [`MockUploader::release`] is called.
    pub struct MockUploader {
        calls: AtomicUsize,
        fail: AtomicBool,
        filenames: Mutex<Vec<String>>,
        gate: Mutex<Option<Arc<Notify>>>,
        entered: Notify,
    }

    impl MockUploader {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                filenames: Mutex::new(Vec::new()),
                gate: Mutex::new(None),
                entered: Notify::new(),
            })
        }

        /// Uploader whose first call blocks until released.
        pub fn gated() -> Arc<Self> {
            let uploader = Self::new();
            *uploader.gate.lock() = Some(Arc::new(Notify::new()));
            uploader
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn filenames(&self) -> Vec<String> {
            self.filenames.lock().clone()
        }

        /// Wait until the gated upload has started.
        pub async fn wait_entered(&self) {
            self.entered.notified().await;
        }

        pub fn release(&self) {
            if let Some(gate) = self.gate.lock().as_ref() {
                gate.notify_one();
            }
        }
    }

    #[async_trait]
    impl Uploader for MockUploader {
        async fn upload(&self, request: UploadRequest) -> BoothResult<UploadResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.filenames.lock().push(request.filename.clone());

            let gate = if n == 1 { self.gate.lock().clone() } else { None };
            if let Some(gate) = gate {
                self.entered.notify_one();
                gate.notified().await;
            }

            if self.fail.load(Ordering::SeqCst) {
                return Err(PhotoboothError::upload(&request.filename, Some(503), "server unavailable"));
            }
            Ok(UploadResponse {
                success: true,
                direct_link: Some(format!("https://cdn.test/{}/{}", n, request.filename)),
                download_url: None,
                qr_code: None,
                filename: Some(request.filename),
            })
        }
    }

    /// QR encoder embedding the encoded text, so tests can read it back.
    pub struct MockQrEncoder {
        calls: AtomicUsize,
        fail: AtomicBool,
        texts: Mutex<Vec<String>>,
    }

    impl MockQrEncoder {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                texts: Mutex::new(Vec::new()),
            })
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn texts(&self) -> Vec<String> {
            self.texts.lock().clone()
        }
    }

    #[async_trait]
    impl QrEncoder for MockQrEncoder {
        async fn encode(&self, text: &str, _options: &QrOptions) -> BoothResult<DataUrl> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts.lock().push(text.to_string());
            if self.fail.load(Ordering::SeqCst) {
                return Err(PhotoboothError::qr("data too long"));
            }
            Ok(DataUrl::from_bytes("text/plain", text.as_bytes()))
        }
    }

    /// Text a [`MockQrEncoder`] code was generated from.
    pub fn qr_text(qr: &DataUrl) -> String {
        String::from_utf8(qr.decode().unwrap()).unwrap()
    }
}

/// Frames, watermark and booth setup
pub mod fixtures {
    use std::sync::Arc;

    use image::{Rgba, RgbaImage};
    use photobooth::booth::{Photobooth, SnapRequest};
    use photobooth::capture::RawFrame;
    use photobooth::processing::StaticWatermark;
    use photobooth::session::PhotoId;

    use super::mocks::{MockQrEncoder, MockTransformer, MockUploader};

    /// Horizontal gradient frame, so crops and flips are observable.
    pub fn gradient_frame(width: u32, height: u32) -> RawFrame {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            Rgba([r, g, 96, 255])
        });
        RawFrame::from_image(image).unwrap()
    }

    /// Small opaque white mark.
    pub fn watermark() -> Arc<StaticWatermark> {
        Arc::new(StaticWatermark::new(RgbaImage::from_pixel(20, 8, Rgba([255, 255, 255, 255]))))
    }

    pub struct TestBooth {
        pub booth: Photobooth,
        pub transformer: Arc<MockTransformer>,
        pub uploader: Arc<MockUploader>,
        pub qr: Arc<MockQrEncoder>,
    }

    pub fn booth_with(transformer: Arc<MockTransformer>, uploader: Arc<MockUploader>) -> TestBooth {
        let qr = MockQrEncoder::new();
        let booth = Photobooth::builder()
            .with_transformer(transformer.clone())
            .with_uploader(uploader.clone())
            .with_qr_encoder(qr.clone())
            .with_watermark(watermark())
            .build()
            .unwrap();
        TestBooth {
            booth,
            transformer,
            uploader,
            qr,
        }
    }

    /// Booth with a 64px square transformer and an ungated uploader.
    pub fn booth() -> TestBooth {
        booth_with(MockTransformer::new(64), MockUploader::new())
    }

    /// Snap a 320x180 frame rotated into a 180x320 portrait still.
    pub async fn snap(test: &TestBooth) -> PhotoId {
        test.booth
            .snap_frame(gradient_frame(320, 180), true, SnapRequest::new("default", "Make it a comic"))
            .await
            .unwrap()
    }
}
