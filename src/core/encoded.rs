//! Encoded images and `data:` URLs.
//!
//! Stills move through the pipeline as encoded bytes plus a MIME type; pixels
//! are decoded only by the stages that draw. Bytes sit behind an `Arc` so
//! session snapshots clone cheaply.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, RgbaImage};

use crate::error::{BoothResult, PhotoboothError};

/// A `data:<mime>;base64,<payload>` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataUrl(String);

impl DataUrl {
    /// Wrap a string that is already a base64 data URL.
    pub fn parse(value: impl Into<String>) -> BoothResult<Self> {
        let value = value.into();
        split_data_url(&value)?;
        Ok(Self(value))
    }

    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self(format!(
            "data:{};base64,{}",
            mime,
            general_purpose::STANDARD.encode(bytes)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime(&self) -> &str {
        split_data_url(&self.0).map(|(mime, _)| mime).unwrap_or("")
    }

    /// Decode the base64 payload.
    pub fn decode(&self) -> BoothResult<Vec<u8>> {
        let (_, payload) = split_data_url(&self.0)?;
        Ok(general_purpose::STANDARD.decode(payload.trim())?)
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn split_data_url(value: &str) -> BoothResult<(&str, &str)> {
    let rest = value
        .strip_prefix("data:")
        .ok_or_else(|| PhotoboothError::decode("data URL", "missing 'data:' prefix"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| PhotoboothError::decode("data URL", "missing payload separator"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| PhotoboothError::decode("data URL", "only base64 payloads are supported"))?;
    Ok((mime, payload))
}

/// Encoded image bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Arc<[u8]>,
    mime: String,
}

impl EncodedImage {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    /// Wrap bytes of unknown type, sniffing the MIME from the magic number.
    /// Unrecognized data is labelled `application/octet-stream`.
    pub fn sniff(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let mime = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Self { bytes, mime }
    }

    pub fn from_data_url(url: &DataUrl) -> BoothResult<Self> {
        Ok(Self::new(url.decode()?, url.mime()))
    }

    pub fn to_data_url(&self) -> DataUrl {
        DataUrl::from_bytes(&self.mime, &self.bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }

    /// True for formats that are re-encoded lossily (JPEG, WebP).
    pub fn is_lossy(&self) -> bool {
        matches!(
            self.mime.to_ascii_lowercase().as_str(),
            "image/jpeg" | "image/jpg" | "image/webp"
        )
    }

    /// Natural pixel size, read from the header without decoding pixels.
    pub fn natural_size(&self) -> BoothResult<(u32, u32)> {
        let reader = ImageReader::new(Cursor::new(self.bytes()))
            .with_guessed_format()
            .map_err(|e| PhotoboothError::io("sniff image format", e))?;
        Ok(reader.into_dimensions()?)
    }

    pub fn decode(&self) -> BoothResult<RgbaImage> {
        Ok(image::load_from_memory(self.bytes())?.to_rgba8())
    }

    pub fn encode_png(image: &RgbaImage) -> BoothResult<Self> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)
            .map_err(|e| PhotoboothError::encode("PNG", e.to_string()))?;
        Ok(Self::new(buf, "image/png"))
    }

    /// JPEG has no alpha channel; pixels are flattened to RGB first.
    pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> BoothResult<Self> {
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality)
            .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .map_err(|e| PhotoboothError::encode("JPEG", e.to_string()))?;
        Ok(Self::new(buf, "image/jpeg"))
    }

    pub fn encode_webp(image: &RgbaImage) -> BoothResult<Self> {
        let mut buf = Vec::new();
        WebPEncoder::new_lossless(&mut buf)
            .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)
            .map_err(|e| PhotoboothError::encode("WebP", e.to_string()))?;
        Ok(Self::new(buf, "image/webp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_pixel(6, 4, Rgba([200, 10, 10, 255]))
    }

    #[test]
    fn test_data_url_roundtrip() {
        let png = EncodedImage::encode_png(&sample()).unwrap();
        let url = png.to_data_url();
        assert!(url.as_str().starts_with("data:image/png;base64,"));
        assert_eq!(url.mime(), "image/png");

        let back = EncodedImage::from_data_url(&url).unwrap();
        assert_eq!(back, png);
        assert_eq!(back.natural_size().unwrap(), (6, 4));
    }

    #[test]
    fn test_data_url_rejects_garbage() {
        assert!(DataUrl::parse("https://example.com/a.png").is_err());
        assert!(DataUrl::parse("data:image/png,plain").is_err());
        assert!(DataUrl::parse("data:image/png;base64,AAAA").is_ok());
    }

    #[test]
    fn test_jpeg_encode_drops_alpha() {
        let jpeg = EncodedImage::encode_jpeg(&sample(), 95).unwrap();
        assert_eq!(jpeg.mime(), "image/jpeg");
        assert_eq!(jpeg.extension(), "jpg");
        assert!(jpeg.is_lossy());
        assert_eq!(jpeg.decode().unwrap().dimensions(), (6, 4));
    }

    #[test]
    fn test_sniff_detects_png() {
        let png = EncodedImage::encode_png(&sample()).unwrap();
        let sniffed = EncodedImage::sniff(png.bytes().to_vec());
        assert_eq!(sniffed.mime(), "image/png");

        let unknown = EncodedImage::sniff(vec![0u8, 1, 2]);
        assert_eq!(unknown.mime(), "application/octet-stream");
        assert!(unknown.natural_size().is_err());
    }
}
