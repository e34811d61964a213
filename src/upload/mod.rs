//! # Upload Module
//!
//! Turns finished artifacts into shareable links: uploads through an
//! [`Uploader`], QR codes through a [`QrEncoder`], and the
//! [`UploadCoordinator`] state machine that prepares both for the kiosk's
//! download and print screens.
//!
//! ## Components
//!
//! - `client`: [`HttpUploader`], multipart `POST /api/upload`
//! - `storage`: [`LocalStorage`], the server side of that endpoint (disk layout,
//!   upload watermarking, public URLs)
//! - `qr`: [`QrCodeEncoder`], PNG data URLs via the `qrcode` crate
//! - `coordinator`: token-guarded, idempotent download preparation

pub mod client;
pub mod coordinator;
pub mod qr;
pub mod storage;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::{DataUrl, EncodedImage};
use crate::error::BoothResult;
use crate::processing::WatermarkPosition;

pub use client::HttpUploader;
pub use coordinator::{PrepareOptions, UploadCoordinator};
pub use qr::QrCodeEncoder;
pub use storage::{LocalStorage, WatermarkAssets};

/// Which watermark asset an upload should carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatermarkVariant {
    /// White mark, for dark photos (`putih`).
    #[default]
    White,
    /// Black mark, for light photos (`hitam`).
    Black,
    /// The booth's base asset.
    Default,
}

impl WatermarkVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "putih",
            Self::Black => "hitam",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for WatermarkVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatermarkVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "putih" | "white" => Ok(Self::White),
            "hitam" | "black" => Ok(Self::Black),
            "default" | "" => Ok(Self::Default),
            other => Err(format!("unknown watermark variant '{}'", other)),
        }
    }
}

/// Watermark settings forwarded with an upload. `None` lets the server decide.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WatermarkOptions {
    pub position: Option<WatermarkPosition>,
    pub variant: Option<WatermarkVariant>,
    pub scale: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub image: EncodedImage,
    pub filename: String,
    pub watermark: WatermarkOptions,
}

/// Reply of the upload endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    pub direct_link: Option<String>,
    pub download_url: Option<String>,
    pub qr_code: Option<String>,
    pub filename: Option<String>,
}

impl UploadResponse {
    /// The public link, if the upload counts as successful.
    pub fn link(&self) -> Option<&str> {
        self.direct_link
            .as_deref()
            .filter(|link| self.success && !link.is_empty())
    }

    /// The server-rendered QR code, if it is a usable data URL.
    pub fn qr(&self) -> Option<DataUrl> {
        self.qr_code.clone().and_then(|qr| DataUrl::parse(qr).ok())
    }
}

/// Upload collaborator.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> BoothResult<UploadResponse>;
}

/// Rendering options for QR codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrOptions {
    /// Target image width in pixels.
    pub width: u32,
    /// Quiet zone in modules.
    pub margin: u32,
    pub dark: String,
    pub light: String,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            width: 300,
            margin: 2,
            dark: "#000000".to_string(),
            light: "#FFFFFF".to_string(),
        }
    }
}

/// QR code collaborator.
#[async_trait]
pub trait QrEncoder: Send + Sync {
    async fn encode(&self, text: &str, options: &QrOptions) -> BoothResult<DataUrl>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_link_requires_success() {
        let json = r#"{"success":true,"directLink":"http://booth/uploads/img/a.jpg","qrCode":"data:image/png;base64,AAAA"}"#;
        let response: UploadResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.link(), Some("http://booth/uploads/img/a.jpg"));
        assert!(response.qr().is_some());

        let response: UploadResponse =
            serde_json::from_str(r#"{"success":false,"directLink":"http://x"}"#).unwrap();
        assert_eq!(response.link(), None);

        let response: UploadResponse = serde_json::from_str(r#"{"error":"No file uploaded"}"#).unwrap();
        assert_eq!(response.link(), None);
        assert_eq!(response.qr(), None);
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("putih".parse::<WatermarkVariant>(), Ok(WatermarkVariant::White));
        assert_eq!("HITAM".parse::<WatermarkVariant>(), Ok(WatermarkVariant::Black));
        assert_eq!("".parse::<WatermarkVariant>(), Ok(WatermarkVariant::Default));
        assert!("green".parse::<WatermarkVariant>().is_err());
    }
}
