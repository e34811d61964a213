//! QR code rendering.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use qrcode::{Color, QrCode};

use super::{QrEncoder, QrOptions};
use crate::core::{DataUrl, EncodedImage};
use crate::error::{BoothResult, PhotoboothError};

/// [`QrEncoder`] rendering PNG data URLs with the `qrcode` crate.
///
/// Modules are drawn at the largest whole-pixel scale that fits the requested
/// width (at least 1px), centered on a light canvas of that width.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeEncoder;

impl QrCodeEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Render `text` to pixels.
    pub fn render(text: &str, options: &QrOptions) -> BoothResult<RgbaImage> {
        let code = QrCode::new(text.as_bytes()).map_err(|e| PhotoboothError::qr(e.to_string()))?;
        let dark = parse_hex_color(&options.dark)?;
        let light = parse_hex_color(&options.light)?;

        let modules = code.width() as u32;
        let span = modules + 2 * options.margin;
        let scale = (options.width / span).max(1);
        let side = options.width.max(span * scale);
        let offset = (side - modules * scale) / 2;

        let mut canvas = RgbaImage::from_pixel(side, side, light);
        for (index, color) in code.to_colors().into_iter().enumerate() {
            if color != Color::Dark {
                continue;
            }
            let mx = index as u32 % modules;
            let my = index as u32 / modules;
            for dy in 0..scale {
                for dx in 0..scale {
                    canvas.put_pixel(offset + mx * scale + dx, offset + my * scale + dy, dark);
                }
            }
        }
        Ok(canvas)
    }
}

#[async_trait]
impl QrEncoder for QrCodeEncoder {
    async fn encode(&self, text: &str, options: &QrOptions) -> BoothResult<DataUrl> {
        let image = Self::render(text, options)?;
        Ok(EncodedImage::encode_png(&image)?.to_data_url())
    }
}

/// Parse `#RRGGBB` or `#RRGGBBAA`.
fn parse_hex_color(value: &str) -> BoothResult<Rgba<u8>> {
    let hex = value.trim().trim_start_matches('#');
    let invalid = || PhotoboothError::qr(format!("invalid color '{}'", value));
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if hex.len() == 8 { channel(6)? } else { 0xff };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}
