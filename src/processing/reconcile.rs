//! # Output Reconciliation
//!
//! Generative models rarely return an image at the size they were given. The
//! reconciler forces the AI output back onto the capture's pixel dimensions so
//! that the still and the GIF frames line up.
//!
//! ## Rules
//!
//! - Undecodable output is passed through untouched with the target meta (or a
//!   1×1 placeholder); reconciliation never fails
//! - An invalid target falls back to the output's own natural size
//! - Output already at the target size is passed through without re-encoding
//! - Anything else is fitted inside the target, centered on `#0b1120` and
//!   re-encoded as PNG
//!
//! Reconciling an already reconciled image against the same target returns it
//! unchanged.

use booth_scale::presets::Size;
use tracing::{debug, warn};

use super::render::{BACKGROUND_RGBA, render_into};
use crate::core::{Dimensions, EncodedImage};
use crate::error::BoothResult;

/// Result of reconciling an AI output: the image to store and its actual size.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub image: EncodedImage,
    pub meta: Dimensions,
}

/// Fit `output` onto `target`'s pixel size.
///
/// This is CPU bound; async callers should run it on the blocking pool.
pub fn reconcile(output: &EncodedImage, target: Option<&Dimensions>) -> Reconciled {
    let target = target.filter(|t| t.is_valid()).copied();

    let (natural_width, natural_height) = match output.natural_size() {
        Ok(size) => size,
        Err(e) => {
            warn!(error = %e, "AI output could not be decoded; keeping it as-is");
            return Reconciled {
                image: output.clone(),
                meta: target.unwrap_or_else(Dimensions::fallback),
            };
        }
    };

    let natural = Dimensions::new(natural_width, natural_height);
    let target = target.unwrap_or(natural);
    if natural.width == target.width && natural.height == target.height {
        return Reconciled {
            image: output.clone(),
            meta: natural,
        };
    }

    match redraw(output, target) {
        Ok(image) => {
            debug!(
                from_width = natural.width,
                from_height = natural.height,
                to_width = target.width,
                to_height = target.height,
                "Reconciled AI output to capture size"
            );
            Reconciled {
                image,
                meta: Dimensions::new(target.width, target.height),
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to redraw AI output; keeping it as-is");
            Reconciled {
                image: output.clone(),
                meta: natural,
            }
        }
    }
}

fn redraw(output: &EncodedImage, target: Dimensions) -> BoothResult<EncodedImage> {
    let pixels = output.decode()?;
    let canvas = render_into(&pixels, Size::new(target.width, target.height), BACKGROUND_RGBA)?;
    EncodedImage::encode_png(&canvas)
}
