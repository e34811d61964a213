//! # Processing Module
//!
//! Image processing stages of the booth: reconciling AI output to the capture
//! size, compositing the watermark, rendering previews and assembling the GIF.

pub mod gif;
pub mod preview;
pub mod reconcile;
pub mod render;
pub mod watermark;

// Re-export commonly used types for convenience
pub use gif::{GIF_MAX_LONG_SIDE, GifAssembler};
pub use preview::watermarked_preview;
pub use reconcile::{Reconciled, reconcile};
pub use watermark::{
    FileWatermark, StaticWatermark, WatermarkCompositor, WatermarkPlacement, WatermarkPosition,
    WatermarkSource,
};
