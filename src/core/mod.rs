//! # Core Types Module
//!
//! Value types shared by every stage of the pipeline: pixel dimensions and
//! capture metadata, encoded images and data URLs, the session-scoped blob URL
//! registry and the upload epoch used to discard superseded work.

pub mod blob;
pub mod dimensions;
pub mod encoded;
pub mod epoch;

pub use blob::{BlobRegistry, BlobUrl};
pub use dimensions::{Dimensions, ImageMeta, Orientation};
pub use encoded::{DataUrl, EncodedImage};
pub use epoch::{EpochToken, UploadEpoch};
