//! # Photobooth Media Pipeline
//!
//! The media pipeline of a kiosk photobooth: capture a portrait or landscape
//! still, restyle it through an external AI image service, composite the
//! booth's watermark, assemble a before/after GIF, and publish both artifacts
//! as download links with QR codes.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `capture`: Normalizes raw camera frames into fixed-aspect stills
//! - `processing`: Output reconciliation, watermarking, previews and GIF assembly
//! - `transform`: The AI image transform collaborator
//! - `upload`: Upload and QR collaborators, local storage and download preparation
//! - `session`: The shared session context
//! - `booth`: The high-level [`Photobooth`] facade
//! - `core`: Value types shared by every stage
//! - `config`: Configuration management and validation
//!
//! Pure geometry and CPU scaling live in the `booth_scale` crate.
//!
//! ## Features
//!
//! - **Orientation independent**: any camera frame becomes an exact 9:16 or 16:9 still
//! - **Size faithful**: AI output is fitted back onto the capture's pixel size
//! - **Race free**: download preparation is token-guarded and idempotent under
//!   rapid retakes and repeated prints
//! - **Async/await**: Built on Tokio; pixel work runs on the blocking pool
//!
//! ## Example
//!
//! ```rust
//! use booth_scale::geometry::{CaptureOptions, resolve};
//!
//! let geometry = resolve(1280.0, 720.0, CaptureOptions { portrait: true, rotate: true });
//! assert_eq!((geometry.canvas_width, geometry.canvas_height), (720, 1280));
//! ```

pub mod booth;
pub mod capture;
pub mod config;
pub mod core;
pub mod error;
pub mod processing;
pub mod session;
pub mod transform;
pub mod upload;

/// Re-export error types for convenience
pub use error::{BoothResult, PhotoboothError, Retryable};

pub use booth::{Photobooth, PhotoboothBuilder, SnapRequest};
pub use session::{PhotoId, PrepareStatus, Session};
