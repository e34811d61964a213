//! # Error Handling
//!
//! Error types for the photobooth pipeline, featuring per-category variants,
//! classification traits and rich error context.
//!
//! ## Architecture
//!
//! - **Error Types**: one enum, [`PhotoboothError`], with a variant per failure domain
//!   (decode, encode, transform, upload, QR, storage, ...)
//! - **Error Context**: timestamp, free-form context and a recovery suggestion
//! - **Error Traits**: `Retryable` for callers that decide whether to present
//!   a retry prompt
//!
//! Most of the pipeline never surfaces these to the kiosk user: collaborator
//! failures are recovered locally (QR fallback, unwatermarked render) and
//! superseded work resolves to `false`/`None`. Errors reach the caller only when
//! no safe default exists.
//!
//! ## Usage
//!
//! ```rust
//! use photobooth::error::{PhotoboothError, Retryable};
//!
//! let error = PhotoboothError::upload("/api/upload", Some(502), "bad gateway")
//!     .with_context("uploading GIF")
//!     .with_recovery_suggestion("Check that the upload server is reachable");
//!
//! assert!(error.is_retryable());
//! assert_eq!(error.retry_delay_ms(), Some(1000));
//! assert_eq!(error.category(), "upload");
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

use booth_scale::cpu::ScaleError;

/// Core error context containing metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            context: None,
            recovery_suggestion: None,
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }
}

/// Base error type for the photobooth library
#[derive(Debug)]
pub enum PhotoboothError {
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// An encoded image or data URL could not be decoded
    Decode {
        what: String,
        reason: String,
        context: ErrorContext,
    },
    /// Pixels could not be encoded (PNG/JPEG/GIF)
    Encode {
        format: String,
        reason: String,
        context: ErrorContext,
    },
    /// Resize / render pipeline errors
    Processing {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// The AI transform collaborator rejected or failed the request
    Transform {
        status: Option<u16>,
        reason: String,
        context: ErrorContext,
    },
    /// The upload collaborator rejected or failed the request
    Upload {
        target: String,
        status: Option<u16>,
        reason: String,
        context: ErrorContext,
    },
    /// QR generation failed
    Qr {
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors (local storage, watermark asset)
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// Network errors
    Network {
        operation: String,
        address: Option<String>,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
    /// State errors (operation not valid for the current session state)
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
        context: ErrorContext,
    },
}

impl PhotoboothError {
    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a decode error
    pub fn decode(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an encode error
    pub fn encode(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encode {
            format: format.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a processing error
    pub fn processing(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Processing {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an AI transform error
    pub fn transform(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Transform {
            status,
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an upload error
    pub fn upload(target: impl Into<String>, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Upload {
            target: target.into(),
            status,
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a QR generation error
    pub fn qr(reason: impl Into<String>) -> Self {
        Self::Qr {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error bound to a path
    pub fn io_at(
        operation: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.as_ref().display().to_string()),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Create a state error
    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add a recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::Decode { context, .. }
            | Self::Encode { context, .. }
            | Self::Processing { context, .. }
            | Self::Transform { context, .. }
            | Self::Upload { context, .. }
            | Self::Qr { context, .. }
            | Self::Io { context, .. }
            | Self::Network { context, .. }
            | Self::External { context, .. }
            | Self::State { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::Decode { context, .. }
            | Self::Encode { context, .. }
            | Self::Processing { context, .. }
            | Self::Transform { context, .. }
            | Self::Upload { context, .. }
            | Self::Qr { context, .. }
            | Self::Io { context, .. }
            | Self::Network { context, .. }
            | Self::External { context, .. }
            | Self::State { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::Processing { .. } => "processing",
            Self::Transform { .. } => "transform",
            Self::Upload { .. } => "upload",
            Self::Qr { .. } => "qr",
            Self::Io { .. } => "io",
            Self::Network { .. } => "network",
            Self::External { .. } => "external",
            Self::State { .. } => "state",
        }
    }
}

impl fmt::Display for PhotoboothError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoboothError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            PhotoboothError::Decode { what, reason, .. } => {
                write!(f, "Failed to decode {}: {}", what, reason)
            }
            PhotoboothError::Encode { format, reason, .. } => {
                write!(f, "Failed to encode {}: {}", format, reason)
            }
            PhotoboothError::Processing {
                operation, reason, ..
            } => {
                write!(f, "Processing failed during {}: {}", operation, reason)
            }
            PhotoboothError::Transform { status, reason, .. } => match status {
                Some(code) => write!(f, "AI transform failed (HTTP {}): {}", code, reason),
                None => write!(f, "AI transform failed: {}", reason),
            },
            PhotoboothError::Upload {
                target,
                status,
                reason,
                ..
            } => match status {
                Some(code) => write!(f, "Upload to {} failed (HTTP {}): {}", target, code, reason),
                None => write!(f, "Upload to {} failed: {}", target, reason),
            },
            PhotoboothError::Qr { reason, .. } => {
                write!(f, "QR generation failed: {}", reason)
            }
            PhotoboothError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            PhotoboothError::Network {
                operation,
                address,
                source,
                ..
            } => {
                match address {
                    Some(address) => write!(f, "Network error during {} on {}", operation, address)?,
                    None => write!(f, "Network error during {}", operation)?,
                }
                if let Some(source) = source {
                    write!(f, ": {}", source)?;
                }
                Ok(())
            }
            PhotoboothError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
            PhotoboothError::State {
                current_state,
                attempted_operation,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Cannot {} while {}: {}",
                    attempted_operation, current_state, reason
                )
            }
        }
    }
}

impl StdError for PhotoboothError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            Self::Network {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type BoothResult<T> = Result<T, PhotoboothError>;

/// Trait for errors that can be retried
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;

    /// Get the recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> Option<u64> {
        None
    }
}

impl Retryable for PhotoboothError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Upload { .. } | Self::Transform { .. } | Self::Io { .. }
        )
    }

    fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::Network { .. } => Some(2000),
            Self::Upload { .. } | Self::Transform { .. } => Some(1000),
            Self::Io { .. } => Some(100),
            _ => None,
        }
    }
}

/// Error conversion implementations
impl From<std::io::Error> for PhotoboothError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<image::ImageError> for PhotoboothError {
    fn from(error: image::ImageError) -> Self {
        match error {
            image::ImageError::Decoding(e) => Self::decode("image", e.to_string()),
            image::ImageError::Encoding(e) => Self::encode("image", e.to_string()),
            image::ImageError::IoError(e) => Self::io("image", e),
            other => Self::external("image", other),
        }
    }
}

impl From<ScaleError> for PhotoboothError {
    fn from(error: ScaleError) -> Self {
        Self::processing("resize", error.to_string())
    }
}

impl From<base64::DecodeError> for PhotoboothError {
    fn from(error: base64::DecodeError) -> Self {
        Self::decode("base64 payload", error.to_string())
    }
}

impl From<serde_json::Error> for PhotoboothError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<reqwest::Error> for PhotoboothError {
    fn from(error: reqwest::Error) -> Self {
        let address = error.url().map(|u| u.to_string());
        Self::Network {
            operation: if error.is_timeout() {
                "request (timed out)".to_string()
            } else {
                "request".to_string()
            },
            address,
            source: Some(Box::new(error)),
            context: ErrorContext::new(),
        }
    }
}
