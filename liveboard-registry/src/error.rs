//! Error types for registry and store operations.

use liveboard_core::{CompressionError, DecodeError, ParseError, ValidationError};
use thiserror::Error;

use crate::platform::PlatformError;

/// Result type for registry operations.
pub type ActivityResult<T> = Result<T, ActivityError>;

/// Errors surfaced by [`crate::ActivityRegistry`].
#[derive(Debug, Error)]
pub enum ActivityError {
    /// Island or behavior failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Layout could not be parsed.
    #[error("Layout parse failed: {0}")]
    Parse(#[from] ParseError),

    /// The OS does not support live activities.
    #[error("Live activities are not supported on this platform")]
    PlatformUnsupported,

    /// The user has disabled live activities for this app.
    #[error("Live activities are disabled for this app")]
    AuthorizationDenied,

    /// No activity with the given id, even after a recovery sweep.
    #[error("Activity not found: {0}")]
    ActivityNotFound(String),

    /// The primary segment could not be compressed.
    #[error("Compression failed: {0}")]
    Compression(#[from] CompressionError),

    /// A segment could not be decoded.
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// A data dictionary could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The platform call failed.
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl ActivityError {
    /// Stable taxonomy name, carried to clients as `error.data.kind`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Parse(_) => "ParseError",
            Self::PlatformUnsupported => "PlatformUnsupported",
            Self::AuthorizationDenied => "AuthorizationDenied",
            Self::ActivityNotFound(_) => "ActivityNotFound",
            Self::Compression(_) => "CompressionFailure",
            Self::Decode(_) => "DecodeFailure",
            Self::Serialization(_) => "SerializationError",
            Self::Platform(_) => "PlatformError",
        }
    }
}

/// Errors from the on-disk stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image payload could not be decoded or re-encoded.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Name is empty after sanitization.
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
}

impl StoreError {
    /// Stable taxonomy name, carried to clients as `error.data.kind`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "StorageError",
            Self::Serialization(_) => "SerializationError",
            Self::InvalidImage(_) => "InvalidImage",
            Self::InvalidName(_) => "InvalidName",
        }
    }
}
