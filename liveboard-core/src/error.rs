//! Error types for layout, validation, and payload operations.

use thiserror::Error;

/// Errors raised while building a layout tree from decoded JSON.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A node is missing `id`/`kind`, has an unknown kind, or is malformed.
    #[error("Invalid node at {path}: {reason}")]
    InvalidNode {
        /// Location of the offending node, e.g. `root.children[2]`.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The input was not valid JSON.
    #[error("Malformed layout JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParseError {
    pub(crate) fn invalid(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidNode {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised when static activity configuration is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// `expanded` has none of leading, trailing, center, bottom.
    #[error("dynamic island layout must define at least one expanded region")]
    MissingExpandedRegion,

    /// The widget URL is empty or unparseable.
    #[error("invalid widget URL: {0}")]
    InvalidWidgetUrl(String),

    /// A colour field is not a `#RGB`, `#RRGGBB`, or `#RRGGBBAA` hex string.
    #[error("invalid color for {field}: {value}")]
    InvalidColor {
        /// Behavior field name.
        field: &'static str,
        /// Rejected value.
        value: String,
    },
}

/// Errors raised by the compression gate while encoding segments.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// The primary layout segment could not be compressed.
    #[error("Failed to compress layout segment: {0}")]
    PrimarySegment(#[source] std::io::Error),
}

/// Errors raised while decoding a (possibly compressed) segment.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The base64 body after the sentinel is invalid.
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The DEFLATE stream is corrupt or truncated.
    #[error("Corrupt compressed payload: {0}")]
    Corrupt(String),

    /// Inflated output would exceed the configured maximum.
    #[error("Decompressed payload exceeds {limit} bytes")]
    TooLarge {
        /// Configured maximum output size.
        limit: usize,
    },

    /// The decoded bytes are not valid JSON for the expected structure.
    #[error("Malformed segment JSON: {0}")]
    Json(#[from] serde_json::Error),
}
