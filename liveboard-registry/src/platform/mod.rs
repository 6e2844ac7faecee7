//! The seam between the registry and the OS activity service.
//!
//! The platform is the source of truth for which surfaces are alive; the
//! registry only caches what it has seen. Everything the registry needs to
//! rebuild its cache after a restart is round-tripped through
//! [`ActivityAttributes`], including the client-chosen activity id.

pub mod memory;

use async_trait::async_trait;
use liveboard_core::ValueMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::ActivityState;

pub use memory::{CallCounts, InMemoryPlatform, PlatformMethod};

/// Opaque platform-assigned identifier for a live surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformHandle(String);

impl PlatformHandle {
    /// Wrap a platform identifier.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlatformHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static attributes fixed at start. Segments may be sentinel-compressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityAttributes {
    /// Client-chosen activity id, used to reconcile after restarts.
    pub activity_id: String,
    /// Layout segment.
    pub layout: String,
    /// Dynamic island segment.
    pub dynamic_island_layout: String,
    /// Behavior segment.
    pub behavior: String,
}

/// Dynamic content pushed with every request/update/end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentState {
    /// Data dictionary for template binding.
    pub data: ValueMap,
    /// When the content should be considered outdated (ms since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_at_ms: Option<u64>,
    /// Ordering hint among this app's activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl ContentState {
    /// Content carrying only a data dictionary.
    #[must_use]
    pub fn new(data: ValueMap) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}

/// A one-shot alert delivered with a single update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Alert title.
    pub title: String,
    /// Alert body.
    pub body: String,
    /// Sound file name; the system default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

/// How long an ended surface may linger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DismissalPolicy {
    /// Let the system decide.
    #[default]
    Default,
    /// Remove immediately.
    Immediate,
    /// Remove at the given time (ms since epoch).
    After(u64),
}

/// Everything needed to create a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRequest {
    /// Static attributes.
    pub attributes: ActivityAttributes,
    /// Initial content.
    pub content: ContentState,
}

/// Lifecycle state as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformActivityState {
    /// Requested, not yet visible.
    Pending,
    /// Visible and updatable.
    Active,
    /// Past its stale date.
    Stale,
    /// Ended; may still be displayed briefly.
    Ended,
    /// Removed from screen.
    Dismissed,
    /// A state this crate does not know about.
    #[serde(untagged)]
    Other(String),
}

impl PlatformActivityState {
    /// Whether the surface is still alive and should be tracked.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Active | Self::Stale)
    }

    /// Map into the registry's state enum. Unmapped states become `Unknown`.
    #[must_use]
    pub fn to_activity_state(&self) -> ActivityState {
        match self {
            Self::Active => ActivityState::Active,
            Self::Stale => ActivityState::Stale,
            Self::Ended => ActivityState::Ended,
            Self::Dismissed => ActivityState::Dismissed,
            Self::Pending | Self::Other(_) => ActivityState::Unknown,
        }
    }
}

/// A surface as enumerated by the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformActivity {
    /// Platform identifier.
    pub handle: PlatformHandle,
    /// Attributes supplied at start.
    pub attributes: ActivityAttributes,
    /// Most recent content.
    pub content: ContentState,
    /// Current state.
    pub state: PlatformActivityState,
}

/// Whether the feature can be used at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    /// The OS version supports live activities.
    pub supported: bool,
    /// The user has not disabled them for this app.
    pub enabled: bool,
}

impl Default for Availability {
    fn default() -> Self {
        Self {
            supported: true,
            enabled: true,
        }
    }
}

/// Errors reported by the platform.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// The handle does not refer to a known surface.
    #[error("unknown activity handle: {0}")]
    UnknownHandle(String),
    /// The activity service is unavailable.
    #[error("activity service unavailable: {0}")]
    Unavailable(String),
}

/// The OS live activity service.
///
/// Calls either complete or fail; there is no cancellation or timeout at
/// this layer.
#[async_trait]
pub trait ActivityPlatform: Send + Sync {
    /// Feature availability for this process.
    fn availability(&self) -> Availability;

    /// Create a surface.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Rejected`] if the platform refuses.
    async fn request(&self, request: ActivityRequest) -> Result<PlatformHandle, PlatformError>;

    /// Push new content, optionally with a one-shot alert.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnknownHandle`] for surfaces the platform
    /// no longer knows.
    async fn update(
        &self,
        handle: &PlatformHandle,
        content: ContentState,
        alert: Option<AlertConfig>,
    ) -> Result<(), PlatformError>;

    /// Retire a surface, optionally with final content.
    ///
    /// # Errors
    ///
    /// As [`ActivityPlatform::update`].
    async fn end(
        &self,
        handle: &PlatformHandle,
        content: Option<ContentState>,
        policy: DismissalPolicy,
    ) -> Result<(), PlatformError>;

    /// Enumerate every surface the platform knows about, ended ones included.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unavailable`] if the service cannot be reached.
    async fn activities(&self) -> Result<Vec<PlatformActivity>, PlatformError>;
}
