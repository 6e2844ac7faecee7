//! Registry records and identifiers.

use std::time::Instant;

use liveboard_core::{LayoutElement, ValueMap};
use serde::{Deserialize, Serialize};

use crate::platform::PlatformHandle;

/// Client-facing activity identifier.
///
/// Freshly started activities get a v4 UUID; ids recovered from the
/// platform are whatever the original caller stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(String);

impl ActivityId {
    /// Generate a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ActivityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ActivityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a tracked activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    /// Started and visible.
    Active,
    /// Has received at least one update.
    Updated,
    /// Ended by the app.
    Ended,
    /// Removed by the user or system.
    Dismissed,
    /// Past its stale date.
    Stale,
    /// Anything the platform reports that does not map cleanly.
    Unknown,
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Updated => "updated",
            Self::Ended => "ended",
            Self::Dismissed => "dismissed",
            Self::Stale => "stale",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A tracked activity.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    /// Client-facing id.
    pub id: ActivityId,
    /// Platform handle.
    pub handle: PlatformHandle,
    /// Last state the registry observed or caused.
    pub state: ActivityState,
    /// Last data dictionary pushed.
    pub last_data: ValueMap,
    /// Parsed layout, when it was available or could be decoded on recovery.
    pub layout: Option<LayoutElement>,
    /// When the record was created (ms since epoch).
    pub created_at_ms: u64,
    /// When the record last changed (ms since epoch).
    pub updated_at_ms: u64,
    /// Monotonic insertion time, compared against sweep start.
    pub(crate) registered_at: Instant,
}

impl ActivityRecord {
    pub(crate) fn new(
        id: ActivityId,
        handle: PlatformHandle,
        state: ActivityState,
        last_data: ValueMap,
        layout: Option<LayoutElement>,
    ) -> Self {
        let now = crate::paths::current_timestamp_ms();
        Self {
            id,
            handle,
            state,
            last_data,
            layout,
            created_at_ms: now,
            updated_at_ms: now,
            registered_at: Instant::now(),
        }
    }

    pub(crate) fn touch(&mut self, state: ActivityState) {
        self.state = state;
        self.updated_at_ms = crate::paths::current_timestamp_ms();
    }
}

/// One row of [`crate::ActivityRegistry::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySummary {
    /// Client-facing id.
    pub id: ActivityId,
    /// State as reported by the platform.
    pub state: ActivityState,
    /// Platform handle.
    #[serde(skip)]
    pub handle: PlatformHandle,
}
