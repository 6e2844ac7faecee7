//! Dynamic Island presentations.
//!
//! An activity supplies alternate layouts for the compact, minimal, and
//! expanded island presentations. Each region is an independent tree.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::layout::LayoutElement;

/// Regions of the expanded presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpandedRegions {
    /// Leading edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leading: Option<LayoutElement>,
    /// Trailing edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing: Option<LayoutElement>,
    /// Center, below the camera cutout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<LayoutElement>,
    /// Full-width bottom region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<LayoutElement>,
}

impl ExpandedRegions {
    /// Whether any region is present.
    #[must_use]
    pub fn has_any(&self) -> bool {
        self.leading.is_some()
            || self.trailing.is_some()
            || self.center.is_some()
            || self.bottom.is_some()
    }
}

/// All island presentations for one activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicIslandLayout {
    /// Expanded presentation regions.
    #[serde(default)]
    pub expanded: ExpandedRegions,
    /// Compact presentation, leading side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compact_leading: Option<LayoutElement>,
    /// Compact presentation, trailing side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compact_trailing: Option<LayoutElement>,
    /// Minimal presentation shown when several activities compete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimal: Option<LayoutElement>,
}

impl DynamicIslandLayout {
    /// A layout with only the expanded center region.
    #[must_use]
    pub fn with_center(center: LayoutElement) -> Self {
        Self {
            expanded: ExpandedRegions {
                center: Some(center),
                ..ExpandedRegions::default()
            },
            ..Self::default()
        }
    }

    /// Check that the expanded presentation has at least one region.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingExpandedRegion`] otherwise.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.expanded.has_any() {
            Ok(())
        } else {
            Err(ValidationError::MissingExpandedRegion)
        }
    }
}
