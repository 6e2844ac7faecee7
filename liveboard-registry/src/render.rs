//! Renderer-side decoding of activity attributes.
//!
//! The external renderer receives the attributes exactly as the platform
//! stored them. The layout is essential; the island and behavior are
//! best-effort and degrade to defaults.

use liveboard_core::{Behavior, CompressionGate, DynamicIslandLayout, LayoutElement, ValueMap};

use crate::error::ActivityResult;
use crate::platform::ActivityAttributes;

/// Structures the renderer draws from.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderInput {
    /// Lock screen layout tree, unresolved.
    pub layout: LayoutElement,
    /// Island presentations, or the default when undecodable.
    pub dynamic_island: DynamicIslandLayout,
    /// Presentation settings, or the default when undecodable.
    pub behavior: Behavior,
}

impl RenderInput {
    /// Decode all three segments.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ActivityError::Decode`] or
    /// [`crate::ActivityError::Parse`] when the layout cannot be recovered.
    pub fn decode(attributes: &ActivityAttributes, gate: &CompressionGate) -> ActivityResult<Self> {
        let layout_json = gate.decode(&attributes.layout)?;
        let layout = LayoutElement::from_json(&layout_json)?;

        let dynamic_island = gate
            .decode_json::<DynamicIslandLayout>(&attributes.dynamic_island_layout)
            .unwrap_or_else(|e| {
                tracing::warn!(
                    activity_id = %attributes.activity_id,
                    "Falling back to empty island layout: {e}"
                );
                DynamicIslandLayout::default()
            });

        let behavior = gate
            .decode_json::<Behavior>(&attributes.behavior)
            .unwrap_or_else(|e| {
                tracing::warn!(
                    activity_id = %attributes.activity_id,
                    "Falling back to default behavior: {e}"
                );
                Behavior::default()
            });

        Ok(Self {
            layout,
            dynamic_island,
            behavior,
        })
    }

    /// A copy of the layout with every placeholder bound to `data`.
    #[must_use]
    pub fn resolve_layout(&self, data: &ValueMap) -> LayoutElement {
        self.layout.resolved(data)
    }
}
