//! Method parameters as sent by host clients.
//!
//! Structure arguments (`layout`, `dynamicIslandLayout`, `behavior`) may be
//! sent either as JSON objects or as JSON-encoded strings.

use liveboard_core::{Behavior, DynamicIslandLayout, LayoutElement, ParseError, Value, ValueMap};
use liveboard_registry::{AlertConfig, StartRequest};
use serde::Deserialize;

/// `start` parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartParams {
    /// Layout tree, object or JSON string.
    pub layout: serde_json::Value,
    /// Island layout, object or JSON string.
    pub dynamic_island_layout: serde_json::Value,
    /// Behavior, object or JSON string.
    pub behavior: serde_json::Value,
    /// Initial data.
    #[serde(default)]
    pub data: ValueMap,
    /// Stale date in ms since epoch.
    #[serde(default)]
    pub stale_date: Option<f64>,
    /// Relevance score.
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

impl StartParams {
    /// Parse the structure arguments into a registry request.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if any structure argument is malformed.
    pub fn into_request(self) -> Result<StartRequest, ParseError> {
        let layout = LayoutElement::parse(&Value::from(unwrap_json_string(self.layout)?))?;
        let dynamic_island: DynamicIslandLayout =
            serde_json::from_value(unwrap_json_string(self.dynamic_island_layout)?)?;
        let behavior: Behavior = serde_json::from_value(unwrap_json_string(self.behavior)?)?;

        let mut request = StartRequest::new(layout, dynamic_island, behavior).with_data(self.data);
        request.stale_at_ms = self.stale_date.and_then(millis);
        request.relevance_score = self.relevance_score;
        Ok(request)
    }
}

/// `update` parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    /// Target activity.
    pub activity_id: String,
    /// Replacement data.
    #[serde(default)]
    pub data: ValueMap,
    /// One-shot alert.
    #[serde(default)]
    pub alert_configuration: Option<AlertConfig>,
}

/// `end` parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndParams {
    /// Target activity.
    pub activity_id: String,
    /// Final data.
    #[serde(default)]
    pub data: Option<ValueMap>,
}

/// `saveImage` parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveImageParams {
    /// Base64 payload or `data:` URI.
    pub image_data: String,
    /// Name layouts will reference.
    pub name: String,
    /// JPEG quality, 0..=1.
    #[serde(default)]
    pub quality: Option<f32>,
}

/// `removeImage` parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveImageParams {
    /// Image name.
    pub name: String,
}

/// Accept either an embedded object or a string containing JSON.
fn unwrap_json_string(value: serde_json::Value) -> Result<serde_json::Value, ParseError> {
    match value {
        serde_json::Value::String(text) => Ok(serde_json::from_str(&text)?),
        other => Ok(other),
    }
}

/// Whole milliseconds, ignoring negative and non-finite input.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn millis(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value as u64)
}
