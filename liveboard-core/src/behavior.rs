//! Static per-activity presentation settings.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Settings sent once at start and never re-sent on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Behavior {
    /// Deep link opened when the surface is tapped.
    pub widget_url: String,
    /// Lock screen background tint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_tint: Option<String>,
    /// Foreground colour of system action buttons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_action_foreground_color: Option<String>,
    /// Tint of the island key line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_line_tint: Option<String>,
}

impl Behavior {
    /// Behavior with only a widget URL.
    #[must_use]
    pub fn new(widget_url: impl Into<String>) -> Self {
        Self {
            widget_url: widget_url.into(),
            ..Self::default()
        }
    }

    /// Validate the widget URL and any colours.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidWidgetUrl`] or [`ValidationError::InvalidColor`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.widget_url.trim().is_empty() {
            return Err(ValidationError::InvalidWidgetUrl("empty".to_string()));
        }
        url::Url::parse(&self.widget_url)
            .map_err(|e| ValidationError::InvalidWidgetUrl(format!("{}: {e}", self.widget_url)))?;

        let colors = [
            ("backgroundTint", &self.background_tint),
            (
                "systemActionForegroundColor",
                &self.system_action_foreground_color,
            ),
            ("keyLineTint", &self.key_line_tint),
        ];
        for (field, value) in colors {
            if let Some(value) = value {
                if !is_hex_color(value) {
                    return Err(ValidationError::InvalidColor {
                        field,
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// `#RGB`, `#RRGGBB`, or `#RRGGBBAA`.
fn is_hex_color(value: &str) -> bool {
    value.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_behavior() {
        let behavior = Behavior {
            widget_url: "myapp://orders/42".to_string(),
            background_tint: Some("#112233".to_string()),
            system_action_foreground_color: Some("#FFF".to_string()),
            key_line_tint: Some("#11223344".to_string()),
        };
        assert!(behavior.validate().is_ok());
    }

    #[test]
    fn test_empty_widget_url_fails() {
        assert!(matches!(
            Behavior::new("  ").validate(),
            Err(ValidationError::InvalidWidgetUrl(_))
        ));
    }

    #[test]
    fn test_relative_widget_url_fails() {
        assert!(matches!(
            Behavior::new("orders/42").validate(),
            Err(ValidationError::InvalidWidgetUrl(_))
        ));
    }

    #[test]
    fn test_bad_color_names_field() {
        let behavior = Behavior {
            key_line_tint: Some("red".to_string()),
            ..Behavior::new("https://example.com")
        };
        assert_eq!(
            behavior.validate(),
            Err(ValidationError::InvalidColor {
                field: "keyLineTint",
                value: "red".to_string(),
            })
        );
    }

    #[test]
    fn test_wire_names() {
        let behavior: Behavior = serde_json::from_str(
            r##"{"widgetUrl": "myapp://x", "systemActionForegroundColor": "#000000"}"##,
        )
        .expect("should parse");
        assert_eq!(behavior.widget_url, "myapp://x");
        assert_eq!(
            behavior.system_action_foreground_color.as_deref(),
            Some("#000000")
        );
        assert!(behavior.background_tint.is_none());
    }
}
