//! Template placeholder resolution.
//!
//! A property whose value is exactly `{{key}}` (surrounding whitespace
//! allowed) is bound to `data[key]` at render time. The raw value is
//! substituted, so numbers, booleans and arrays bind without being
//! stringified. Strings that merely contain `{{...}}` among other text are
//! literals; there is no embedded interpolation.

use crate::layout::LayoutElement;
use crate::value::{Value, ValueMap};

/// Resolve `value` against `data`.
///
/// Missing keys resolve to [`Value::Null`], which renderers treat as "unset".
#[must_use]
pub fn resolve(value: &Value, data: &ValueMap) -> Value {
    match value {
        Value::String(s) => match placeholder_key(s) {
            Some(key) => data.get(key).cloned().unwrap_or(Value::Null),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

/// The key named by a `{{key}}` placeholder, if `s` is exactly one.
#[must_use]
pub fn placeholder_key(s: &str) -> Option<&str> {
    let key = s.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    valid.then_some(key)
}

/// Every placeholder key bound anywhere in `root`, first occurrence order.
#[must_use]
pub fn bound_keys(root: &LayoutElement) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    root.walk(&mut |element| {
        for (_, value) in &element.properties {
            if let Some(key) = value.as_str().and_then(placeholder_key) {
                if !keys.iter().any(|k| k == key) {
                    keys.push(key.to_string());
                }
            }
        }
    });
    keys
}

/// Keys bound in `root` that `data` does not provide.
#[must_use]
pub fn missing_keys(root: &LayoutElement, data: &ValueMap) -> Vec<String> {
    bound_keys(root)
        .into_iter()
        .filter(|key| !data.contains_key(key))
        .collect()
}
