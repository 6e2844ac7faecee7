//! Layout trees with order-preserving properties.
//!
//! Layouts arrive as decoded JSON where every node carries an `id`, a
//! `kind`, an optional `properties` array of single-key objects, and an
//! optional `children` array:
//!
//! ```json
//! {
//!   "id": "root",
//!   "kind": "container",
//!   "properties": [{ "padding": 8 }, { "background": "#101010" }, { "padding": 4 }],
//!   "children": [
//!     { "id": "title", "kind": "text", "properties": [{ "text": "{{title}}" }] }
//!   ]
//! }
//! ```
//!
//! The array form exists because renderers apply modifiers in declaration
//! order: padding before a background composes differently from padding
//! after it, and a key may legitimately appear more than once. Parsing keeps
//! every entry, in order, as `(key, value)` pairs.

use std::fmt;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::ParseError;
use crate::template;
use crate::value::{Value, ValueMap};

/// The element types a renderer knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Stack of child elements.
    Container,
    /// Text label.
    Text,
    /// Image from the shared asset store or a system symbol.
    Image,
    /// Linear or circular progress indicator.
    Progress,
    /// Count-up / count-down timer.
    Timer,
    /// Small data chart.
    Chart,
    /// Progress bar split into discrete segments.
    SegmentedProgress,
    /// Flexible empty space.
    Spacer,
    /// Gauge with a current value and range.
    Gauge,
}

impl ElementKind {
    /// Every kind, in wire order.
    pub const ALL: [Self; 9] = [
        Self::Container,
        Self::Text,
        Self::Image,
        Self::Progress,
        Self::Timer,
        Self::Chart,
        Self::SegmentedProgress,
        Self::Spacer,
        Self::Gauge,
    ];

    /// The wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Text => "text",
            Self::Image => "image",
            Self::Progress => "progress",
            Self::Timer => "timer",
            Self::Chart => "chart",
            Self::SegmentedProgress => "segmentedProgress",
            Self::Spacer => "spacer",
            Self::Gauge => "gauge",
        }
    }

    /// Look up a kind by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Whether elements of this kind render their children.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Container)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a layout tree.
///
/// Built once per start call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutElement {
    /// Identifier, unique within the tree by convention.
    pub id: String,
    /// Element type.
    pub kind: ElementKind,
    /// Properties in declaration order. Keys may repeat.
    pub properties: Vec<(String, Value)>,
    /// Child nodes. Only containers render them.
    pub children: Vec<LayoutElement>,
}

impl LayoutElement {
    /// Create an element with no properties or children.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            kind,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A container holding `children`.
    #[must_use]
    pub fn container(id: impl Into<String>, children: Vec<LayoutElement>) -> Self {
        Self {
            children,
            ..Self::new(id, ElementKind::Container)
        }
    }

    /// A text element. `text` may be a literal or a `{{key}}` placeholder.
    #[must_use]
    pub fn text(id: impl Into<String>, text: impl Into<Value>) -> Self {
        Self::new(id, ElementKind::Text).with_property("text", text)
    }

    /// An image element referring to a stored asset by name.
    #[must_use]
    pub fn image(id: impl Into<String>, name: impl Into<Value>) -> Self {
        Self::new(id, ElementKind::Image).with_property("name", name)
    }

    /// A spacer.
    #[must_use]
    pub fn spacer(id: impl Into<String>) -> Self {
        Self::new(id, ElementKind::Spacer)
    }

    /// Append a property. Existing entries with the same key are kept.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Append a child.
    #[must_use]
    pub fn with_child(mut self, child: LayoutElement) -> Self {
        self.children.push(child);
        self
    }

    /// Parse a tree from a decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidNode`] if any node lacks `id` or `kind`,
    /// names an unknown kind, or has malformed `properties`/`children`.
    /// Nothing is returned for the rest of the tree in that case.
    pub fn parse(node: &Value) -> Result<Self, ParseError> {
        Self::parse_at(node, "root")
    }

    /// Parse a tree from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] on invalid JSON, otherwise as [`LayoutElement::parse`].
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(json)?;
        Self::parse(&value)
    }

    /// Serialize back to the wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn parse_at(node: &Value, path: &str) -> Result<Self, ParseError> {
        let map = node.as_object().ok_or_else(|| {
            ParseError::invalid(path, format!("expected an object, found {}", node.type_name()))
        })?;

        let id = match map.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(_) => return Err(ParseError::invalid(path, "`id` must be a non-empty string")),
            None => return Err(ParseError::invalid(path, "missing `id`")),
        };

        let kind = match map.get("kind") {
            Some(Value::String(name)) => ElementKind::from_name(name).ok_or_else(|| {
                ParseError::invalid(path, format!("unknown kind `{name}` for element `{id}`"))
            })?,
            Some(_) => return Err(ParseError::invalid(path, "`kind` must be a string")),
            None => {
                return Err(ParseError::invalid(
                    path,
                    format!("missing `kind` for element `{id}`"),
                ))
            }
        };

        let properties = match map.get("properties") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => parse_properties(entries, path)?,
            Some(_) => return Err(ParseError::invalid(path, "`properties` must be an array")),
        };

        let children = match map.get("children") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(nodes)) => nodes
                .iter()
                .enumerate()
                .map(|(i, child)| Self::parse_at(child, &format!("{path}.children[{i}]")))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(ParseError::invalid(path, "`children` must be an array")),
        };

        Ok(Self {
            id,
            kind,
            properties,
            children,
        })
    }

    /// The last declared value for `key`.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Every declared value for `key`, in declaration order.
    pub fn properties_named<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.properties
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Properties with placeholders resolved against `data`, in declaration order.
    #[must_use]
    pub fn resolved_properties(&self, data: &ValueMap) -> Vec<(&str, Value)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), template::resolve(v, data)))
            .collect()
    }

    /// A deep copy of this tree with every property resolved against `data`.
    #[must_use]
    pub fn resolved(&self, data: &ValueMap) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind,
            properties: self
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), template::resolve(v, data)))
                .collect(),
            children: self.children.iter().map(|c| c.resolved(data)).collect(),
        }
    }

    /// Number of elements in this subtree, including `self`.
    #[must_use]
    pub fn element_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(LayoutElement::element_count)
            .sum::<usize>()
    }

    /// Depth-first search for an element by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&LayoutElement> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Visit every element depth-first, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a LayoutElement)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

fn parse_properties(entries: &[Value], path: &str) -> Result<Vec<(String, Value)>, ParseError> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            entry
                .as_object()
                .filter(|map| map.len() == 1)
                .and_then(|map| map.iter().next())
                .map(|(k, v)| (k.to_string(), v.clone()))
                .ok_or_else(|| {
                    ParseError::invalid(
                        &format!("{path}.properties[{i}]"),
                        "property entries must be objects with exactly one key",
                    )
                })
        })
        .collect()
}

/// `properties` on the wire: an array of single-key objects.
struct PropertyList<'a>(&'a [(String, Value)]);

struct PropertyEntry<'a>(&'a str, &'a Value);

impl Serialize for PropertyList<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (k, v) in self.0 {
            seq.serialize_element(&PropertyEntry(k, v))?;
        }
        seq.end()
    }
}

impl Serialize for PropertyEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, self.1)?;
        map.end()
    }
}

impl Serialize for LayoutElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("kind", self.kind.as_str())?;
        if !self.properties.is_empty() {
            map.serialize_entry("properties", &PropertyList(&self.properties))?;
        }
        if !self.children.is_empty() {
            map.serialize_entry("children", &self.children)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LayoutElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
