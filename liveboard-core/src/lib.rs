//! # Liveboard Core
//!
//! The data contract behind declarative live activity surfaces.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                  liveboard-core                   │
//! ├───────────────────────────────────────────────────┤
//! │  Layout Model        │  Template Resolver         │
//! │  - Ordered props     │  - {{key}} placeholders    │
//! │  - Element kinds     │  - Raw value binding       │
//! │  - Island regions    │  - Total coercions         │
//! ├───────────────────────────────────────────────────┤
//! │  Compression Gate                                 │
//! │  - Size ceiling      - Per-segment deflate        │
//! │  - Sentinel prefix   - Grow-and-retry inflate     │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! Structure (layout, island, behavior) is sent once when an activity
//! starts; only the data dictionary travels on updates.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod behavior;
pub mod compression;
pub mod error;
pub mod island;
pub mod layout;
pub mod template;
pub mod value;

pub use behavior::Behavior;
pub use compression::{
    is_compressed, CompressionGate, Decision, DecisionReason, DeflateCodec, EncodedSegments,
    GateConfig, Inflated, SegmentCodec, SegmentKind, SegmentSet, SegmentSizes,
    COMPRESSED_SENTINEL,
};
pub use error::{CompressionError, DecodeError, ParseError, ValidationError};
pub use island::{DynamicIslandLayout, ExpandedRegions};
pub use layout::{ElementKind, LayoutElement};
pub use template::resolve;
pub use value::{Value, ValueMap};

/// Liveboard core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
