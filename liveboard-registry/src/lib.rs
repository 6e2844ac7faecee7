//! # Liveboard Registry
//!
//! Activity lifecycle on top of [`liveboard_core`]: start, update, end and
//! list against an injected [`ActivityPlatform`], with reconciliation after
//! restarts.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                liveboard-registry                 │
//! ├───────────────────────────────────────────────────┤
//! │  ActivityRegistry    │  Platform seam             │
//! │  - Record map        │  - ActivityPlatform trait  │
//! │  - Per-id ordering   │  - InMemoryPlatform        │
//! │  - Recovery sweep    │                            │
//! ├───────────────────────────────────────────────────┤
//! │  Stores: snapshots (last data), images (JPEG)     │
//! │  Render input: decode attributes for renderers    │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use liveboard_core::{Behavior, DynamicIslandLayout, LayoutElement, Value};
//! use liveboard_registry::{ActivityRegistry, InMemoryPlatform, StartRequest};
//!
//! # tokio_test_block(async {
//! let registry = ActivityRegistry::new(Arc::new(InMemoryPlatform::new()));
//! let request = StartRequest::new(
//!     LayoutElement::text("eta", "{{eta}}"),
//!     DynamicIslandLayout::with_center(LayoutElement::text("c", "{{eta}}")),
//!     Behavior::new("myapp://orders/1"),
//! );
//! let id = registry.start(request).await.unwrap();
//! let data = [("eta", Value::from(3))].into_iter().collect();
//! registry.update(&id, data, None).await.unwrap();
//! registry.end(&id, None).await.unwrap();
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod config;
pub mod error;
mod paths;
pub mod platform;
pub mod record;
pub mod registry;
pub mod render;
pub mod snapshot;

pub use assets::{ImageStore, ImageStoreConfig, SaveOutcome};
pub use config::RegistryConfig;
pub use error::{ActivityError, ActivityResult, StoreError};
pub use platform::{
    ActivityAttributes, ActivityPlatform, ActivityRequest, AlertConfig, Availability,
    ContentState, DismissalPolicy, InMemoryPlatform, PlatformActivity, PlatformActivityState,
    PlatformError, PlatformHandle,
};
pub use record::{ActivityId, ActivityRecord, ActivityState, ActivitySummary};
pub use registry::{ActivityRegistry, RecoveryReport, StartRequest};
pub use render::RenderInput;
pub use snapshot::{Snapshot, SnapshotStore};
