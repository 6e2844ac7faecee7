//! # Liveboard Bridge
//!
//! JSON-RPC boundary between a host application and the activity registry.
//!
//! ## Methods
//!
//! - `start` - Create an activity from layout, island, behavior and data
//! - `update` - Push a new data dictionary, optionally with an alert
//! - `end` - Retire an activity
//! - `list` - Enumerate known activities
//! - `saveImage` / `removeImage` / `listImages` / `cleanupImages` - Image assets
//!
//! The registry is constructed by the host and injected; the bridge holds no
//! global state.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod logging;
pub mod params;
pub mod rpc;

use std::sync::Arc;

use anyhow::Context;
use liveboard_registry::{ActivityPlatform, ActivityRegistry, ImageStore, RegistryConfig};

pub use bridge::{ActivityBridge, METHODS};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Build a bridge from `config`: a registry over `platform`, plus an image
/// store when a data directory is configured.
///
/// # Errors
///
/// Returns an error if the snapshot or image directory cannot be created.
pub fn bridge_from_config(
    platform: Arc<dyn ActivityPlatform>,
    config: &RegistryConfig,
) -> anyhow::Result<ActivityBridge> {
    let registry =
        ActivityRegistry::with_config(platform, config).context("Failed to open snapshot store")?;
    let mut bridge = ActivityBridge::new(Arc::new(registry));
    if let Some(dir) = config.image_dir() {
        let images = ImageStore::open(&dir)
            .with_context(|| format!("Failed to open image store at {}", dir.display()))?;
        bridge = bridge.with_images(Arc::new(images));
    }
    tracing::info!(
        ceiling = config.gate.ceiling_bytes,
        data_dir = ?config.data_dir,
        "Liveboard bridge ready"
    );
    Ok(bridge)
}
