//! Registry configuration.

use std::path::PathBuf;

use liveboard_core::GateConfig;

use crate::platform::DismissalPolicy;

/// Environment variable overriding the payload ceiling in bytes.
pub const ENV_PAYLOAD_CEILING: &str = "LIVEBOARD_PAYLOAD_CEILING";

/// Environment variable overriding the first-attempt inflate multiplier.
pub const ENV_DECOMPRESSION_MULTIPLIER: &str = "LIVEBOARD_DECOMPRESSION_MULTIPLIER";

/// Environment variable naming the data directory for snapshots and images.
pub const ENV_DATA_DIR: &str = "LIVEBOARD_DATA_DIR";

/// Settings for [`crate::ActivityRegistry`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryConfig {
    /// Compression gate settings.
    pub gate: GateConfig,
    /// Root for persisted snapshots and images. Nothing is persisted when unset.
    pub data_dir: Option<PathBuf>,
    /// Dismissal policy used by [`crate::ActivityRegistry::end`].
    pub dismissal: DismissalPolicy,
}

impl RegistryConfig {
    /// Defaults overridden by `LIVEBOARD_*` environment variables.
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// As [`RegistryConfig::from_env`], reading variables through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = GateConfig::default();
        let gate = GateConfig {
            ceiling_bytes: lookup(ENV_PAYLOAD_CEILING)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.ceiling_bytes),
            decompression_multiplier: lookup(ENV_DECOMPRESSION_MULTIPLIER)
                .and_then(|v| v.trim().parse().ok())
                .filter(|m: &usize| *m > 0)
                .unwrap_or(defaults.decompression_multiplier),
            ..defaults
        };
        let data_dir = lookup(ENV_DATA_DIR)
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);
        Self {
            gate,
            data_dir,
            dismissal: DismissalPolicy::Default,
        }
    }

    /// Directory for activity snapshots, if persistence is enabled.
    #[must_use]
    pub fn snapshot_dir(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("snapshots"))
    }

    /// Directory for image assets, if persistence is enabled.
    #[must_use]
    pub fn image_dir(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("images"))
    }
}
