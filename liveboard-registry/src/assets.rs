//! Image assets referenced by `image` elements.
//!
//! Layouts refer to images by name; the renderer looks the name up in this
//! store. Images arrive as base64 (optionally wrapped in a `data:` URI),
//! are re-encoded as JPEG, and are evicted after a retention window.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use serde::Serialize;

use crate::error::StoreError;
use crate::paths::{decode_filename, encode_filename};

/// Default JPEG quality on a 0..=1 scale.
pub const DEFAULT_QUALITY: f32 = 0.8;

/// Default retention window.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const EXTENSION: &str = "jpg";

/// Image store settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStoreConfig {
    /// Files older than this are removed by [`ImageStore::cleanup`].
    pub retention: Duration,
    /// Quality used when the caller does not pass one.
    pub default_quality: f32,
}

impl Default for ImageStoreConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            default_quality: DEFAULT_QUALITY,
        }
    }
}

/// Result of a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    /// Always true; failures are returned as errors.
    pub success: bool,
    /// Name to reference from layouts.
    pub image_name: String,
}

/// Directory-backed image storage.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    config: ImageStoreConfig,
}

impl ImageStore {
    /// Open a store with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::with_config(dir, ImageStoreConfig::default())
    }

    /// Open a store with custom settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn with_config(
        dir: impl Into<PathBuf>,
        config: ImageStoreConfig,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, config })
    }

    /// Store root.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Settings in effect.
    #[must_use]
    pub fn config(&self) -> &ImageStoreConfig {
        &self.config
    }

    /// Path an image named `name` is stored at.
    ///
    /// The file stem is the percent-encoded name, so `photo.png` lives at
    /// `photo%2Epng.jpg` and never collides with `photo_png`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if `name` is empty.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let name = image_key(name)?;
        Ok(self
            .dir
            .join(format!("{}.{EXTENSION}", encode_filename(name))))
    }

    /// Decode `image_data` (base64 or a base64 `data:` URI) and store it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidImage`] if the payload is not a decodable
    /// image, [`StoreError::InvalidName`] for an empty name, or an IO error.
    pub fn save(
        &self,
        image_data: &str,
        name: &str,
        quality: Option<f32>,
    ) -> Result<SaveOutcome, StoreError> {
        let bytes = decode_payload(image_data)?;
        self.save_bytes(&bytes, name, quality)
    }

    /// Store already-decoded image bytes in any format the `image` crate reads.
    ///
    /// # Errors
    ///
    /// See [`ImageStore::save`].
    pub fn save_bytes(
        &self,
        bytes: &[u8],
        name: &str,
        quality: Option<f32>,
    ) -> Result<SaveOutcome, StoreError> {
        let image_name = image_key(name)?.to_string();
        let path = self.path_for(&image_name)?;
        let img = image::load_from_memory(bytes)
            .map_err(|e| StoreError::InvalidImage(format!("Failed to decode image: {e}")))?;

        let quality = jpeg_quality(quality.unwrap_or(self.config.default_quality));
        let mut encoded = Vec::new();
        image::DynamicImage::from(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, quality))
            .map_err(|e| StoreError::InvalidImage(format!("Failed to encode JPEG: {e}")))?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &encoded)?;
        std::fs::rename(&tmp, &path)?;

        tracing::debug!(image = %image_name, bytes = encoded.len(), quality, "Saved image");
        Ok(SaveOutcome {
            success: true,
            image_name,
        })
    }

    /// Remove an image. Returns whether a file was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty name or a failed removal.
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of all stored images, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .entries()?
            .into_iter()
            .filter_map(|(path, _)| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(decode_filename)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Remove images older than the configured retention window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be read.
    pub fn cleanup(&self) -> Result<usize, StoreError> {
        self.cleanup_older_than(self.config.retention)
    }

    /// Remove images whose modification time is more than `age` ago.
    ///
    /// Files that cannot be removed are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be read.
    pub fn cleanup_older_than(&self, age: Duration) -> Result<usize, StoreError> {
        let now = SystemTime::now();
        let mut removed = 0;
        for (path, modified) in self.entries()? {
            let expired = now
                .duration_since(modified)
                .is_ok_and(|elapsed| elapsed > age);
            if !expired {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove expired image {}: {e}", path.display()),
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Cleaned up expired images");
        }
        Ok(removed)
    }

    fn entries(&self) -> Result<Vec<(PathBuf, SystemTime)>, StoreError> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == EXTENSION) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            entries.push((path, modified));
        }
        Ok(entries)
    }
}

/// The store key for `name`: surrounding whitespace is dropped.
fn image_key(name: &str) -> Result<&str, StoreError> {
    let key = name.trim();
    if key.is_empty() {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(key)
}

/// Accept raw base64 or `data:<mime>;base64,<payload>`.
fn decode_payload(image_data: &str) -> Result<Vec<u8>, StoreError> {
    let trimmed = image_data.trim();
    let encoded = match trimmed.strip_prefix("data:") {
        Some(uri) => {
            let comma = uri.find(',').ok_or_else(|| {
                StoreError::InvalidImage("Invalid data URI: missing comma".to_string())
            })?;
            if !uri[..comma].contains(";base64") {
                return Err(StoreError::InvalidImage(
                    "Only base64 data URIs are supported".to_string(),
                ));
            }
            &uri[comma + 1..]
        }
        None => trimmed,
    };
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| StoreError::InvalidImage(format!("Failed to decode base64: {e}")))
}

/// Map 0..=1 onto the encoder's 1..=100 scale. Out-of-range values clamp.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn jpeg_quality(quality: f32) -> u8 {
    let quality = if quality.is_finite() { quality } else { DEFAULT_QUALITY };
    (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
}
