//! Last-known data dictionaries, persisted for out-of-process renderers.
//!
//! One JSON file per activity, named after the percent-encoded id. Files are
//! written whole (temp file then rename) so a reader never sees a partial
//! dictionary.

use std::path::{Path, PathBuf};

use liveboard_core::ValueMap;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::paths::{current_timestamp_ms, decode_filename, encode_filename};
use crate::record::ActivityId;

/// A persisted data dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Owning activity.
    pub activity_id: ActivityId,
    /// Data dictionary as last pushed.
    pub data: ValueMap,
    /// Write time (ms since epoch).
    pub updated_at_ms: u64,
}

/// Directory-backed snapshot storage.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open a store rooted at `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Store root.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &ActivityId) -> PathBuf {
        self.dir
            .join(format!("{}.json", encode_filename(id.as_str())))
    }

    /// Replace the snapshot for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, id: &ActivityId, data: &ValueMap) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            activity_id: id.clone(),
            data: data.clone(),
            updated_at_ms: current_timestamp_ms(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;
        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Read the snapshot for `id`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read(&self, id: &ActivityId) -> Result<Option<Snapshot>, StoreError> {
        let path = self.path_for(id);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the snapshot for `id`. Missing files are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if removal fails for another reason.
    pub fn remove(&self, id: &ActivityId) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of every stored snapshot, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be read.
    pub fn ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_filename)
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}
