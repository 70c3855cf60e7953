//! Snapshot metadata persisted alongside the vector file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::CatalogVersion;
use crate::storage::{SnapshotError, utc_timestamp};
use crate::vector::VectorDimension;

/// Current snapshot format version.
const CURRENT_VERSION: u32 = 1;

/// Filename within the snapshot directory.
const METADATA_FILE: &str = "metadata.json";

/// Metadata describing a persisted vector snapshot.
///
/// Checked on startup: a snapshot is only reused when its format
/// version, embedding model, and catalog version all match the current
/// configuration; any mismatch means re-encoding from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Snapshot format version for forward compatibility.
    pub version: u32,
    /// Embedding model that produced the stored vectors.
    pub model_name: String,
    pub dimension: usize,
    pub item_count: usize,
    /// Catalog generation the vectors were encoded from.
    pub catalog_version: u64,
    /// Unix timestamp of snapshot creation.
    pub created_at: u64,
    /// Unix timestamp of the last write.
    pub updated_at: u64,
}

impl SnapshotMetadata {
    #[must_use]
    pub fn new(
        model_name: impl Into<String>,
        dimension: VectorDimension,
        item_count: usize,
        catalog_version: CatalogVersion,
    ) -> Self {
        let now = utc_timestamp();
        Self {
            version: CURRENT_VERSION,
            model_name: model_name.into(),
            dimension: dimension.get(),
            item_count,
            catalog_version: catalog_version.get(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Loads metadata from a snapshot directory.
    pub fn load(dir: &Path) -> Result<Self, SnapshotError> {
        let path = dir.join(METADATA_FILE);
        let content = fs::read_to_string(&path)?;
        let metadata: Self =
            serde_json::from_str(&content).map_err(|e| SnapshotError::Corrupted {
                reason: format!("invalid metadata JSON: {e}"),
            })?;

        if metadata.version != CURRENT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: CURRENT_VERSION,
                actual: metadata.version,
            });
        }

        debug!(
            model = %metadata.model_name,
            items = metadata.item_count,
            catalog_version = metadata.catalog_version,
            "snapshot metadata loaded"
        );
        Ok(metadata)
    }

    /// Saves metadata into a snapshot directory, refreshing `updated_at`.
    pub fn save(&mut self, dir: &Path) -> Result<(), SnapshotError> {
        self.updated_at = utc_timestamp();
        let path = dir.join(METADATA_FILE);
        let content = serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Corrupted {
            reason: format!("failed to serialize metadata: {e}"),
        })?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Whether a metadata file exists in the directory.
    #[must_use]
    pub fn exists(dir: &Path) -> bool {
        dir.join(METADATA_FILE).exists()
    }

    /// Whether this snapshot can serve the given catalog generation and
    /// model without re-encoding.
    #[must_use]
    pub fn is_current(&self, catalog_version: CatalogVersion, model_name: &str) -> bool {
        self.catalog_version == catalog_version.get() && self.model_name == model_name
    }
}
