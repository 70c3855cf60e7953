//! Persistent snapshots of the encoded catalog.
//!
//! A snapshot is the pair of a JSON metadata file and a binary vector
//! file, written together after a catalog load so later startups can
//! skip re-encoding when the catalog version and model match.

pub mod metadata;
pub mod vectors;

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

pub use metadata::SnapshotMetadata;
pub use vectors::VectorSnapshot;

/// Errors from snapshot reading and writing.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Snapshot file is corrupted: {reason}\nSuggestion: Delete the snapshot and let it regenerate from the catalog"
    )]
    Corrupted { reason: String },

    #[error(
        "Snapshot format version mismatch: expected {expected}, found {actual}\nSuggestion: Delete the snapshot and let it regenerate"
    )]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Snapshot dimension mismatch: expected {expected}, found {actual}\nSuggestion: The embedding model changed; regenerate the snapshot")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Snapshot contains invalid item id {0}; ids must be non-zero")]
    InvalidId(u32),
}

/// Seconds since the Unix epoch, for snapshot timestamps.
pub(crate) fn utc_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
