//! Error types for the recommendation core.
//!
//! This module provides structured error types using thiserror with
//! actionable messages. Recoverable outcomes (`ItemNotFound`,
//! `NoResults`) get their own variants so callers can render an empty
//! state instead of an error page.

use thiserror::Error;

use crate::cache::CacheError;
use crate::catalog::ItemId;
use crate::storage::SnapshotError;
use crate::vector::{ClusteringError, VectorError};

/// Main error type for recommendation operations.
#[derive(Error, Debug)]
pub enum RecommendError {
    /// Empty or malformed catalog at build time. Fatal to startup; a
    /// partial index must never be served.
    #[error(
        "Failed to build similarity index: {reason}\nSuggestion: Check that the catalog is non-empty and all vectors share one dimension"
    )]
    IndexBuild { reason: String },

    /// Bad query parameters (k = 0, dimension mismatch). A caller bug,
    /// surfaced immediately.
    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// Unknown id in item-based recommendation. Recoverable; surface as
    /// a user-facing "not found".
    #[error("Item {id} not found in catalog\nSuggestion: The catalog may have been reloaded; verify the id against the current version")]
    ItemNotFound { id: ItemId },

    /// Thresholding and filters eliminated every candidate. Recoverable
    /// and distinct from a system fault.
    #[error("No items passed the similarity threshold and filters")]
    NoResults,

    /// The underlying embedding call failed. Treated as transient; the
    /// calling layer may retry with backoff.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Clustering(#[from] ClusteringError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl RecommendError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that serving layers can use in JSON
    /// responses for programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::IndexBuild { .. } => "INDEX_BUILD_ERROR",
            Self::InvalidQuery { .. } => "INVALID_QUERY",
            Self::ItemNotFound { .. } => "ITEM_NOT_FOUND",
            Self::NoResults => "NO_RESULTS",
            Self::Encoding(_) => "ENCODING_ERROR",
            Self::Vector(_) => "VECTOR_ERROR",
            Self::Clustering(_) => "CLUSTERING_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Snapshot(_) => "SNAPSHOT_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }

    /// Whether the condition is recoverable from the caller's point of
    /// view (render an empty state or retry) rather than a system fault.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ItemNotFound { .. } | Self::NoResults | Self::Encoding(_)
        )
    }
}

/// Result type alias for recommendation operations.
pub type RecommendResult<T> = Result<T, RecommendError>;
