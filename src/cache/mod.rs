//! Two-tier result caching for query-based recommendations.
//!
//! Cache lookups are keyed by the normalized query text together with
//! every parameter that changes the result set (k, threshold, filters),
//! so two requests hit the same entry only when they would produce the
//! same ranking. Cached values are id/score pairs, never full items;
//! item metadata is re-resolved against the current catalog on read.
//!
//! The cache is deliberately unaware of catalog rebuilds. Invalidation
//! is an explicit call by whoever swaps the index; see
//! [`crate::recommender::Recommender::invalidate_cache`].

pub mod memory;
pub mod tiered;

use thiserror::Error;

use crate::catalog::ItemId;
use crate::vector::Score;

pub use memory::MemoryCache;
pub use tiered::TieredCache;

/// Scores stored in the cache: ranked id/score pairs.
pub type CachedScores = Vec<(ItemId, Score)>;

/// Errors from cache construction and maintenance.
///
/// Read and write failures on a live cache are never surfaced as
/// errors; they degrade to misses.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error(
        "Cache I/O failed: {0}\nSuggestion: Check that the cache directory exists and is writable"
    )]
    Io(#[from] std::io::Error),
}

/// Canonical cache key for a query-based recommendation request.
///
/// Construction normalizes the query (lowercase, collapsed whitespace)
/// and folds in the parameters that affect the result, so equal keys
/// imply equal rankings against one catalog version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn new(query: &str, filters_canonical: &str, k: usize, min_similarity: f32) -> Self {
        let normalized = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        Self(format!(
            "q={normalized}|f={filters_canonical}|k={k}|t={min_similarity}"
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stable hash used for the disk tier's filenames.
    #[must_use]
    pub fn hash(&self) -> u64 {
        fnv1a_hash(self.0.as_bytes())
    }
}

/// Trait for result caches, allowing the memory tier to stand alone or
/// sit in front of the disk tier.
pub trait ResultCache: Send + Sync {
    /// Look up cached scores. A miss, an expired entry, and an I/O
    /// failure all return `None`.
    fn get(&self, key: &CacheKey) -> Option<CachedScores>;

    /// Store scores for a key. Idempotent: re-putting an existing key
    /// overwrites it.
    fn put(&self, key: &CacheKey, scores: CachedScores);

    /// Drop every entry in every tier.
    fn invalidate_all(&self);
}

/// FNV-1a hash for stable, portable cache filenames.
pub(crate) fn fnv1a_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET_BASIS;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
