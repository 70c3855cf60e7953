//! Disk-backed cache tier layered behind the memory tier.
//!
//! Disk entries are JSON files named by the FNV-1a hash of the cache
//! key, with the full key stored inside the file so a hash collision
//! reads as a miss instead of serving another query's scores. Disk
//! failures never fail a request; they log a warning and degrade to
//! recomputation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheError, CacheKey, CachedScores, MemoryCache, ResultCache};

#[derive(Serialize, Deserialize)]
struct DiskEntry {
    /// Full cache key, checked on read to reject hash collisions.
    key: String,
    scores: CachedScores,
}

/// Memory tier in front of a JSON-on-disk tier.
///
/// Reads check memory first, then disk; a disk hit is promoted into
/// memory. Writes go to both tiers.
pub struct TieredCache {
    memory: MemoryCache,
    dir: PathBuf,
}

impl TieredCache {
    /// Creates the cache, creating the disk directory if needed.
    pub fn new(memory: MemoryCache, dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { memory, dir })
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{:016x}.json", key.hash()))
    }

    fn read_disk(&self, key: &CacheKey) -> Option<CachedScores> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }

        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache file");
                return None;
            }
        };

        let entry: DiskEntry = match serde_json::from_str(&data) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache file, ignoring");
                return None;
            }
        };

        if entry.key != key.as_str() {
            debug!(path = %path.display(), "cache filename hash collision, treating as miss");
            return None;
        }

        Some(entry.scores)
    }

    fn write_disk(&self, key: &CacheKey, scores: &CachedScores) {
        let entry = DiskEntry {
            key: key.as_str().to_string(),
            scores: scores.clone(),
        };
        let path = self.entry_path(key);

        match serde_json::to_string(&entry) {
            Ok(json) => {
                if let Err(e) = fs::write(&path, json) {
                    warn!(path = %path.display(), error = %e, "failed to write cache file");
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to serialize cache entry");
            }
        }
    }

    fn clear_disk(&self) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "failed to list cache directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Err(e) = fs::remove_file(&path)
            {
                warn!(path = %path.display(), error = %e, "failed to remove cache file");
            }
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ResultCache for TieredCache {
    fn get(&self, key: &CacheKey) -> Option<CachedScores> {
        if let Some(scores) = self.memory.get(key) {
            return Some(scores);
        }

        let scores = self.read_disk(key)?;
        // Promote so the next read skips the disk
        self.memory.put(key, scores.clone());
        Some(scores)
    }

    fn put(&self, key: &CacheKey, scores: CachedScores) {
        self.write_disk(key, &scores);
        self.memory.put(key, scores);
    }

    fn invalidate_all(&self) {
        self.memory.invalidate_all();
        self.clear_disk();
    }
}
