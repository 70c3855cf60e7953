//! Configuration management with layered settings.
//!
//! Layering, lowest priority first: built-in defaults, a
//! `shelfwise.toml` file, then `SHELFWISE_`-prefixed environment
//! variables (with `__` separating nesting levels, e.g.
//! `SHELFWISE_SEARCH__DEFAULT_K=5`). Every setting has a usable
//! default; a missing config file is not an error.

use std::fs;
use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RecommendError, RecommendResult};

/// Default config filename looked up in the working directory.
pub const CONFIG_FILE: &str = "shelfwise.toml";

/// Top-level settings for the recommendation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Settings schema version for future migrations.
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
            clustering: ClusteringConfig::default(),
        }
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model identifier, recorded in snapshot metadata.
    #[serde(default = "default_model")]
    pub model: String,

    /// Expected embedding dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Directory for downloaded model files.
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: String,
}

fn default_model() -> String {
    "AllMiniLML6V2".to_string()
}

fn default_dimension() -> usize {
    crate::vector::VECTOR_DIMENSION_384
}

fn default_model_cache_dir() -> String {
    ".shelfwise/models".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            dimension: default_dimension(),
            model_cache_dir: default_model_cache_dir(),
        }
    }
}

/// Search and ranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Result count when the request does not specify one.
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Inclusive similarity threshold for returned results.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// Candidate overfetch multiplier applied before filtering.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
}

fn default_k() -> usize {
    10
}

fn default_min_similarity() -> f32 {
    0.2
}

fn default_overfetch_factor() -> usize {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            min_similarity: default_min_similarity(),
            overfetch_factor: default_overfetch_factor(),
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum entries in the memory tier.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Optional TTL in seconds for memory tier entries.
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Directory for the disk tier; `None` disables it.
    #[serde(default)]
    pub disk_path: Option<String>,
}

fn default_cache_capacity() -> usize {
    256
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: None,
            disk_path: None,
        }
    }
}

/// Catalog clustering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default = "default_num_clusters")]
    pub num_clusters: usize,

    /// RNG seed; a fixed default keeps fits reproducible across runs.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_num_clusters() -> usize {
    20
}

fn default_seed() -> u64 {
    42
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            num_clusters: default_num_clusters(),
            seed: default_seed(),
        }
    }
}

impl Settings {
    /// Loads settings from defaults, `shelfwise.toml`, and environment.
    pub fn load() -> RecommendResult<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Loads settings with an explicit config file path.
    pub fn load_from(path: &Path) -> RecommendResult<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SHELFWISE_").split("__"))
            .extract()
            .map_err(|e| RecommendError::Config {
                reason: e.to_string(),
            })?;

        settings.validate()?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Writes the current settings as TOML.
    pub fn save(&self, path: &Path) -> RecommendResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| RecommendError::Config {
            reason: format!("failed to serialize settings: {e}"),
        })?;
        fs::write(path, content).map_err(|e| RecommendError::Config {
            reason: format!("failed to write {}: {e}", path.display()),
        })?;
        Ok(())
    }

    /// Rejects settings no component can run with.
    pub fn validate(&self) -> RecommendResult<()> {
        if self.search.default_k == 0 {
            return Err(RecommendError::Config {
                reason: "search.default_k must be at least 1".to_string(),
            });
        }
        if self.search.overfetch_factor == 0 {
            return Err(RecommendError::Config {
                reason: "search.overfetch_factor must be at least 1".to_string(),
            });
        }
        if !(-1.0..=1.0).contains(&self.search.min_similarity) {
            return Err(RecommendError::Config {
                reason: "search.min_similarity must be in [-1.0, 1.0]".to_string(),
            });
        }
        if self.embedding.dimension == 0 {
            return Err(RecommendError::Config {
                reason: "embedding.dimension must be at least 1".to_string(),
            });
        }
        if self.clustering.num_clusters == 0 {
            return Err(RecommendError::Config {
                reason: "clustering.num_clusters must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.embedding.model, "AllMiniLML6V2");
        assert_eq!(settings.embedding.dimension, 384);
        assert_eq!(settings.search.default_k, 10);
        assert_eq!(settings.search.min_similarity, 0.2);
        assert_eq!(settings.search.overfetch_factor, 3);
        assert_eq!(settings.cache.capacity, 256);
        assert_eq!(settings.clustering.num_clusters, 20);
        assert_eq!(settings.clustering.seed, 42);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let settings = Settings::load_from(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(settings.search.default_k, 10);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("shelfwise.toml");
        fs::write(
            &path,
            r#"
[search]
default_k = 5
min_similarity = 0.4

[clustering]
seed = 7
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.search.default_k, 5);
        assert_eq!(settings.search.min_similarity, 0.4);
        assert_eq!(settings.clustering.seed, 7);
        // Untouched sections keep their defaults
        assert_eq!(settings.search.overfetch_factor, 3);
        assert_eq!(settings.cache.capacity, 256);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("shelfwise.toml");

        let mut settings = Settings::default();
        settings.search.default_k = 25;
        settings.cache.disk_path = Some(".shelfwise/cache".to_string());
        settings.save(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.search.default_k, 25);
        assert_eq!(loaded.cache.disk_path.as_deref(), Some(".shelfwise/cache"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.search.default_k = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.search.min_similarity = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.search.overfetch_factor = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.clustering.num_clusters = 0;
        assert!(settings.validate().is_err());
    }
}
