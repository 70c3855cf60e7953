//! Shelfwise: an embedding-based book recommendation engine.
//!
//! The pipeline encodes free-text queries and catalog items into
//! unit-norm embedding vectors, ranks items by cosine similarity
//! through an immutable k-NN index, applies an inclusive similarity
//! threshold and metadata filters, and caches query results across a
//! memory and an optional disk tier. Seeded K-means clustering groups
//! the catalog into named thematic collections.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shelfwise::cache::MemoryCache;
//! use shelfwise::catalog::{Catalog, CatalogVersion, ItemRecord};
//! use shelfwise::config::Settings;
//! use shelfwise::recommender::{RecommendRequest, Recommender};
//! use shelfwise::vector::{FastEmbedEncoder, SharedIndex, SimilarityIndex, VectorEncoder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! let encoder: Arc<dyn VectorEncoder> =
//!     Arc::new(FastEmbedEncoder::new(&settings.embedding.model_cache_dir)?);
//!
//! let records: Vec<ItemRecord> = vec![/* cleaned catalog rows */];
//! let catalog = Catalog::from_records(&records, encoder.as_ref(), CatalogVersion::new(1))?;
//! let index = SharedIndex::new(SimilarityIndex::build(catalog)?);
//!
//! let recommender = Recommender::new(
//!     encoder,
//!     index,
//!     Arc::new(MemoryCache::new(settings.cache.capacity, None)),
//!     settings.search,
//! );
//!
//! let result = recommender.recommend_by_query("dragons and ancient magic", &RecommendRequest::new())?;
//! for rec in &result.recommendations {
//!     println!("{} ({:.2})", rec.title, rec.score.get());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod explain;
pub mod logging;
pub mod recommender;
pub mod storage;
pub mod vector;

pub use cache::{CacheError, CacheKey, CachedScores, MemoryCache, ResultCache, TieredCache};
pub use catalog::{Catalog, CatalogVersion, Item, ItemId, ItemRecord};
pub use config::Settings;
pub use error::{RecommendError, RecommendResult};
pub use explain::{Confidence, ContributionScores, Explanation, explain_recommendation};
pub use recommender::{
    Filters, RecommendRequest, Recommendation, RecommendationResult, Recommender,
};
pub use storage::{SnapshotError, SnapshotMetadata, VectorSnapshot};
pub use vector::{
    Cluster, ClusterEngine, ClusterId, ClusteringError, FastEmbedEncoder, HashingEncoder, Score,
    SharedIndex, SimilarityIndex, VectorDimension, VectorEncoder, VectorError,
};
