//! The recommendation pipeline: encode, search, threshold, filter, rank.
//!
//! [`Recommender`] ties the encoder, the shared similarity index, and
//! the result cache together. Query-based recommendations are cached;
//! item-based ones are cheap enough to recompute (no encoding step) and
//! are not. The cache is never invalidated implicitly; swapping in a
//! rebuilt index and dropping cached results are two separate calls so
//! the caller controls the consistency window.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheKey, CachedScores, ResultCache};
use crate::catalog::{Catalog, CatalogVersion, Item, ItemId};
use crate::config::SearchConfig;
use crate::error::{RecommendError, RecommendResult};
use crate::explain::{Explanation, explain_recommendation};
use crate::vector::{Score, SharedIndex, SimilarityIndex, VectorEncoder, cosine_similarity};

/// Metadata predicates applied after similarity ranking.
///
/// Filters narrow the candidate set; they never re-order it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    /// Genres the item must all carry (case-insensitive).
    pub genres: Vec<String>,
    /// Minimum average rating; when set, unrated items are excluded.
    pub min_rating: Option<f32>,
}

impl Filters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genres.is_empty() && self.min_rating.is_none()
    }

    /// Whether an item passes every predicate.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        if !self.genres.iter().all(|genre| item.has_genre(genre)) {
            return false;
        }
        match self.min_rating {
            None => true,
            // An unrated item cannot prove it meets the floor
            Some(floor) => item.rating.is_some_and(|rating| rating >= floor),
        }
    }

    /// Canonical form folded into the cache key: genre order and case
    /// never change the key.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut genres: Vec<String> = self
            .genres
            .iter()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty())
            .collect();
        genres.sort();
        genres.dedup();

        let rating = match self.min_rating {
            Some(floor) => format!("{floor}"),
            None => String::new(),
        };
        format!("genres={}|min_rating={rating}", genres.join(","))
    }
}

/// Per-request knobs; anything unset falls back to [`SearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct RecommendRequest {
    /// Number of results wanted.
    pub k: Option<usize>,
    /// Inclusive similarity threshold override.
    pub min_similarity: Option<f32>,
    pub filters: Filters,
}

impl RecommendRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    #[must_use]
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }
}

/// A single ranked recommendation.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub id: ItemId,
    pub title: String,
    pub author: String,
    pub genres: Vec<String>,
    pub rating: Option<f32>,
    pub score: Score,
}

impl Recommendation {
    fn from_item(item: &Item, score: Score) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            author: item.author.clone(),
            genres: item.genres.iter().cloned().collect(),
            rating: item.rating,
            score,
        }
    }
}

/// The outcome of a recommendation request.
#[derive(Debug, Clone)]
pub struct RecommendationResult {
    /// Ranked recommendations, best first.
    pub recommendations: Vec<Recommendation>,
    /// Catalog generation the scores were resolved against.
    pub catalog_version: CatalogVersion,
    /// Whether the scores came from the result cache.
    pub from_cache: bool,
}

/// The recommendation engine facade.
pub struct Recommender {
    encoder: Arc<dyn VectorEncoder>,
    index: SharedIndex,
    cache: Arc<dyn ResultCache>,
    config: SearchConfig,
}

impl Recommender {
    #[must_use]
    pub fn new(
        encoder: Arc<dyn VectorEncoder>,
        index: SharedIndex,
        cache: Arc<dyn ResultCache>,
        config: SearchConfig,
    ) -> Self {
        Self {
            encoder,
            index,
            cache,
            config,
        }
    }

    /// Recommends items for free-text query input.
    ///
    /// Pipeline: cache lookup, encode, overfetched k-NN search,
    /// inclusive threshold, metadata filters, truncate to k. An empty
    /// final set is [`RecommendError::NoResults`], not an empty success.
    /// Empty query text is not rejected; the encoder maps it to its
    /// degenerate unit vector and the pipeline runs as usual.
    pub fn recommend_by_query(
        &self,
        query: &str,
        request: &RecommendRequest,
    ) -> RecommendResult<RecommendationResult> {
        let (k, min_similarity) = self.resolve_parameters(request)?;

        let index = self.index.snapshot();
        let key = CacheKey::new(query, &request.filters.canonical(), k, min_similarity);

        if let Some(scores) = self.cache.get(&key)
            && let Some(recommendations) = resolve_cached(&scores, index.catalog().as_ref())
        {
            debug!(query, "serving recommendations from cache");
            return Ok(RecommendationResult {
                recommendations,
                catalog_version: index.version(),
                from_cache: true,
            });
        }

        let query_vector = self
            .encoder
            .encode(query)
            .map_err(|e| RecommendError::Encoding(e.to_string()))?;

        let ranked = self.rank(&index, &query_vector, k, min_similarity, &request.filters, None)?;

        let cached: CachedScores = ranked.iter().map(|r| (r.id, r.score)).collect();
        self.cache.put(&key, cached);

        info!(query, results = ranked.len(), "query recommendations computed");
        Ok(RecommendationResult {
            recommendations: ranked,
            catalog_version: index.version(),
            from_cache: false,
        })
    }

    /// Recommends items similar to an existing catalog item.
    ///
    /// The seed item itself is always excluded. Results are not cached;
    /// there is no encoding step to amortize.
    pub fn recommend_by_item(
        &self,
        id: ItemId,
        request: &RecommendRequest,
    ) -> RecommendResult<RecommendationResult> {
        let (k, min_similarity) = self.resolve_parameters(request)?;

        let index = self.index.snapshot();
        let seed = index
            .catalog()
            .get(id)
            .ok_or(RecommendError::ItemNotFound { id })?;
        let seed_vector = seed.vector.clone();

        let ranked = self.rank(
            &index,
            &seed_vector,
            k,
            min_similarity,
            &request.filters,
            Some(id),
        )?;

        info!(item = %id, results = ranked.len(), "item recommendations computed");
        Ok(RecommendationResult {
            recommendations: ranked,
            catalog_version: index.version(),
            from_cache: false,
        })
    }

    /// Explains why an item would be recommended for a query.
    ///
    /// Encodes the query, computes its similarity against the item's
    /// stored vector, and decomposes the match into rule-based feature
    /// contributions with a display summary.
    pub fn explain(&self, query: &str, id: ItemId) -> RecommendResult<Explanation> {
        let index = self.index.snapshot();
        let item = index
            .catalog()
            .get(id)
            .ok_or(RecommendError::ItemNotFound { id })?;

        let query_vector = self
            .encoder
            .encode(query)
            .map_err(|e| RecommendError::Encoding(e.to_string()))?;
        let score = Score::from_cosine(cosine_similarity(&query_vector, &item.vector));

        Ok(explain_recommendation(query, item, score))
    }

    /// Swaps in a freshly built index for a reloaded catalog.
    ///
    /// Cached results are left alone; call [`Self::invalidate_cache`]
    /// when stale results must not outlive the old catalog.
    pub fn rebuild(&self, catalog: Arc<Catalog>) -> RecommendResult<()> {
        let index = SimilarityIndex::build(catalog)?;
        self.index.replace(index);
        Ok(())
    }

    /// Drops every cached result across all tiers.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
        info!("result cache invalidated");
    }

    /// The catalog version currently being served.
    #[must_use]
    pub fn catalog_version(&self) -> CatalogVersion {
        self.index.snapshot().version()
    }

    fn resolve_parameters(&self, request: &RecommendRequest) -> RecommendResult<(usize, f32)> {
        let k = request.k.unwrap_or(self.config.default_k);
        if k == 0 {
            return Err(RecommendError::InvalidQuery {
                reason: "k must be greater than zero".to_string(),
            });
        }

        let min_similarity = request.min_similarity.unwrap_or(self.config.min_similarity);
        if !(-1.0..=1.0).contains(&min_similarity) {
            return Err(RecommendError::InvalidQuery {
                reason: format!("min_similarity {min_similarity} outside [-1.0, 1.0]"),
            });
        }

        Ok((k, min_similarity))
    }

    fn rank(
        &self,
        index: &SimilarityIndex,
        query_vector: &[f32],
        k: usize,
        min_similarity: f32,
        filters: &Filters,
        exclude: Option<ItemId>,
    ) -> RecommendResult<Vec<Recommendation>> {
        // Overfetch so thresholding and filters still leave k survivors
        let fetch = k
            .saturating_mul(self.config.overfetch_factor)
            .min(index.len())
            .max(1);

        let candidates = index.query(query_vector, fetch)?;
        let candidates = apply_threshold(candidates, min_similarity);

        let catalog = index.catalog();
        let mut seen = std::collections::HashSet::with_capacity(k);
        let mut recommendations = Vec::with_capacity(k);
        for (id, score) in candidates {
            if exclude == Some(id) || !seen.insert(id) {
                continue;
            }
            let Some(item) = catalog.get(id) else {
                continue;
            };
            if !filters.matches(item) {
                continue;
            }
            recommendations.push(Recommendation::from_item(item, score));
            if recommendations.len() == k {
                break;
            }
        }

        if recommendations.is_empty() {
            return Err(RecommendError::NoResults);
        }
        Ok(recommendations)
    }
}

/// Keeps candidates scoring at or above the threshold (inclusive).
fn apply_threshold(candidates: CachedScores, min_similarity: f32) -> CachedScores {
    candidates
        .into_iter()
        .filter(|(_, score)| score.get() >= min_similarity)
        .collect()
}

/// Resolves cached id/score pairs against the current catalog.
///
/// Returns `None` when any id no longer resolves, which turns the
/// lookup into a miss and forces recomputation.
fn resolve_cached(scores: &CachedScores, catalog: &Catalog) -> Option<Vec<Recommendation>> {
    scores
        .iter()
        .map(|&(id, score)| {
            catalog
                .get(id)
                .map(|item| Recommendation::from_item(item, score))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::catalog::ItemRecord;
    use crate::vector::{HashingEncoder, VectorDimension, VectorError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps an encoder and counts `encode_batch` calls, to prove cache
    /// hits skip encoding.
    struct CountingEncoder {
        inner: HashingEncoder,
        calls: AtomicUsize,
    }

    impl CountingEncoder {
        fn new(dimension: usize) -> Self {
            Self {
                inner: HashingEncoder::with_dimension(VectorDimension::new(dimension).unwrap()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl VectorEncoder for CountingEncoder {
        fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.encode_batch(texts)
        }

        fn dimension(&self) -> VectorDimension {
            self.inner.dimension()
        }
    }

    fn sample_records() -> Vec<ItemRecord> {
        vec![
            ItemRecord {
                id: 1,
                title: "Dragon Knight".to_string(),
                author: "Test Author".to_string(),
                description: "a dragon fights a knight".to_string(),
                genres: vec!["Fantasy".to_string()],
                rating: Some(4.5),
            },
            ItemRecord {
                id: 2,
                title: "Silent Galaxy".to_string(),
                author: "Test Author".to_string(),
                description: "a spaceship explores a galaxy".to_string(),
                genres: vec!["Science Fiction".to_string()],
                rating: Some(4.0),
            },
            ItemRecord {
                id: 3,
                title: "Knight Castle".to_string(),
                author: "Test Author".to_string(),
                description: "a knight battles a dragon in a castle".to_string(),
                genres: vec!["Fantasy".to_string()],
                rating: Some(3.5),
            },
        ]
    }

    fn build_recommender(
        encoder: Arc<dyn VectorEncoder>,
        records: &[ItemRecord],
        version: u64,
    ) -> Recommender {
        let catalog =
            Catalog::from_records(records, encoder.as_ref(), CatalogVersion::new(version))
                .unwrap();
        let index = SharedIndex::new(SimilarityIndex::build(catalog).unwrap());
        Recommender::new(
            encoder,
            index,
            Arc::new(MemoryCache::new(16, None)),
            SearchConfig::default(),
        )
    }

    fn sample_recommender() -> Recommender {
        let encoder: Arc<dyn VectorEncoder> =
            Arc::new(HashingEncoder::with_dimension(VectorDimension::new(64).unwrap()));
        build_recommender(encoder, &sample_records(), 1)
    }

    fn ids(result: &RecommendationResult) -> Vec<u32> {
        result.recommendations.iter().map(|r| r.id.get()).collect()
    }

    #[test]
    fn test_query_ranks_related_items() {
        let recommender = sample_recommender();

        let result = recommender
            .recommend_by_query("dragon versus knight", &RecommendRequest::new())
            .unwrap();

        // Both fantasy items pass the default threshold; the spaceship
        // shares no query tokens and is cut.
        assert_eq!(ids(&result), vec![1, 3]);
        assert!(result.recommendations[0].score > result.recommendations[1].score);
        assert!(!result.from_cache);
    }

    #[test]
    fn test_empty_query_runs_degenerate_path() {
        let recommender = sample_recommender();

        // The encoder maps "" to its fallback unit vector; the request
        // must flow through the pipeline instead of failing upfront.
        let result = recommender.recommend_by_query("", &RecommendRequest::new().with_k(5));
        match result {
            Ok(ok) => assert!(!ok.recommendations.is_empty()),
            Err(e) => assert!(matches!(e, RecommendError::NoResults)),
        }
    }

    #[test]
    fn test_zero_k_rejected() {
        let recommender = sample_recommender();

        let result = recommender
            .recommend_by_query("dragon", &RecommendRequest::new().with_k(0));
        assert!(matches!(
            result.unwrap_err(),
            RecommendError::InvalidQuery { .. }
        ));
    }

    #[test]
    fn test_genre_filter() {
        let recommender = sample_recommender();
        let request = RecommendRequest::new().with_filters(Filters {
            genres: vec!["fantasy".to_string()],
            min_rating: None,
        });

        let result = recommender
            .recommend_by_query("dragon versus knight", &request)
            .unwrap();
        assert_eq!(ids(&result), vec![1, 3]);

        let absent = RecommendRequest::new().with_filters(Filters {
            genres: vec!["horror".to_string()],
            min_rating: None,
        });
        let result = recommender.recommend_by_query("dragon versus knight", &absent);
        assert!(matches!(result.unwrap_err(), RecommendError::NoResults));
    }

    #[test]
    fn test_rating_filter_excludes_below_floor() {
        let recommender = sample_recommender();
        let request = RecommendRequest::new().with_filters(Filters {
            genres: vec![],
            min_rating: Some(4.0),
        });

        let result = recommender
            .recommend_by_query("dragon versus knight", &request)
            .unwrap();
        // Item 3 rates 3.5 and drops out
        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn test_k_truncates_results() {
        let recommender = sample_recommender();

        let result = recommender
            .recommend_by_query("dragon versus knight", &RecommendRequest::new().with_k(1))
            .unwrap();
        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn test_cache_hit_skips_encoding() {
        let encoder = Arc::new(CountingEncoder::new(64));
        let recommender = build_recommender(encoder.clone(), &sample_records(), 1);

        let first = recommender
            .recommend_by_query("dragon versus knight", &RecommendRequest::new())
            .unwrap();
        assert!(!first.from_cache);
        let calls_after_first = encoder.calls();

        let second = recommender
            .recommend_by_query("dragon versus knight", &RecommendRequest::new())
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(encoder.calls(), calls_after_first);
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_cache_distinguishes_parameters() {
        let recommender = sample_recommender();

        let all = recommender
            .recommend_by_query("dragon versus knight", &RecommendRequest::new())
            .unwrap();
        let one = recommender
            .recommend_by_query("dragon versus knight", &RecommendRequest::new().with_k(1))
            .unwrap();

        assert_eq!(ids(&all), vec![1, 3]);
        assert_eq!(ids(&one), vec![1]);
        assert!(!one.from_cache);
    }

    #[test]
    fn test_item_recommendation_excludes_seed() {
        let recommender = sample_recommender();

        let result = recommender
            .recommend_by_item(ItemId::new_unchecked(1), &RecommendRequest::new())
            .unwrap();

        assert!(!ids(&result).contains(&1));
        assert_eq!(result.recommendations[0].id.get(), 3);
    }

    #[test]
    fn test_item_recommendation_unknown_id() {
        let recommender = sample_recommender();

        let result =
            recommender.recommend_by_item(ItemId::new_unchecked(99), &RecommendRequest::new());
        assert!(matches!(
            result.unwrap_err(),
            RecommendError::ItemNotFound { .. }
        ));
    }

    #[test]
    fn test_explain_resolves_item_and_query_overlap() {
        use crate::explain::Confidence;

        let recommender = sample_recommender();

        let explanation = recommender
            .explain("dragon versus knight", ItemId::new_unchecked(1))
            .unwrap();

        assert!((70..=72).contains(&explanation.match_score));
        assert_eq!(explanation.confidence, Confidence::High);
        assert!(explanation.summary.contains("has keywords in description"));

        let missing = recommender.explain("dragon", ItemId::new_unchecked(99));
        assert!(matches!(
            missing.unwrap_err(),
            RecommendError::ItemNotFound { .. }
        ));
    }

    #[test]
    fn test_rebuild_without_invalidation_serves_stale_results() {
        let encoder: Arc<dyn VectorEncoder> =
            Arc::new(HashingEncoder::with_dimension(VectorDimension::new(64).unwrap()));
        let recommender = build_recommender(encoder.clone(), &sample_records(), 1);

        let first = recommender
            .recommend_by_query("dragon versus knight", &RecommendRequest::new())
            .unwrap();
        assert_eq!(ids(&first), vec![1, 3]);

        // Reload: item 3 is now about the sea, so a fresh ranking would
        // no longer include it.
        let mut reloaded = sample_records();
        reloaded[2].title = "Ocean Deep".to_string();
        reloaded[2].description = "whales sing beneath the waves".to_string();
        let catalog =
            Catalog::from_records(&reloaded, encoder.as_ref(), CatalogVersion::new(2)).unwrap();
        recommender.rebuild(catalog).unwrap();

        // Cache untouched: stale ranking still served
        let stale = recommender
            .recommend_by_query("dragon versus knight", &RecommendRequest::new())
            .unwrap();
        assert!(stale.from_cache);
        assert_eq!(ids(&stale), vec![1, 3]);

        // Explicit invalidation restores consistency
        recommender.invalidate_cache();
        let fresh = recommender
            .recommend_by_query("dragon versus knight", &RecommendRequest::new())
            .unwrap();
        assert!(!fresh.from_cache);
        assert_eq!(ids(&fresh), vec![1]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let exactly = vec![
            (ItemId::new_unchecked(1), Score::new(0.2).unwrap()),
            (ItemId::new_unchecked(2), Score::new(0.199).unwrap()),
            (ItemId::new_unchecked(3), Score::new(0.9).unwrap()),
        ];

        let kept = apply_threshold(exactly, 0.2);
        let kept_ids: Vec<u32> = kept.iter().map(|(id, _)| id.get()).collect();
        assert_eq!(kept_ids, vec![1, 3]);
    }

    #[test]
    fn test_filters_canonical_is_order_and_case_insensitive() {
        let a = Filters {
            genres: vec!["Fantasy".to_string(), "magic".to_string()],
            min_rating: Some(4.0),
        };
        let b = Filters {
            genres: vec!["MAGIC".to_string(), "fantasy".to_string()],
            min_rating: Some(4.0),
        };
        assert_eq!(a.canonical(), b.canonical());

        let c = Filters {
            genres: vec!["fantasy".to_string()],
            min_rating: None,
        };
        assert_ne!(a.canonical(), c.canonical());
    }
}
