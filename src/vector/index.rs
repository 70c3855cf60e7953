//! Nearest-neighbor similarity index over the catalog vectors.
//!
//! The index is immutable after build. A catalog change means building
//! a fresh index and atomically swapping it into [`SharedIndex`], so
//! readers always observe one complete index version and writers never
//! block queries.

use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::info;

use crate::catalog::{Catalog, CatalogVersion, ItemId};
use crate::error::{RecommendError, RecommendResult};
use crate::vector::{Score, VectorDimension};

/// Immutable-after-build k-nearest-neighbor index.
///
/// Holds a read-only view of every catalog vector and answers top-k
/// queries by cosine similarity (dot product; all vectors are unit
/// norm). Ties are broken by ascending item id for determinism.
#[derive(Debug)]
pub struct SimilarityIndex {
    catalog: Arc<Catalog>,
    entries: Vec<(ItemId, Vec<f32>)>,
}

impl SimilarityIndex {
    /// Builds an index from a loaded catalog. Total replace; never an
    /// incremental mutation.
    ///
    /// Fails with [`RecommendError::IndexBuild`] if the catalog is empty
    /// or any vector's dimension does not match the catalog dimension.
    pub fn build(catalog: Arc<Catalog>) -> RecommendResult<Self> {
        if catalog.is_empty() {
            return Err(RecommendError::IndexBuild {
                reason: "catalog contains no items".to_string(),
            });
        }

        let dimension = catalog.dimension();
        let mut entries = Vec::with_capacity(catalog.len());
        for item in catalog.items() {
            dimension
                .validate_vector(&item.vector)
                .map_err(|e| RecommendError::IndexBuild {
                    reason: format!("item {}: {e}", item.id),
                })?;
            entries.push((item.id, item.vector.clone()));
        }

        info!(
            items = entries.len(),
            version = catalog.version().get(),
            "similarity index built"
        );

        Ok(Self { catalog, entries })
    }

    /// Returns the `k` nearest items to `query` by cosine similarity,
    /// highest first, ties broken by ascending item id.
    ///
    /// Fails with [`RecommendError::InvalidQuery`] when `k` is zero or
    /// the query dimension does not match the index.
    pub fn query(&self, query: &[f32], k: usize) -> RecommendResult<Vec<(ItemId, Score)>> {
        if k == 0 {
            return Err(RecommendError::InvalidQuery {
                reason: "k must be greater than zero".to_string(),
            });
        }
        self.catalog
            .dimension()
            .validate_vector(query)
            .map_err(|e| RecommendError::InvalidQuery {
                reason: e.to_string(),
            })?;

        let mut candidates: Vec<(ItemId, Score)> = self
            .entries
            .par_iter()
            .map(|(id, vector)| (*id, Score::from_cosine(dot_product(query, vector))))
            .collect();

        candidates.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.truncate(k);

        Ok(candidates)
    }

    /// The catalog this index was built from.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// The catalog version this index serves.
    #[must_use]
    pub fn version(&self) -> CatalogVersion {
        self.catalog.version()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.catalog.dimension()
    }
}

/// Handle to the current index generation, shared across request workers.
///
/// Readers take a snapshot (an `Arc` clone) and run the whole request
/// against it; `replace` swaps in a fully built successor. The write
/// lock is held only for the pointer swap, so in-flight readers are
/// never blocked and never observe a torn index.
#[derive(Debug, Clone)]
pub struct SharedIndex {
    inner: Arc<RwLock<Arc<SimilarityIndex>>>,
}

impl SharedIndex {
    #[must_use]
    pub fn new(index: SimilarityIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// The current index generation. The returned snapshot stays valid
    /// for the caller even if a rebuild swaps in a successor.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SimilarityIndex> {
        self.inner.read().clone()
    }

    /// Atomically replaces the index with a fully built successor.
    pub fn replace(&self, index: SimilarityIndex) {
        let version = index.version();
        *self.inner.write() = Arc::new(index);
        info!(version = version.get(), "similarity index swapped");
    }
}

#[inline]
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemRecord;
    use crate::vector::{HashingEncoder, VectorEncoder};

    fn test_catalog(descriptions: &[&str]) -> Arc<Catalog> {
        let encoder = HashingEncoder::with_dimension(VectorDimension::new(64).unwrap());
        let records: Vec<ItemRecord> = descriptions
            .iter()
            .enumerate()
            .map(|(i, description)| ItemRecord {
                id: (i + 1) as u32,
                title: format!("Book {}", i + 1),
                author: "Author".to_string(),
                description: description.to_string(),
                genres: vec![],
                rating: None,
            })
            .collect();
        Catalog::from_records(&records, &encoder, CatalogVersion::new(1)).unwrap()
    }

    #[test]
    fn test_build_rejects_empty_catalog() {
        let encoder = HashingEncoder::with_dimension(VectorDimension::new(16).unwrap());
        let catalog = Catalog::from_records(&[], &encoder, CatalogVersion::new(1)).unwrap();

        let result = SimilarityIndex::build(catalog);
        assert!(matches!(
            result.unwrap_err(),
            RecommendError::IndexBuild { .. }
        ));
    }

    #[test]
    fn test_query_rejects_zero_k() {
        let catalog = test_catalog(&["one", "two"]);
        let index = SimilarityIndex::build(catalog.clone()).unwrap();

        let query = catalog.items()[0].vector.clone();
        let result = index.query(&query, 0);
        assert!(matches!(
            result.unwrap_err(),
            RecommendError::InvalidQuery { .. }
        ));
    }

    #[test]
    fn test_query_rejects_dimension_mismatch() {
        let catalog = test_catalog(&["one", "two"]);
        let index = SimilarityIndex::build(catalog).unwrap();

        let result = index.query(&[0.5; 8], 3);
        assert!(matches!(
            result.unwrap_err(),
            RecommendError::InvalidQuery { .. }
        ));
    }

    #[test]
    fn test_query_sorted_bounded_unique() {
        let catalog = test_catalog(&[
            "dragons and castles",
            "dragons and wizards",
            "spaceships and lasers",
            "oceans and whales",
        ]);
        let index = SimilarityIndex::build(catalog.clone()).unwrap();

        let query = catalog.items()[0].vector.clone();
        let results = index.query(&query, 3).unwrap();

        assert!(results.len() <= 3);
        for window in results.windows(2) {
            assert!(window[0].1 >= window[1].1, "results must be sorted");
        }

        let ids: std::collections::HashSet<ItemId> =
            results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids.len(), results.len(), "no duplicate ids");

        // Self-match ranks first
        assert_eq!(results[0].0, ItemId::new(1).unwrap());
        assert!((results[0].1.get() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_tie_break_by_ascending_id() {
        // Two items with identical text produce identical vectors
        let encoder = HashingEncoder::with_dimension(VectorDimension::new(64).unwrap());
        let twin = |id: u32| ItemRecord {
            id,
            title: "Twin".to_string(),
            author: "Author".to_string(),
            description: "same words here".to_string(),
            genres: vec![],
            rating: None,
        };
        let records = vec![
            twin(1),
            twin(2),
            ItemRecord {
                id: 3,
                title: "Other".to_string(),
                author: "Author".to_string(),
                description: "different entirely".to_string(),
                genres: vec![],
                rating: None,
            },
        ];
        let catalog =
            Catalog::from_records(&records, &encoder, CatalogVersion::new(1)).unwrap();
        let index = SimilarityIndex::build(catalog.clone()).unwrap();

        let query = catalog.items()[1].vector.clone();
        let results = index.query(&query, 2).unwrap();

        assert_eq!(results[0].1, results[1].1);
        assert_eq!(results[0].0, ItemId::new(1).unwrap());
        assert_eq!(results[1].0, ItemId::new(2).unwrap());
    }

    #[test]
    fn test_shared_index_swap() {
        let catalog_v1 = test_catalog(&["first generation"]);
        let shared = SharedIndex::new(SimilarityIndex::build(catalog_v1).unwrap());

        let before = shared.snapshot();
        assert_eq!(before.version().get(), 1);

        let encoder = HashingEncoder::with_dimension(VectorDimension::new(64).unwrap());
        let records = vec![
            ItemRecord {
                id: 1,
                title: "Replacement".to_string(),
                author: "Author".to_string(),
                description: "second generation".to_string(),
                genres: vec![],
                rating: None,
            },
            ItemRecord {
                id: 2,
                title: "Addition".to_string(),
                author: "Author".to_string(),
                description: "also second generation".to_string(),
                genres: vec![],
                rating: None,
            },
        ];
        let catalog_v2 =
            Catalog::from_records(&records, &encoder, CatalogVersion::new(2)).unwrap();
        shared.replace(SimilarityIndex::build(catalog_v2).unwrap());

        // The old snapshot is still fully usable; new snapshots see v2.
        assert_eq!(before.version().get(), 1);
        assert_eq!(before.len(), 1);

        let after = shared.snapshot();
        assert_eq!(after.version().get(), 2);
        assert_eq!(after.len(), 2);
    }
}
