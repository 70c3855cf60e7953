//! Catalog types: immutable item entries and the loaded catalog.
//!
//! A catalog is built once from cleaned records supplied by the data
//! preparation layer, encoded in a single batch pass, and never mutated
//! afterwards. A catalog change always means a full reload under a new
//! [`CatalogVersion`].

use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroU32;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RecommendError, RecommendResult};
use crate::vector::{VectorDimension, VectorEncoder};

/// Type-safe wrapper for item IDs.
///
/// Uses `NonZeroU32` internally for space optimization and to ensure
/// item IDs are never zero (which could indicate uninitialized state).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ItemId(NonZeroU32);

impl ItemId {
    /// Creates a new `ItemId` from a non-zero u32.
    ///
    /// Returns `None` if the provided ID is zero.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Creates a new `ItemId` from a non-zero u32, panicking if zero.
    ///
    /// # Panics
    /// Panics if `id` is zero. Use `new()` for fallible construction.
    #[must_use]
    pub fn new_unchecked(id: u32) -> Self {
        Self(NonZeroU32::new(id).expect("ItemId cannot be zero"))
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic identifier for a loaded catalog generation.
///
/// Item IDs are only meaningful relative to a catalog version; cached
/// results from one version must never be served against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogVersion(u64);

impl CatalogVersion {
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CatalogVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cleaned catalog record as handed over by the data preparation layer.
///
/// The core does not parse raw files; it consumes rows that have already
/// been cleaned and deduplicated upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Unique, stable, non-zero identifier.
    pub id: u32,
    pub title: String,
    pub author: String,
    /// Free text used for embedding.
    pub description: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub rating: Option<f32>,
}

/// An immutable catalog entry with its embedding vector attached.
///
/// Created once during catalog load, never mutated, destroyed only on a
/// full catalog reload.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Lower-cased genre set for exact predicate matching.
    pub genres: BTreeSet<String>,
    pub rating: Option<f32>,
    /// Unit-L2-norm embedding of the item's combined text.
    pub vector: Vec<f32>,
}

impl Item {
    /// Whether this item carries the given genre (case-insensitive).
    #[must_use]
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.contains(&genre.trim().to_lowercase())
    }
}

/// The loaded, immutable item catalog.
#[derive(Debug)]
pub struct Catalog {
    items: Vec<Item>,
    by_id: HashMap<ItemId, usize>,
    dimension: VectorDimension,
    version: CatalogVersion,
}

impl Catalog {
    /// Builds a catalog from cleaned records, batch-encoding every item
    /// exactly once.
    ///
    /// Fails with [`RecommendError::IndexBuild`] on malformed input: a
    /// zero id, a duplicate id, or an encoder output whose dimension
    /// does not match the encoder's declared dimension.
    pub fn from_records(
        records: &[ItemRecord],
        encoder: &dyn VectorEncoder,
        version: CatalogVersion,
    ) -> RecommendResult<Arc<Self>> {
        let dimension = encoder.dimension();

        let texts: Vec<String> = records.iter().map(embedding_text).collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = encoder
            .encode_batch(&text_refs)
            .map_err(|e| RecommendError::Encoding(e.to_string()))?;

        let mut items = Vec::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());

        for (record, vector) in records.iter().zip(vectors) {
            let id = ItemId::new(record.id).ok_or_else(|| RecommendError::IndexBuild {
                reason: format!("item '{}' has id 0; ids must be non-zero", record.title),
            })?;

            dimension
                .validate_vector(&vector)
                .map_err(|e| RecommendError::IndexBuild {
                    reason: format!("item {id}: {e}"),
                })?;

            let genres = record
                .genres
                .iter()
                .map(|g| g.trim().to_lowercase())
                .filter(|g| !g.is_empty())
                .collect();

            if by_id.insert(id, items.len()).is_some() {
                return Err(RecommendError::IndexBuild {
                    reason: format!("duplicate item id {id}"),
                });
            }

            items.push(Item {
                id,
                title: record.title.clone(),
                author: record.author.clone(),
                description: record.description.clone(),
                genres,
                rating: record.rating,
                vector,
            });
        }

        info!(
            items = items.len(),
            version = version.get(),
            "catalog loaded"
        );

        Ok(Arc::new(Self {
            items,
            by_id,
            dimension,
            version,
        }))
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.by_id.get(&id).map(|&idx| &self.items[idx])
    }

    /// All items in load order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn version(&self) -> CatalogVersion {
        self.version
    }
}

/// Combined text used for embedding, with the title repeated to weight it
/// above the description and genre list.
fn embedding_text(record: &ItemRecord) -> String {
    let title = record.title.trim().to_lowercase();
    format!(
        "{title} {title} {title} by {}. genres: {}. description: {}",
        record.author.trim().to_lowercase(),
        record
            .genres
            .iter()
            .map(|g| g.trim().to_lowercase())
            .collect::<Vec<_>>()
            .join(", "),
        record.description.trim().to_lowercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::HashingEncoder;

    fn record(id: u32, title: &str, description: &str) -> ItemRecord {
        ItemRecord {
            id,
            title: title.to_string(),
            author: "Test Author".to_string(),
            description: description.to_string(),
            genres: vec!["Fantasy".to_string()],
            rating: Some(4.0),
        }
    }

    #[test]
    fn test_item_id_construction() {
        let id = ItemId::new(42).unwrap();
        assert_eq!(id.get(), 42);

        assert!(ItemId::new(0).is_none());

        let id = ItemId::new_unchecked(100);
        assert_eq!(id.get(), 100);
    }

    #[test]
    fn test_catalog_load_and_lookup() {
        let encoder = HashingEncoder::with_dimension(VectorDimension::new(64).unwrap());
        let records = vec![
            record(1, "First Book", "a story about a wizard"),
            record(2, "Second Book", "a story about a detective"),
        ];

        let catalog =
            Catalog::from_records(&records, &encoder, CatalogVersion::new(1)).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.version().get(), 1);

        let item = catalog.get(ItemId::new(1).unwrap()).unwrap();
        assert_eq!(item.title, "First Book");
        assert_eq!(item.vector.len(), 64);
        assert!(item.has_genre("fantasy"));
        assert!(item.has_genre("Fantasy"));
        assert!(!item.has_genre("horror"));

        assert!(catalog.get(ItemId::new(99).unwrap()).is_none());
    }

    #[test]
    fn test_catalog_rejects_zero_id() {
        let encoder = HashingEncoder::with_dimension(VectorDimension::new(16).unwrap());
        let records = vec![record(0, "Broken", "no id")];

        let result = Catalog::from_records(&records, &encoder, CatalogVersion::new(1));
        assert!(matches!(
            result.unwrap_err(),
            RecommendError::IndexBuild { .. }
        ));
    }

    #[test]
    fn test_catalog_rejects_duplicate_id() {
        let encoder = HashingEncoder::with_dimension(VectorDimension::new(16).unwrap());
        let records = vec![
            record(7, "One", "first"),
            record(7, "Two", "second"),
        ];

        let result = Catalog::from_records(&records, &encoder, CatalogVersion::new(1));
        assert!(matches!(
            result.unwrap_err(),
            RecommendError::IndexBuild { .. }
        ));
    }

    #[test]
    fn test_genres_are_normalized() {
        let encoder = HashingEncoder::with_dimension(VectorDimension::new(16).unwrap());
        let records = vec![ItemRecord {
            id: 1,
            title: "Genre Test".to_string(),
            author: "A".to_string(),
            description: "d".to_string(),
            genres: vec![" Science Fiction ".to_string(), "".to_string()],
            rating: None,
        }];

        let catalog =
            Catalog::from_records(&records, &encoder, CatalogVersion::new(1)).unwrap();
        let item = catalog.get(ItemId::new(1).unwrap()).unwrap();

        assert_eq!(item.genres.len(), 1);
        assert!(item.has_genre("science fiction"));
    }
}
