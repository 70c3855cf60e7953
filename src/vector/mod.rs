//! Vector embedding and similarity search.
//!
//! This module provides the embedding encoder, the cosine k-NN index,
//! and seeded K-means clustering over the catalog. All vectors flowing
//! through it are L2-normalized at the encoder boundary, so cosine
//! similarity everywhere else is a plain dot product.

pub mod clustering;
pub mod encoder;
pub mod index;
pub mod types;

pub use clustering::{
    Cluster, ClusterEngine, ClusteringError, KMeansFit, assign_to_nearest_centroid,
    cosine_similarity, kmeans_clustering,
};
pub use encoder::{FastEmbedEncoder, HashingEncoder, VectorEncoder};
pub use index::{SharedIndex, SimilarityIndex};
pub use types::{ClusterId, Score, VECTOR_DIMENSION_384, VectorDimension, VectorError};
