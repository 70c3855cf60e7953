//! Seeded K-means clustering for thematic catalog groups.
//!
//! Pure Rust K-means over the catalog's embedding vectors, using cosine
//! distance and K-means++ initialization. All randomness flows from an
//! explicit caller-supplied seed so a fit is reproducible given the same
//! catalog, cluster count, and seed; wall-clock seeding is never a
//! default.
//!
//! # Algorithm Details
//! - Distance metric: Cosine (1 - similarity), not Euclidean
//! - Initialization: K-means++ from a seeded `StdRng`
//! - Max iterations: 100 (hitting the cap is degraded, not an error)
//! - Empty clusters: reseeded from the vector furthest from any centroid

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::catalog::ItemId;
use crate::error::RecommendResult;
use crate::vector::ClusterId;

/// Maximum number of iterations for K-means clustering.
const MAX_ITERATIONS: usize = 100;

/// Convergence tolerance for centroid movement.
const CONVERGENCE_TOLERANCE: f32 = 1e-4;

/// Epsilon for floating-point comparisons.
const EPSILON: f32 = 1e-10;

/// Result of a raw K-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster centroids, unit length, same dimension as the input.
    pub centroids: Vec<Vec<f32>>,

    /// Cluster assignment for each input vector, in input order.
    pub assignments: Vec<ClusterId>,

    /// Number of iterations run.
    pub iterations: usize,

    /// Whether assignments stabilized before the iteration cap.
    pub converged: bool,
}

/// Errors that can occur during clustering operations.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error(
        "Empty vector set provided for clustering\nSuggestion: Load the catalog before fitting clusters"
    )]
    EmptyVectorSet,

    #[error("Invalid cluster count: {0}\nSuggestion: Use k between 1 and the number of vectors")]
    InvalidClusterCount(usize),

    #[error(
        "Dimension mismatch in vectors\nSuggestion: Ensure all vectors come from the same embedding model"
    )]
    DimensionMismatch,
}

/// A thematic group of catalog items sharing a centroid.
///
/// Recomputed wholesale whenever the catalog changes; never updated
/// incrementally.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub cluster_id: ClusterId,
    /// Unit-length mean of the member vectors.
    pub centroid: Vec<f32>,
    /// Descriptive name derived from the most frequent member genre.
    pub label: String,
    /// Member item ids, ordered by ascending distance to the centroid.
    pub members: Vec<ItemId>,
}

/// Performs seeded K-means clustering on a set of vectors using cosine
/// distance.
///
/// # Arguments
/// * `vectors` - Input vectors (non-empty, same dimension)
/// * `k` - Number of clusters (1 ..= number of vectors)
/// * `seed` - Seed for centroid initialization; fixed seed, fixed result
///
/// # Algorithm
/// 1. Initialize centroids with K-means++ from the seeded RNG
/// 2. Assign each vector to its nearest centroid by cosine distance
/// 3. Recompute centroids as the re-normalized mean of assigned vectors;
///    a centroid left with no members is reseeded from the vector
///    furthest from every current centroid
/// 4. Repeat until assignments stop changing or the iteration cap
#[must_use = "clustering results should be used or the computation is wasted"]
pub fn kmeans_clustering(
    vectors: &[Vec<f32>],
    k: usize,
    seed: u64,
) -> Result<KMeansFit, ClusteringError> {
    if vectors.is_empty() {
        return Err(ClusteringError::EmptyVectorSet);
    }

    if k == 0 || k > vectors.len() {
        return Err(ClusteringError::InvalidClusterCount(k));
    }

    let dimension = vectors[0].len();
    if vectors.iter().any(|v| v.len() != dimension) {
        return Err(ClusteringError::DimensionMismatch);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = initialize_centroids_kmeans_plus_plus(vectors, k, &mut rng);
    let mut assignments = vec![ClusterId::new_unchecked(1); vectors.len()];
    let mut iterations = 0;
    let mut converged = false;

    loop {
        iterations += 1;

        // Assignment step
        let centroid_refs: Vec<&[f32]> = centroids.iter().map(|c| c.as_slice()).collect();
        let new_assignments: Vec<ClusterId> = vectors
            .iter()
            .map(|vector| assign_to_nearest_centroid(vector, &centroid_refs))
            .collect();

        // The pre-loop assignment vector is a placeholder, not a real
        // assignment, so iteration 1 never counts as converged; the
        // update step (and its empty-cluster reseeding) must run at
        // least once.
        converged = iterations > 1 && new_assignments == assignments;
        assignments = new_assignments;

        if converged || iterations >= MAX_ITERATIONS {
            break;
        }

        // Update step
        let new_centroids = update_centroids(vectors, &assignments, k);

        let centroid_movement = calculate_centroid_movement(&centroids, &new_centroids);
        centroids = new_centroids;

        if centroid_movement < CONVERGENCE_TOLERANCE {
            converged = true;
            break;
        }
    }

    if !converged {
        // Best assignment found at the cap is still served
        warn!(iterations = MAX_ITERATIONS, "k-means hit iteration cap without converging");
    }

    Ok(KMeansFit {
        centroids,
        assignments,
        iterations,
        converged,
    })
}

/// Assigns a vector to the nearest centroid by cosine similarity.
pub fn assign_to_nearest_centroid(vector: &[f32], centroids: &[&[f32]]) -> ClusterId {
    let mut best_similarity = f32::NEG_INFINITY;
    let mut best_cluster = 0;

    for (i, centroid) in centroids.iter().enumerate() {
        let similarity = cosine_similarity(vector, centroid);
        if similarity > best_similarity {
            best_similarity = similarity;
            best_cluster = i;
        }
    }

    // ClusterId is 1-indexed
    ClusterId::new_unchecked((best_cluster + 1) as u32)
}

/// Updates centroids as the re-normalized mean of their assigned vectors.
///
/// An empty cluster is reseeded from the vector globally furthest from
/// any current centroid, so no cluster is ever left without a centroid.
fn update_centroids(vectors: &[Vec<f32>], assignments: &[ClusterId], k: usize) -> Vec<Vec<f32>> {
    let dimension = vectors[0].len();
    let mut new_centroids = vec![vec![0.0; dimension]; k];
    let mut cluster_sizes = vec![0usize; k];

    for (vector, &cluster_id) in vectors.iter().zip(assignments.iter()) {
        let cluster_idx = (cluster_id.get() - 1) as usize;

        for (i, &value) in vector.iter().enumerate() {
            new_centroids[cluster_idx][i] += value;
        }
        cluster_sizes[cluster_idx] += 1;
    }

    let mut empty_clusters = Vec::new();
    for (idx, (centroid, &size)) in new_centroids.iter_mut().zip(cluster_sizes.iter()).enumerate() {
        if size == 0 {
            empty_clusters.push(idx);
        } else {
            for value in centroid.iter_mut() {
                *value /= size as f32;
            }
            normalize_vector(centroid);
        }
    }

    // Reseed empty clusters one at a time so successive reseeds spread
    // out instead of landing on the same vector.
    for idx in empty_clusters {
        let occupied: Vec<&[f32]> = new_centroids
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx && cluster_sizes[*i] > 0)
            .map(|(_, c)| c.as_slice())
            .collect();
        let furthest = furthest_vector(vectors, &occupied);
        new_centroids[idx] = normalize_vector_copy(&vectors[furthest]);
        cluster_sizes[idx] = 1;
    }

    new_centroids
}

/// Index of the vector with the greatest distance to its nearest
/// centroid. Falls back to index 0 when there are no centroids.
fn furthest_vector(vectors: &[Vec<f32>], centroids: &[&[f32]]) -> usize {
    let mut best_idx = 0;
    let mut best_distance = f32::NEG_INFINITY;

    for (i, vector) in vectors.iter().enumerate() {
        let mut min_distance = f32::MAX;
        for centroid in centroids {
            let distance = 1.0 - cosine_similarity(vector, centroid);
            min_distance = min_distance.min(distance);
        }
        if centroids.is_empty() {
            min_distance = 0.0;
        }
        if min_distance > best_distance {
            best_distance = min_distance;
            best_idx = i;
        }
    }

    best_idx
}

/// Computes cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]; zero-norm inputs yield 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

/// Initializes centroids using the K-means++ algorithm with a seeded RNG.
fn initialize_centroids_kmeans_plus_plus(
    vectors: &[Vec<f32>],
    k: usize,
    rng: &mut StdRng,
) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);

    let first_idx = rng.random_range(0..vectors.len());
    centroids.push(normalize_vector_copy(&vectors[first_idx]));

    while centroids.len() < k {
        let mut distances = vec![0.0f32; vectors.len()];
        let mut total_distance = 0.0f32;

        for (i, vector) in vectors.iter().enumerate() {
            let mut min_distance = f32::MAX;
            for centroid in &centroids {
                let distance = 1.0 - cosine_similarity(vector, centroid);
                min_distance = min_distance.min(distance);
            }
            distances[i] = min_distance * min_distance;
            total_distance += distances[i];
        }

        if total_distance < EPSILON {
            // All remaining points coincide with existing centroids;
            // duplicate deterministically rather than loop forever.
            let idx = centroids.len() % vectors.len();
            centroids.push(normalize_vector_copy(&vectors[idx]));
            continue;
        }

        let target = rng.random::<f32>() * total_distance;
        let mut cumulative = 0.0;
        let mut chosen = vectors.len() - 1;
        for (i, &distance) in distances.iter().enumerate() {
            cumulative += distance;
            if cumulative >= target {
                chosen = i;
                break;
            }
        }
        centroids.push(normalize_vector_copy(&vectors[chosen]));
    }

    centroids
}

/// Average cosine distance moved by centroids between iterations.
fn calculate_centroid_movement(old: &[Vec<f32>], new: &[Vec<f32>]) -> f32 {
    old.iter()
        .zip(new.iter())
        .map(|(old_c, new_c)| 1.0 - cosine_similarity(old_c, new_c))
        .sum::<f32>()
        / old.len() as f32
}

/// Normalizes a vector in-place to unit length.
fn normalize_vector(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Creates a normalized copy of a vector.
fn normalize_vector_copy(vector: &[f32]) -> Vec<f32> {
    let mut normalized = vector.to_vec();
    normalize_vector(&mut normalized);
    normalized
}

/// Batch clustering of a catalog into named thematic groups.
#[derive(Debug, Clone)]
pub struct ClusterEngine {
    num_clusters: usize,
    seed: u64,
}

impl ClusterEngine {
    #[must_use]
    pub fn new(num_clusters: usize, seed: u64) -> Self {
        Self { num_clusters, seed }
    }

    /// Fits the catalog into `num_clusters` named groups.
    ///
    /// Always a full batch recomputation; call again after every catalog
    /// reload. A fit that hits the iteration cap returns the best
    /// assignment found, with a warning logged.
    pub fn fit(&self, catalog: &Catalog) -> RecommendResult<Vec<Cluster>> {
        info!(
            items = catalog.len(),
            clusters = self.num_clusters,
            seed = self.seed,
            "fitting catalog clusters"
        );

        let vectors: Vec<Vec<f32>> = catalog
            .items()
            .iter()
            .map(|item| item.vector.clone())
            .collect();
        let fit = kmeans_clustering(&vectors, self.num_clusters, self.seed)?;

        let mut clusters = Vec::with_capacity(self.num_clusters);
        for cluster_idx in 0..self.num_clusters {
            let cluster_id = ClusterId::new_unchecked((cluster_idx + 1) as u32);
            let centroid = fit.centroids[cluster_idx].clone();

            // Members ordered by ascending distance to the centroid,
            // id as the deterministic tie-break.
            let mut members: Vec<(ItemId, f32)> = catalog
                .items()
                .iter()
                .zip(fit.assignments.iter())
                .filter(|&(_, &assigned)| assigned == cluster_id)
                .map(|(item, _)| {
                    let distance = 1.0 - cosine_similarity(&item.vector, &centroid);
                    (item.id, distance)
                })
                .collect();
            members.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });

            let member_ids: Vec<ItemId> = members.into_iter().map(|(id, _)| id).collect();
            let label = derive_label(catalog, &member_ids, cluster_id);
            debug!(cluster = %cluster_id, members = member_ids.len(), label = %label, "cluster formed");

            clusters.push(Cluster {
                cluster_id,
                centroid,
                label,
                members: member_ids,
            });
        }

        info!(clusters = clusters.len(), "cluster fit complete");
        Ok(clusters)
    }
}

/// Derives a descriptive cluster name from the most frequent genre among
/// its members. A frequency summary only, never a generative step.
fn derive_label(catalog: &Catalog, members: &[ItemId], cluster_id: ClusterId) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for id in members {
        if let Some(item) = catalog.get(*id) {
            for genre in &item.genres {
                *counts.entry(genre.as_str()).or_insert(0) += 1;
            }
        }
    }

    // Highest count wins; lexicographic order breaks ties deterministically
    let top_genre = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)));

    match top_genre {
        Some((genre, _)) => format!("{} Collection", title_case(genre)),
        None => format!("Miscellaneous Cluster {cluster_id}"),
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
