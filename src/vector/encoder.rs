//! Text-to-vector encoding.
//!
//! The [`VectorEncoder`] trait is the seam between the recommendation
//! pipeline and the embedding model. Every implementation returns
//! L2-normalized vectors so downstream cosine arithmetic reduces to a
//! dot product, and every implementation must map empty input to a
//! valid unit vector rather than failing.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex as PlMutex;

use crate::vector::{VectorDimension, VectorError};

/// Norm below which a raw embedding is treated as zero.
const NORM_EPSILON: f32 = 1e-12;

/// Trait for converting text into fixed-dimension unit vectors.
///
/// Implementations must be thread-safe: encode calls may run
/// concurrently from many request workers against one shared instance.
pub trait VectorEncoder: Send + Sync {
    /// Encode a batch of texts, preserving input order.
    ///
    /// Used once at catalog load to embed every item; at request time
    /// only query text goes through the encoder.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Encode a single text.
    fn encode(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        let mut vectors = self.encode_batch(&[text])?;
        vectors.pop().ok_or_else(|| {
            VectorError::EmbeddingFailed("encoder returned no vector for input".to_string())
        })
    }

    /// The fixed dimension of vectors produced by this encoder.
    #[must_use]
    fn dimension(&self) -> VectorDimension;
}

/// Normalizes a vector to unit L2 length in place.
///
/// A numerically zero vector (including the embedding of degenerate
/// input) is replaced by the first basis vector so the result is always
/// a valid unit vector.
pub(crate) fn normalize_unit(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > NORM_EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    } else if !vector.is_empty() {
        vector.fill(0.0);
        vector[0] = 1.0;
    }
}

/// FastEmbed implementation using the AllMiniLML6V2 model.
///
/// Produces 384-dimensional embeddings. The model handle is acquired
/// once (downloading on first use) and shared read-only for the process
/// lifetime; the `Mutex` only serializes access to fastembed's
/// stateful inference session.
pub struct FastEmbedEncoder {
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
}

impl FastEmbedEncoder {
    /// Create a new encoder, loading (or downloading) the model into
    /// `cache_dir`.
    ///
    /// # Errors
    /// Returns an error if the model fails to initialize or download.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self, VectorError> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                .with_cache_dir(cache_dir.as_ref().to_path_buf())
                .with_show_download_progress(false),
        )
        .map_err(|e| VectorError::EmbeddingFailed(
            format!("Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download")
        ))?;

        Ok(Self {
            model: Mutex::new(model),
            dimension: VectorDimension::dimension_384(),
        })
    }
}

impl VectorEncoder for FastEmbedEncoder {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // fastembed expects Vec<String> for the embed method
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let mut embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        for embedding in embeddings.iter_mut() {
            self.dimension.validate_vector(embedding)?;
            // Re-normalize regardless of what the model returned; the
            // index contract assumes exact unit vectors.
            normalize_unit(embedding);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Deterministic bag-of-words encoder.
///
/// Assigns each distinct token its own dimension slot and counts term
/// occurrences, then normalizes to unit length. Texts that share tokens
/// get proportionally high cosine similarity, which makes this encoder
/// useful for tests and for environments where the model download is
/// unavailable. The slot registry is capped at one entry per dimension;
/// tokens arriving after every slot has an owner hash into the slot
/// space instead of growing the registry. It has no semantic
/// generalization; production catalogs should use [`FastEmbedEncoder`].
pub struct HashingEncoder {
    dimension: VectorDimension,
    vocabulary: PlMutex<HashMap<String, usize>>,
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HashingEncoder {
    /// Create an encoder with the standard 384-dimension output.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(VectorDimension::dimension_384())
    }

    /// Create an encoder with a custom output dimension.
    #[must_use]
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            vocabulary: PlMutex::new(HashMap::new()),
        }
    }

    fn slot(&self, token: &str) -> usize {
        let mut vocab = self.vocabulary.lock();
        if let Some(&slot) = vocab.get(token) {
            return slot;
        }
        // The registry holds at most one token per dimension slot, so a
        // long-lived encoder stays bounded no matter how much distinct
        // query text flows through it. The first `dimension` tokens get
        // collision-free slots; later tokens hash into the slot space.
        if vocab.len() < self.dimension.get() {
            let slot = vocab.len();
            vocab.insert(token.to_string(), slot);
            return slot;
        }
        (crate::cache::fnv1a_hash(token.as_bytes()) % self.dimension.get() as u64) as usize
    }
}

impl VectorEncoder for HashingEncoder {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        let dim = self.dimension.get();
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            let mut embedding = vec![0.0f32; dim];
            for token in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
            {
                let token = token.to_lowercase();
                embedding[self.slot(&token)] += 1.0;
            }
            normalize_unit(&mut embedding);
            embeddings.push(embedding);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}
