/// HNSW vector index for similarity search
use hnsw_rs::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Maximum number of HNSW layers supported by hnsw_rs
const MAX_LAYERS: usize = 16;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Invalid vector for item {id}: {reason}")]
    InvalidVector { id: i64, reason: String },
}

/// Search result with ID and similarity score
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Catalog id of the meme
    pub id: i64,
    /// Cosine similarity (higher is more similar)
    pub score: f32,
}

/// HNSW vector index wrapper
///
/// In-memory approximate nearest neighbor search using cosine distance.
/// Inserts and searches take `&self`; hnsw_rs synchronizes internally.
pub struct VectorIndex {
    index: Hnsw<'static, f32, DistCosine>,
    dimension: usize,
    ef_search: usize,
    count: AtomicU64,
}

impl VectorIndex {
    /// Create a new vector index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `m` - HNSW M parameter (number of connections per layer)
    /// * `ef_construction` - HNSW construction parameter (higher = better recall, slower build)
    /// * `max_elements` - Expected upper bound on indexed vectors
    pub fn new(dimension: usize, m: usize, ef_construction: usize, max_elements: usize) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(
            m,
            max_elements,
            MAX_LAYERS,
            ef_construction,
            DistCosine,
        );

        Self {
            index,
            dimension,
            ef_search: ef_construction,
            count: AtomicU64::new(0),
        }
    }

    /// Set the search-time `ef` used by [`search_default`](Self::search_default)
    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = ef_search;
        self
    }

    /// Insert the embedding of a meme
    pub fn insert(&self, id: i64, vector: &[f32]) -> Result<(), VectorIndexError> {
        self.check_dimension(vector)?;

        let data_id = usize::try_from(id).map_err(|_| VectorIndexError::InvalidVector {
            id,
            reason: "negative id".to_string(),
        })?;

        // Cosine distance is undefined for the zero vector
        if vector.iter().all(|x| *x == 0.0) || vector.iter().any(|x| !x.is_finite()) {
            return Err(VectorIndexError::InvalidVector {
                id,
                reason: "zero or non-finite components".to_string(),
            });
        }

        self.index.insert((vector, data_id));
        self.count.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    /// Search for k nearest neighbors
    ///
    /// # Returns
    /// Vector of (id, similarity_score) pairs, sorted by score descending
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        self.check_dimension(query)?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<SearchResult> = self
            .index
            .search(query, k, ef_search.max(k))
            .into_iter()
            .map(|neighbor| SearchResult {
                id: neighbor.d_id as i64,
                score: 1.0 - neighbor.distance,
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    /// Search with the configured `ef_search`
    pub fn search_default(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        self.search(query, k, self.ef_search)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
