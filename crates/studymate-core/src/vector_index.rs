//! Vector index trait and retrieval types

use serde::{Deserialize, Serialize};

use crate::{Chunk, EmbeddingSpace, EmbeddingVector, Result};

/// One retrieved chunk and its similarity to the query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk_index: usize,
    pub score: f32,
}

/// Ranked hits for one query
///
/// Sorted by descending score, ties broken by ascending `chunk_index`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn new(hits: Vec<ScoredChunk>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredChunk> {
        self.hits.iter()
    }

    pub fn chunk_indices(&self) -> Vec<usize> {
        self.hits.iter().map(|hit| hit.chunk_index).collect()
    }
}

/// Trait for in-memory vector indexes
///
/// An index is built once per document from its chunks and their vectors and
/// is read-only afterwards. It remembers the [`EmbeddingSpace`] it was built
/// in so queries from a different embedder can be rejected.
pub trait VectorIndex: Send + Sync + Sized {
    /// Build the index
    ///
    /// Fails with [`crate::Error::DimensionMismatch`] when the number of
    /// vectors differs from the number of chunks or a vector does not have
    /// `space.dimension` components.
    fn build(space: EmbeddingSpace, chunks: &[Chunk], vectors: Vec<EmbeddingVector>) -> Result<Self>;

    /// Return up to `k` chunks ranked by similarity to `query`
    fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult>;

    /// The vector space the index was built in
    fn space(&self) -> &EmbeddingSpace;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
