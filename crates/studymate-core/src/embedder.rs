//! Embedder trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A fixed-length vector representation of a text segment
pub type EmbeddingVector = Vec<f32>;

/// Identity of the vector space an embedder produces
///
/// Two vectors are only comparable when they come from the same space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbeddingSpace {
    pub model: String,
    pub dimension: usize,
}

impl EmbeddingSpace {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
        }
    }
}

impl std::fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}d)", self.model, self.dimension)
    }
}

/// Trait for embedders (e.g., local hashing, watsonx.ai, etc.)
///
/// Implementations must be deterministic for a given configuration and must
/// fail with [`crate::Error::Embedding`] on empty input or backend failure
/// rather than returning a zero vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The vector space this embedder produces
    fn space(&self) -> EmbeddingSpace;

    /// Embed a single text segment or query
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;

    /// Embed many texts; output order matches input order one to one
    ///
    /// The default implementation embeds sequentially. Backends with native
    /// batching should override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Dimensionality of produced vectors
    fn dimension(&self) -> usize {
        self.space().dimension
    }
}
