//! Local hashing embedder

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use studymate_core::{Embedder, EmbeddingSpace, EmbeddingVector, Error, Result};

/// Offline embedder based on feature hashing of words and word bigrams
///
/// Needs no model download or network access. Vectors are L2-normalised.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub const MODEL: &'static str = "hash-bigram-v1";
    pub const DEFAULT_DIMENSION: usize = 384;

    /// Create a new hashing embedder with the default dimension
    pub fn new() -> Self {
        Self {
            dimension: Self::DEFAULT_DIMENSION,
        }
    }

    /// Create a hashing embedder producing `dimension`-sized vectors
    pub fn with_dimension(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Configuration("embedding dimension must be greater than 0".to_string()));
        }
        Ok(Self { dimension })
    }

    fn bucket(&self, hash: u64) -> usize {
        (hash % self.dimension as u64) as usize
    }

    fn generate(&self, text: &str) -> Result<EmbeddingVector> {
        let normalized_text = text.to_lowercase();
        let words: Vec<&str> = normalized_text.split_whitespace().collect();

        if words.is_empty() {
            return Err(Error::Embedding("cannot embed empty text".to_string()));
        }

        let mut embedding = vec![0.0f32; self.dimension];

        // Each word lands in three buckets, earlier words weigh more
        for (pos, word) in words.iter().enumerate() {
            let hash = hash_of(word);
            let position_weight = 1.0 / (pos as f32 + 1.0);

            embedding[self.bucket(hash)] += position_weight;
            embedding[self.bucket(hash >> 16)] += position_weight * 0.7;
            embedding[self.bucket(hash >> 32)] += position_weight * 0.5;
        }

        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            embedding[self.bucket(hash_of(&bigram))] += 0.8;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in embedding.iter_mut() {
                *val /= magnitude;
            }
        }

        Ok(embedding)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_of(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn space(&self) -> EmbeddingSpace {
        EmbeddingSpace::new(Self::MODEL, self.dimension)
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.generate(text)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        texts.iter().map(|text| self.generate(text)).collect()
    }
}
