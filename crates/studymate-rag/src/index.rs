//! Exhaustive in-memory vector index

use tracing::debug;

use studymate_core::{
    Chunk, EmbeddingSpace, EmbeddingVector, Error, Result, RetrievalResult, ScoredChunk, VectorIndex,
};

/// Flat vector index ranking by cosine similarity
///
/// Vectors are L2-normalised when the index is built, so ranking reduces to
/// an inner product with the normalised query.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    space: EmbeddingSpace,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk_index: usize,
    vector: EmbeddingVector,
}

/// Scale `vector` to unit length in place; zero vectors are left untouched
pub fn normalize(vector: &mut [f32]) {
    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for val in vector.iter_mut() {
            *val /= magnitude;
        }
    }
}

fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

impl VectorIndex for FlatIndex {
    fn build(space: EmbeddingSpace, chunks: &[Chunk], vectors: Vec<EmbeddingVector>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::DimensionMismatch(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut entries = Vec::with_capacity(vectors.len());
        for (chunk, mut vector) in chunks.iter().zip(vectors) {
            if vector.len() != space.dimension {
                return Err(Error::DimensionMismatch(format!(
                    "vector for chunk {} has {} components, index expects {}",
                    chunk.index,
                    vector.len(),
                    space.dimension
                )));
            }
            if !is_finite(&vector) {
                return Err(Error::Embedding(format!(
                    "vector for chunk {} has a non-finite component",
                    chunk.index
                )));
            }
            normalize(&mut vector);
            entries.push(IndexEntry {
                chunk_index: chunk.index,
                vector,
            });
        }

        debug!(vectors = entries.len(), space = %space, "built flat index");
        Ok(Self { space, entries })
    }

    fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(Error::Configuration("k must be at least 1".to_string()));
        }
        if query.len() != self.space.dimension {
            return Err(Error::DimensionMismatch(format!(
                "query has {} components, index expects {}",
                query.len(),
                self.space.dimension
            )));
        }

        if !is_finite(query) {
            return Err(Error::Embedding("query vector has a non-finite component".to_string()));
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        let mut hits: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk_index: entry.chunk_index,
                score: dot(&query, &entry.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        });
        hits.truncate(k);

        Ok(RetrievalResult::new(hits))
    }

    fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                index: i,
                text: format!("chunk {}", i),
                char_start: i * 10,
                char_end: i * 10 + 10,
            })
            .collect()
    }

    fn space(dimension: usize) -> EmbeddingSpace {
        EmbeddingSpace::new("test", dimension)
    }

    #[test]
    fn test_non_finite_vectors_are_rejected() {
        let vectors: Vec<Vec<f32>> = (0..40)
            .map(|i| if i % 3 == 0 { vec![f32::NAN, 0.0] } else { vec![1.0, i as f32] })
            .collect();
        let result = FlatIndex::build(space(2), &chunks(40), vectors);
        assert!(matches!(result, Err(Error::Embedding(_))));

        let result = FlatIndex::build(space(2), &chunks(1), vec![vec![f32::INFINITY, 1.0]]);
        assert!(matches!(result, Err(Error::Embedding(_))));

        let index = FlatIndex::build(space(2), &chunks(2), vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert!(matches!(index.search(&[f32::NAN, 0.0], 2), Err(Error::Embedding(_))));
        assert!(matches!(index.search(&[f32::INFINITY, 0.0], 2), Err(Error::Embedding(_))));
    }

    #[test]
    fn test_build_rejects_count_mismatch() {
        let result = FlatIndex::build(space(2), &chunks(3), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(matches!(result, Err(Error::DimensionMismatch(_))));
    }

    #[test]
    fn test_build_rejects_wrong_dimension() {
        let result = FlatIndex::build(space(2), &chunks(2), vec![vec![1.0, 0.0], vec![0.0, 1.0, 0.0]]);
        assert!(matches!(result, Err(Error::DimensionMismatch(_))));
    }

    #[test]
    fn test_search_ranks_by_cosine() {
        let index = FlatIndex::build(
            space(2),
            &chunks(3),
            vec![vec![0.0, 5.0], vec![3.0, 3.0], vec![10.0, 0.0]],
        )
        .unwrap();

        let result = index.search(&[2.0, 0.0], 3).unwrap();
        assert_eq!(result.chunk_indices(), vec![2, 1, 0]);
        assert!((result.hits[0].score - 1.0).abs() < 1e-6);
        assert!((result.hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(result.hits[2].score.abs() < 1e-6);
    }

    #[test]
    fn test_k_larger_than_index_returns_everything() {
        let index = FlatIndex::build(space(2), &chunks(2), vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let result = index.search(&[1.0, 0.2], 10).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.chunk_indices(), vec![0, 1]);
    }

    #[test]
    fn test_ties_break_by_chunk_index() {
        let vectors = vec![vec![1.0, 1.0]; 4];
        let index = FlatIndex::build(space(2), &chunks(4), vectors).unwrap();
        for _ in 0..5 {
            let result = index.search(&[1.0, 1.0], 3).unwrap();
            assert_eq!(result.chunk_indices(), vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = FlatIndex::build(space(3), &[], Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_validates_arguments() {
        let index = FlatIndex::build(space(2), &chunks(1), vec![vec![1.0, 0.0]]).unwrap();
        assert!(matches!(index.search(&[1.0, 0.0], 0), Err(Error::Configuration(_))));
        assert!(matches!(index.search(&[1.0], 1), Err(Error::DimensionMismatch(_))));
    }

    #[test]
    fn test_zero_vectors_score_zero() {
        let index = FlatIndex::build(space(2), &chunks(2), vec![vec![0.0, 0.0], vec![0.0, 2.0]]).unwrap();
        let result = index.search(&[0.0, 1.0], 2).unwrap();
        assert_eq!(result.chunk_indices(), vec![1, 0]);
        assert_eq!(result.hits[1].score, 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_sorted_and_bounded(
            vectors in proptest::collection::vec(proptest::collection::vec(-1.0f32..1.0f32, 8), 0..30),
            query in proptest::collection::vec(-1.0f32..1.0f32, 8),
            k in 1usize..40,
        ) {
            let count = vectors.len();
            let index = FlatIndex::build(space(8), &chunks(count), vectors).unwrap();
            let result = index.search(&query, k).unwrap();

            prop_assert_eq!(result.len(), k.min(count));
            for pair in result.hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
                if pair[0].score == pair[1].score {
                    prop_assert!(pair[0].chunk_index < pair[1].chunk_index);
                }
            }

            let again = index.search(&query, k).unwrap();
            prop_assert_eq!(result, again);
        }
    }
}
