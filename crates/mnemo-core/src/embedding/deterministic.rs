//! Hash-based embedder used when the `embeddings` feature is disabled or
//! the fastembed model cannot be loaded.
//!
//! This is not a semantic embedding: it distributes token hashes across a
//! fixed-width vector (a degenerate bag-of-hashed-tokens), which is enough
//! to make exact and near-duplicate content cluster correctly and keep
//! `recall_memories`/`consolidate_patterns` exercisable in tests and
//! offline installs, without pretending to approximate real semantic
//! similarity.

use super::{cosine_similarity, Embedder, EmbeddingError, EMBEDDING_DIMENSIONS};
use std::hash::{Hash, Hasher};

#[derive(Debug, Default)]
pub struct DeterministicEmbedder;

impl DeterministicEmbedder {
    pub fn new() -> Self {
        Self
    }
}

impl Embedder for DeterministicEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("text cannot be empty".into()));
        }

        let mut vector = vec![0.0_f32; EMBEDDING_DIMENSIONS];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h as usize) % EMBEDDING_DIMENSIONS;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;

            // Spread a second, weaker signal so single-token differences
            // don't collapse everything onto one axis.
            let bucket2 = ((h >> 32) as usize) % EMBEDDING_DIMENSIONS;
            vector[bucket2] += 0.5 * sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }

    fn model_name(&self) -> &'static str {
        "deterministic-hash-v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_produces_identical_vector() {
        let e = DeterministicEmbedder::new();
        let a = e.embed("retry the write lock with backoff").unwrap();
        let b = e.embed("retry the write lock with backoff").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn similar_text_is_more_similar_than_unrelated_text() {
        let e = DeterministicEmbedder::new();
        let base = e.embed("sqlite write lock retry backoff").unwrap();
        let similar = e.embed("sqlite write lock retry delay").unwrap();
        let unrelated = e.embed("banana recipe for breakfast pancakes").unwrap();

        let sim_close = cosine_similarity(&base, &similar);
        let sim_far = cosine_similarity(&base, &unrelated);
        assert!(sim_close > sim_far);
    }

    #[test]
    fn empty_text_is_rejected() {
        let e = DeterministicEmbedder::new();
        assert!(e.embed("   ").is_err());
    }

    #[test]
    fn output_has_fixed_dimensionality() {
        let e = DeterministicEmbedder::new();
        let v = e.embed("a").unwrap();
        assert_eq!(v.len(), EMBEDDING_DIMENSIONS);
    }
}
