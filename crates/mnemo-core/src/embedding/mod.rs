//! Semantic embeddings (spec §4.1 / C1).
//!
//! Provides local, offline embedding generation. With the `embeddings`
//! feature enabled, text is embedded with fastembed (ONNX, nomic-embed-text
//! v1.5, Matryoshka-truncated to [`EMBEDDING_DIMENSIONS`]). Without it — or
//! when the model fails to load — the crate falls back to
//! [`deterministic::DeterministicEmbedder`], a hash-based embedder that
//! keeps the crate buildable, testable, and usable offline without a model
//! download. Spec §4.1 treats embedding failure as fatal at startup; the
//! fallback exists so "no embeddings feature" is a deliberate configuration
//! rather than a crash.

mod deterministic;
#[cfg(feature = "embeddings")]
mod local;

pub use deterministic::DeterministicEmbedder;
#[cfg(feature = "embeddings")]
pub use local::FastEmbedEmbedder;

/// Dimensions every embedder in this crate must produce. Fixed so the
/// vector index, the deterministic fallback, and fastembed's Matryoshka
/// truncation all agree on a single vector shape.
pub const EMBEDDING_DIMENSIONS: usize = 256;

/// Maximum input length; longer text is truncated before embedding.
pub const MAX_TEXT_LENGTH: usize = 8192;

/// Batch size used by implementations that benefit from batching.
pub const BATCH_SIZE: usize = 32;

/// Truncate `text` to at most `max_bytes`, backing off to the nearest char
/// boundary so multi-byte UTF-8 text never gets sliced mid-character.
pub fn truncate_to_byte_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Failure modes shared by every [`Embedder`] implementation.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum EmbeddingError {
    ModelInit(String),
    EmbeddingFailed(String),
    InvalidInput(String),
}

impl std::fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingError::ModelInit(e) => write!(f, "model initialization failed: {e}"),
            EmbeddingError::EmbeddingFailed(e) => write!(f, "embedding generation failed: {e}"),
            EmbeddingError::InvalidInput(e) => write!(f, "invalid input: {e}"),
        }
    }
}

impl std::error::Error for EmbeddingError {}

/// A text-to-vector embedder. Implementations must always return vectors
/// of [`EMBEDDING_DIMENSIONS`] length.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    fn model_name(&self) -> &'static str;
}

/// Build the default embedder: fastembed when the `embeddings` feature is
/// on and the model loads successfully, the deterministic hash embedder
/// otherwise.
pub fn default_embedder() -> std::sync::Arc<dyn Embedder> {
    #[cfg(feature = "embeddings")]
    {
        match local::FastEmbedEmbedder::try_new() {
            Ok(embedder) => return std::sync::Arc::new(embedder),
            Err(e) => {
                tracing::warn!(
                    "fastembed model unavailable ({e}), falling back to deterministic embedder"
                );
            }
        }
    }
    std::sync::Arc::new(DeterministicEmbedder::new())
}

/// Truncate to [`EMBEDDING_DIMENSIONS`] and L2-normalize. Nomic Embed v1.5
/// supports Matryoshka Representation Learning: the leading N dimensions of
/// the 768-dim output are themselves a valid N-dim embedding.
#[inline]
pub fn matryoshka_truncate(mut vector: Vec<f32>) -> Vec<f32> {
    if vector.len() > EMBEDDING_DIMENSIONS {
        vector.truncate(EMBEDDING_DIMENSIONS);
    }
    normalize(&mut vector);
    vector
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two vectors of equal length; `0.0` on a
/// dimension mismatch or zero vector.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.0001);
    }

    #[test]
    fn matryoshka_truncate_produces_unit_vector_of_target_length() {
        let v = vec![1.0_f32; EMBEDDING_DIMENSIONS * 2];
        let truncated = matryoshka_truncate(v);
        assert_eq!(truncated.len(), EMBEDDING_DIMENSIONS);
        let norm = truncated.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }
}
