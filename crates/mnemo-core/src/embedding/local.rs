//! Local semantic embeddings via fastembed v5.
//!
//! Model: nomic-embed-text-v1.5 (ONNX, 768d native, 8192 token context),
//! Matryoshka-truncated to [`super::EMBEDDING_DIMENSIONS`].

use super::{
    matryoshka_truncate, truncate_to_byte_boundary, Embedder, EmbeddingError, BATCH_SIZE,
    MAX_TEXT_LENGTH,
};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// fastembed-backed embedder. Holds the loaded ONNX model; construction
/// downloads the model on first run (cached under [`cache_dir`]).
pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedEmbedder {
    pub fn try_new() -> Result<Self, EmbeddingError> {
        let cache_dir = cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!("failed to create embedding cache dir {cache_dir:?}: {e}");
        }

        let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
            .with_show_download_progress(true)
            .with_cache_dir(cache_dir);

        let model = TextEmbedding::try_new(options).map_err(|e| {
            EmbeddingError::ModelInit(format!(
                "failed to initialize nomic-embed-text-v1.5: {e}"
            ))
        })?;

        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for FastEmbedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("text cannot be empty".into()));
        }
        let text = truncate_to_byte_boundary(text, MAX_TEXT_LENGTH);

        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbeddingError::ModelInit("embedding model lock poisoned".into()))?;

        let mut embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        let raw = embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("no embedding produced".into()))?;

        Ok(matryoshka_truncate(raw))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbeddingError::ModelInit("embedding model lock poisoned".into()))?;

        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            let truncated: Vec<&str> = chunk
                .iter()
                .map(|t| truncate_to_byte_boundary(t, MAX_TEXT_LENGTH))
                .collect();
            let embeddings = model
                .embed(truncated, None)
                .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;
            out.extend(embeddings.into_iter().map(matryoshka_truncate));
        }
        Ok(out)
    }

    fn model_name(&self) -> &'static str {
        "nomic-ai/nomic-embed-text-v1.5"
    }
}

/// Cache directory for downloaded model weights: `FASTEMBED_CACHE_PATH` if
/// set, otherwise the platform cache dir, otherwise `~/.cache`.
fn cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
        return std::path::PathBuf::from(path);
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "mnemo", "mnemo") {
        return proj_dirs.cache_dir().join("fastembed");
    }
    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".cache/mnemo/fastembed");
    }
    std::path::PathBuf::from(".fastembed_cache")
}
