//! Repository layer (spec C4): CRUD, search, link, pattern, and stats
//! operations over the memory graph.
//!
//! Conceptually this splits one repository across several concerns —
//! CRUD, links, patterns, search, stats. Rust has no mixins, so the
//! split becomes several `impl Repository` blocks, one per submodule,
//! closing over the same struct.

mod crud;
mod links;
mod patterns;
mod search;
mod stats;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{MnemoError, Result};
use crate::model::{Memory, MemoryType};
use crate::storage::Manager;
use lru::LruCache;
use rusqlite::Row;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

#[cfg(feature = "vector-search")]
use crate::search::VectorIndex;

/// Recall queries repeat often (the same search typed a few times in a
/// session); caching their embeddings avoids re-running the embedder,
/// which spec §5 calls out as potentially taking "hundreds of ms".
const QUERY_EMBEDDING_CACHE_SIZE: usize = 256;

/// Facade over storage, embedding, and (optionally) vector search — the
/// single object every `analysis`/`service` operation is built on.
pub struct Repository {
    pub(crate) storage: Arc<Manager>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) config: Config,
    pub(crate) query_embedding_cache: Mutex<LruCache<String, Vec<f32>>>,
    #[cfg(feature = "vector-search")]
    pub(crate) vector_index: Mutex<VectorIndex>,
}

impl Repository {
    pub fn new(storage: Arc<Manager>, embedder: Arc<dyn Embedder>, config: Config) -> Result<Self> {
        let query_embedding_cache =
            Mutex::new(LruCache::new(NonZeroUsize::new(QUERY_EMBEDDING_CACHE_SIZE).unwrap()));

        #[cfg(feature = "vector-search")]
        {
            let vector_index = Self::load_or_build_vector_index(&storage, &config)?;
            Ok(Self {
                storage,
                embedder,
                config,
                query_embedding_cache,
                vector_index: Mutex::new(vector_index),
            })
        }
        #[cfg(not(feature = "vector-search"))]
        {
            Ok(Self {
                storage,
                embedder,
                config,
                query_embedding_cache,
            })
        }
    }

    /// Embed `query`, reusing a cached vector for a query string seen
    /// recently (spec §5 — embedding is CPU-bound and callers of
    /// `recall_memories` often repeat the same search).
    pub(crate) fn embed_query_cached(&self, query: &str) -> Result<Vec<f32>> {
        if let Ok(mut cache) = self.query_embedding_cache.lock() {
            if let Some(cached) = cache.get(query) {
                return Ok(cached.clone());
            }
        }

        let embedding = self
            .embedder
            .embed(query)
            .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))?;

        if let Ok(mut cache) = self.query_embedding_cache.lock() {
            cache.put(query.to_string(), embedding.clone());
        }

        Ok(embedding)
    }

    #[cfg(feature = "vector-search")]
    fn load_or_build_vector_index(
        storage: &Manager,
        config: &Config,
    ) -> Result<VectorIndex> {
        use crate::error::MnemoError;

        let index_path = config.vector_index_path();
        if index_path.exists() {
            if let Ok(index) = VectorIndex::load(&index_path, Default::default()) {
                return Ok(index);
            }
            tracing::warn!(path = ?index_path, "vector index sidecar unreadable, rebuilding from storage");
        }

        let mut index = VectorIndex::new()
            .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))?;

        let rows: Vec<(String, Vec<u8>)> = storage.with_reader(|conn| {
            let mut stmt = conn.prepare(super::storage::queries::LIST_ALL_EMBEDDINGS)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        if !rows.is_empty() {
            index
                .reserve(rows.len())
                .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))?;
        }
        for (id, bytes) in rows {
            let vector: Vec<f32> = bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            index
                .add(&id, &vector)
                .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))?;
        }

        Ok(index)
    }

    #[cfg(feature = "vector-search")]
    pub fn persist_vector_index(&self) -> Result<()> {
        use crate::error::MnemoError;
        let index = self
            .vector_index
            .lock()
            .map_err(|_| MnemoError::LockTimeout { attempts: 0 })?;
        index
            .save(&self.config.vector_index_path())
            .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))
    }
}

pub(crate) fn row_to_memory(row: &Row) -> rusqlite::Result<Memory> {
    let memory_type: String = row.get("memory_type")?;
    Ok(Memory {
        id: row.get("id")?,
        content: row.get("content")?,
        summary: row.get("summary")?,
        memory_type: MemoryType::parse_name(&memory_type).unwrap_or_default(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        last_accessed_at: row.get("last_accessed_at")?,
        access_count: row.get("access_count")?,
        decay_rate: row.get("decay_rate")?,
        frustration_score: row.get("frustration_score")?,
        time_cost_hours: row.get("time_cost_hours")?,
        context: row.get("context")?,
        tags: Vec::new(),
        similarity: None,
        related_memories: Vec::new(),
    })
}
