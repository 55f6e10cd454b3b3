//! Pattern storage and memory-to-pattern linking (spec §4.7 "concept
//! abstraction").
//!
//! Patterns get their own embedding column (`pattern_embeddings`) rather
//! than sharing `node_embeddings` with memories — the vector index used
//! for `recall_memories` only ever holds memory ids, so pattern
//! similarity search stays a plain linear scan.

use super::Repository;
use crate::error::{MnemoError, Result};
use crate::model::Pattern;
use crate::storage::queries;
use chrono::Utc;
use uuid::Uuid;

impl Repository {
    /// Create a new pattern (spec §4.7). Returns `(id, summary, embedding)`.
    pub fn create_pattern(&self, content: &str, confidence: f64) -> Result<(String, String, Vec<f32>)> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let summary = super::crud::generate_summary(content, self.config.max_summary_length);
        let embedding = self
            .embedder
            .embed(content)
            .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))?;

        self.storage.with_writer(|conn| {
            conn.execute(
                queries::CREATE_PATTERN,
                rusqlite::params![id, content, summary, confidence, now],
            )?;
            Ok(())
        })?;

        let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
        self.storage.with_writer(|conn| {
            conn.execute(queries::UPSERT_PATTERN_EMBEDDING, rusqlite::params![id, bytes])?;
            Ok(())
        })?;

        Ok((id, summary, embedding))
    }

    /// Link a memory as an instance of a pattern (spec §4.7). Bumps the
    /// pattern's `instance_count` and nudges its aggregate `confidence` up
    /// by 0.05, capped at 0.9, per instance — a no-op if the link already
    /// exists.
    pub fn link_memory_to_pattern(&self, memory_id: &str, pattern_id: &str, confidence: f64) -> Result<bool> {
        let already_linked: i64 = self.storage.with_reader(|conn| {
            Ok(conn.query_row(
                queries::PATTERN_INSTANCE_EXISTS,
                [memory_id, pattern_id],
                |row| row.get(0),
            )?)
        })?;
        if already_linked > 0 {
            return Ok(true);
        }

        let now = Utc::now();
        self.storage.with_writer(|conn| {
            conn.execute(
                queries::LINK_MEMORY_TO_PATTERN,
                rusqlite::params![memory_id, pattern_id, confidence, now],
            )?;
            conn.execute(queries::BUMP_PATTERN_CONFIDENCE, rusqlite::params![pattern_id, now])?;
            Ok(())
        })?;

        Ok(true)
    }

    /// Fetch a pattern by id (spec §4.7).
    pub fn get_pattern_by_id(&self, pattern_id: &str) -> Result<Option<Pattern>> {
        self.storage.with_reader(|conn| {
            conn.query_row(queries::GET_PATTERN_BY_ID, [pattern_id], |row| {
                Ok(Pattern {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    summary: row.get(2)?,
                    confidence: row.get(3)?,
                    instance_count: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other.into()),
            })
        })
    }

    /// Search patterns by embedding similarity (spec §4.7). No vector
    /// index backs this; the scan is linear.
    pub fn search_similar_patterns(
        &self,
        embedding: &[f32],
        limit: usize,
        min_confidence: f64,
    ) -> Result<Vec<(Pattern, f64)>> {
        let rows: Vec<(String, Vec<u8>)> = self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(queries::LIST_ALL_PATTERN_EMBEDDINGS)?;
            let rows = stmt
                .query_map([min_confidence], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut scored = Vec::with_capacity(rows.len());
        for (pattern_id, bytes) in rows {
            let Some(pattern) = self.get_pattern_by_id(&pattern_id)? else {
                continue;
            };
            let vector: Vec<f32> = bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            let similarity = crate::embedding::cosine_similarity(embedding, &vector) as f64;
            scored.push((pattern, similarity));
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }
}
