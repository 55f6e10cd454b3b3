//! Vector similarity search, hybrid reranking, and paginated listing
//! (spec §4.4.3, §4.4.4, §6.2 `list_memories`).

use super::{row_to_memory, Repository};
use crate::error::Result;
use crate::model::{Memory, MemoryType};
use crate::storage::queries;
use chrono::Utc;

impl Repository {
    /// Similarity search over stored embeddings (spec §4.4.3). Tries the
    /// HNSW index first; any index failure falls back to a full linear
    /// scan over `node_embeddings` so a corrupted or stale index degrades
    /// search quality rather than taking recall down entirely.
    pub fn search_similar_by_embedding(
        &self,
        embedding: &[f32],
        limit: usize,
        exclude_id: Option<&str>,
    ) -> Result<Vec<(String, String, f64, MemoryType, Option<String>)>> {
        let fetch_limit = if exclude_id.is_some() { limit + 5 } else { limit };

        #[cfg(feature = "vector-search")]
        {
            if let Some(hits) = self.search_similar_via_index(embedding, fetch_limit)? {
                let mut out = Vec::with_capacity(limit);
                for (id, similarity) in hits {
                    if exclude_id == Some(id.as_str()) {
                        continue;
                    }
                    let Some(memory) = self.get_by_id(&id)? else {
                        continue;
                    };
                    out.push((memory.id, memory.summary, similarity as f64, memory.memory_type, memory.context));
                    if out.len() >= limit {
                        break;
                    }
                }
                return Ok(out);
            }
        }

        self.search_similar_fallback(embedding, limit, exclude_id)
    }

    #[cfg(feature = "vector-search")]
    fn search_similar_via_index(
        &self,
        embedding: &[f32],
        fetch_limit: usize,
    ) -> Result<Option<Vec<(String, f32)>>> {
        use crate::error::MnemoError;

        let index = self
            .vector_index
            .lock()
            .map_err(|_| MnemoError::LockTimeout { attempts: 0 })?;
        match index.search(embedding, fetch_limit) {
            Ok(hits) => Ok(Some(hits)),
            Err(e) => {
                tracing::warn!("vector index search failed, using fallback: {e}");
                Ok(None)
            }
        }
    }

    /// Full-table cosine scan, used when the vector index is disabled or
    /// unavailable.
    fn search_similar_fallback(
        &self,
        embedding: &[f32],
        limit: usize,
        exclude_id: Option<&str>,
    ) -> Result<Vec<(String, String, f64, MemoryType, Option<String>)>> {
        let rows: Vec<(String, Vec<u8>)> = self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(queries::LIST_ALL_EMBEDDINGS)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut scored = Vec::with_capacity(rows.len());
        for (id, bytes) in rows {
            if exclude_id == Some(id.as_str()) {
                continue;
            }
            let vector: Vec<f32> = bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            let similarity = crate::embedding::cosine_similarity(embedding, &vector);
            scored.push((id, similarity));
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        let mut out = Vec::with_capacity(scored.len());
        for (id, similarity) in scored {
            let Some(memory) = self.get_by_id(&id)? else {
                continue;
            };
            out.push((memory.id, memory.summary, similarity as f64, memory.memory_type, memory.context));
        }
        Ok(out)
    }

    /// High-level semantic search: embed the query, fetch candidates,
    /// apply filters, then (optionally) hybrid rerank (spec §4.4.4).
    /// Fetches `limit * multiplier + 20` candidates so filtering and
    /// reranking have enough headroom before truncating to `limit`.
    pub fn search_by_similarity(
        &self,
        query: &str,
        limit: usize,
        context_filter: Option<&str>,
        tag_filter: Option<&[String]>,
        type_filter: Option<MemoryType>,
        use_hybrid_scoring: bool,
    ) -> Result<(Vec<Memory>, usize)> {
        let query_embedding = self.embed_query_cached(query)?;

        let mut fetch_multiplier = if use_hybrid_scoring { 5 } else { 3 };
        if context_filter.is_some() || tag_filter.is_some() || type_filter.is_some() {
            fetch_multiplier += 2;
        }
        let fetch_limit = limit * fetch_multiplier + 20;

        let candidates = self.search_similar_by_embedding(&query_embedding, fetch_limit, None)?;

        let mut memories = Vec::new();
        for (memory_id, _summary, similarity, memory_type, context) in candidates {
            if let Some(cf) = context_filter {
                if context.as_deref() != Some(cf) {
                    continue;
                }
            }
            if let Some(tf) = type_filter {
                if memory_type != tf {
                    continue;
                }
            }

            let Some(mut memory) = self.get_by_id(&memory_id)? else {
                continue;
            };

            if let Some(tags) = tag_filter {
                let tag_set: std::collections::HashSet<&str> =
                    memory.tags.iter().map(|t| t.as_str()).collect();
                if !tags.iter().any(|t| tag_set.contains(t.to_lowercase().as_str())) {
                    continue;
                }
            }

            memory.similarity = Some(similarity);
            memories.push(memory);
        }

        if use_hybrid_scoring && !memories.is_empty() {
            memories = apply_hybrid_scoring(memories);
        }

        memories.truncate(limit);
        let total = memories.len();
        Ok((memories, total))
    }

    /// Paginated listing, optionally filtered by context/tag/type (spec
    /// §6.2 `list_memories`).
    pub fn list_memories(
        &self,
        limit: usize,
        offset: usize,
        context_filter: Option<&str>,
        tag_filter: Option<&[String]>,
        type_filter: Option<MemoryType>,
    ) -> Result<(Vec<Memory>, i64, bool)> {
        let (sql, total_sql): (String, String) = match (context_filter, type_filter) {
            (Some(_), Some(_)) => (
                format!(
                    "SELECT m.id, m.content, m.summary, m.memory_type, m.created_at, m.updated_at, \
                     m.last_accessed_at, m.access_count, m.decay_rate, m.frustration_score, \
                     m.time_cost_hours, c.name as context \
                     FROM memories m LEFT JOIN contexts c ON m.context_id = c.id \
                     WHERE c.name = ?1 AND m.memory_type = ?2 \
                     ORDER BY m.created_at DESC LIMIT ?3 OFFSET ?4"
                ),
                "SELECT COUNT(*) FROM memories m LEFT JOIN contexts c ON m.context_id = c.id \
                 WHERE c.name = ?1 AND m.memory_type = ?2"
                    .to_string(),
            ),
            (Some(_), None) => (
                queries::LIST_MEMORIES_BY_CONTEXT.to_string(),
                "SELECT COUNT(*) FROM memories m LEFT JOIN contexts c ON m.context_id = c.id \
                 WHERE c.name = ?1"
                    .to_string(),
            ),
            (None, Some(_)) => (
                "SELECT m.id, m.content, m.summary, m.memory_type, m.created_at, m.updated_at, \
                 m.last_accessed_at, m.access_count, m.decay_rate, m.frustration_score, \
                 m.time_cost_hours, c.name as context \
                 FROM memories m LEFT JOIN contexts c ON m.context_id = c.id \
                 WHERE m.memory_type = ?1 \
                 ORDER BY m.created_at DESC LIMIT ?2 OFFSET ?3"
                    .to_string(),
                "SELECT COUNT(*) FROM memories WHERE memory_type = ?1".to_string(),
            ),
            (None, None) => (
                queries::LIST_MEMORIES.to_string(),
                queries::COUNT_MEMORIES.to_string(),
            ),
        };

        let total_count: i64 = self.storage.with_reader(|conn| {
            Ok(match (context_filter, type_filter) {
                (Some(ctx), Some(ty)) => {
                    conn.query_row(&total_sql, rusqlite::params![ctx, ty.as_str()], |r| r.get(0))?
                }
                (Some(ctx), None) => conn.query_row(&total_sql, [ctx], |r| r.get(0))?,
                (None, Some(ty)) => conn.query_row(&total_sql, [ty.as_str()], |r| r.get(0))?,
                (None, None) => conn.query_row(&total_sql, [], |r| r.get(0))?,
            })
        })?;

        let rows: Vec<Memory> = self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = match (context_filter, type_filter) {
                (Some(ctx), Some(ty)) => stmt
                    .query_map(
                        rusqlite::params![ctx, ty.as_str(), limit as i64, offset as i64],
                        row_to_memory,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                (Some(ctx), None) => stmt
                    .query_map(rusqlite::params![ctx, limit as i64, offset as i64], row_to_memory)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                (None, Some(ty)) => stmt
                    .query_map(
                        rusqlite::params![ty.as_str(), limit as i64, offset as i64],
                        row_to_memory,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                (None, None) => stmt
                    .query_map(rusqlite::params![limit as i64, offset as i64], row_to_memory)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            };
            Ok(rows)
        })?;

        let mut memories = Vec::with_capacity(rows.len());
        for mut memory in rows {
            memory.tags = self.tags_for(&memory.id)?;
            if let Some(tags) = tag_filter {
                let tag_set: std::collections::HashSet<&str> =
                    memory.tags.iter().map(|t| t.as_str()).collect();
                if !tags.iter().any(|t| tag_set.contains(t.to_lowercase().as_str())) {
                    continue;
                }
            }
            memories.push(memory);
        }

        let has_more = (offset + memories.len()) < total_count as usize;
        Ok((memories, total_count, has_more))
    }
}

/// Rerank by the hybrid score (spec §4.4.4): weighted blend of vector
/// similarity, recency (exponential decay), access frequency (log scale),
/// and frustration score. Replaces `similarity` in place with the hybrid
/// score so callers read one field regardless of which path produced it.
fn apply_hybrid_scoring(memories: Vec<Memory>) -> Vec<Memory> {
    const W_VEC: f64 = 0.5;
    const W_RECENCY: f64 = 0.2;
    const W_FREQ: f64 = 0.15;
    const W_FRUSTRATION: f64 = 0.15;
    const DECAY_LAMBDA: f64 = 0.01;

    let now = Utc::now();
    let max_access = memories.iter().map(|m| m.access_count).max().unwrap_or(1).max(1);
    let max_log_access = ((1 + max_access) as f64).ln();

    let mut scored: Vec<(f64, Memory)> = memories
        .into_iter()
        .map(|memory| {
            let s_vec = memory.similarity.unwrap_or(0.0).max(0.0);

            let reference_time = memory.last_accessed_at.unwrap_or(memory.created_at);
            let delta_days = (now - reference_time).num_seconds() as f64 / 86400.0;
            let s_recency = (-DECAY_LAMBDA * delta_days).exp();

            let access_count = memory.access_count.max(1);
            let s_freq = if max_log_access > 0.0 {
                ((1 + access_count) as f64).ln() / max_log_access
            } else {
                0.0
            };

            let s_frustration = memory.frustration_score;

            let hybrid_score =
                s_vec * W_VEC + s_recency * W_RECENCY + s_freq * W_FREQ + s_frustration * W_FRUSTRATION;

            (hybrid_score, memory)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.created_at.cmp(&a.1.created_at))
    });

    scored
        .into_iter()
        .map(|(hybrid_score, mut memory)| {
            memory.similarity = Some(hybrid_score);
            memory
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn memory(id: &str, similarity: f64, access_count: i64, frustration: f64, hours_ago: i64) -> Memory {
        Memory {
            id: id.to_string(),
            content: String::new(),
            summary: String::new(),
            memory_type: MemoryType::Insight,
            created_at: Utc::now() - Duration::hours(hours_ago),
            updated_at: Utc::now(),
            last_accessed_at: Some(Utc::now() - Duration::hours(hours_ago)),
            access_count,
            decay_rate: 0.1,
            frustration_score: frustration,
            time_cost_hours: None,
            context: None,
            tags: Vec::new(),
            similarity: Some(similarity),
            related_memories: Vec::new(),
        }
    }

    #[test]
    fn hybrid_scoring_favors_recent_frequent_and_frustrating_memories() {
        let stale = memory("a", 0.9, 1, 0.0, 24 * 200);
        let fresh = memory("b", 0.85, 50, 0.8, 1);

        let ranked = apply_hybrid_scoring(vec![stale, fresh]);
        assert_eq!(ranked[0].id, "b");
    }

    #[test]
    fn hybrid_scoring_preserves_all_memories() {
        let memories = vec![memory("a", 0.5, 1, 0.0, 1), memory("b", 0.4, 2, 0.1, 2)];
        let ranked = apply_hybrid_scoring(memories);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|m| m.similarity.is_some()));
    }
}
