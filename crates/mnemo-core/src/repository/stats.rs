//! Aggregate statistics and health-analysis queries (spec §4.4.11, §4.6).
//!
//! Count/group-by/top-N queries with no business logic beyond what SQL
//! expresses directly; the health analyzer builds its issues and score
//! on top of these primitives.

use super::Repository;
use crate::error::Result;
use crate::model::{MemoryStats, TagCount};
use crate::storage::queries;
use chrono::{DateTime, Utc};

impl Repository {
    /// Counts and top tags over the whole store (spec §4.4.11).
    pub fn get_stats(&self) -> Result<MemoryStats> {
        self.storage.with_reader(|conn| {
            let total_memories: i64 = conn.query_row(queries::COUNT_MEMORIES, [], |r| r.get(0))?;

            let mut by_type_stmt = conn.prepare(queries::COUNT_MEMORIES_BY_TYPE)?;
            let memories_by_type = by_type_stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<std::result::Result<std::collections::HashMap<_, _>, _>>()?;

            let total_contexts: i64 = conn.query_row(queries::COUNT_CONTEXTS, [], |r| r.get(0))?;
            let total_tags: i64 = conn.query_row(queries::COUNT_TAGS, [], |r| r.get(0))?;

            let mut top_tags_stmt = conn.prepare(queries::TOP_TAGS)?;
            let top_tags = top_tags_stmt
                .query_map([10i64], |row| {
                    Ok(TagCount {
                        name: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(MemoryStats {
                total_memories,
                memories_by_type,
                total_contexts,
                total_tags,
                top_tags,
            })
        })
    }

    /// Memories with no tags attached (spec §4.6 "unlinked/orphan" issue).
    pub fn get_orphan_memories(&self, limit: usize) -> Result<Vec<(String, String)>> {
        self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.summary FROM memories m \
                 WHERE NOT EXISTS (SELECT 1 FROM memory_tags mt WHERE mt.memory_id = m.id) \
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Count of memories with no `RELATED_TO` edge in either direction
    /// (spec §4.6 "unlinked_ratio").
    pub fn get_unlinked_count(&self) -> Result<i64> {
        self.storage.with_reader(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM memories m \
                 WHERE NOT EXISTS (SELECT 1 FROM memory_links l WHERE l.source_id = m.id) \
                   AND NOT EXISTS (SELECT 1 FROM memory_links l WHERE l.target_id = m.id)",
                [],
                |r| r.get(0),
            )?)
        })
    }

    /// Memories not updated since `threshold` (spec §4.6 "stale" issue).
    pub fn get_stale_memories(
        &self,
        threshold: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<(String, String)>> {
        self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, summary FROM memories WHERE updated_at < ?1 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![threshold, limit as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
