//! Create/read/update/delete operations on individual memories (spec
//! §4.4.1, §4.4.2, §4.4.6, §4.4.7).

use super::{row_to_memory, Repository};
use crate::error::{MnemoError, Result};
use crate::model::{Memory, MemoryType};
use crate::storage::queries;
use chrono::Utc;
use uuid::Uuid;

impl Repository {
    /// Create a new memory (spec §4.4.1). Returns `(id, summary, embedding)`.
    pub fn create_memory(
        &self,
        content: &str,
        context_name: &str,
        tags: &[String],
        memory_type: MemoryType,
        frustration_score: f64,
        time_cost_hours: Option<f64>,
    ) -> Result<(String, String, Vec<f32>)> {
        if content.trim().is_empty() {
            return Err(MnemoError::Validation("content cannot be empty".into()));
        }
        if context_name.trim().is_empty() {
            return Err(MnemoError::Validation("context_name cannot be empty".into()));
        }
        if tags.len() > self.config.max_tags_per_memory {
            return Err(MnemoError::Validation(format!(
                "too many tags: {} exceeds limit of {}",
                tags.len(),
                self.config.max_tags_per_memory
            )));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let summary = generate_summary(content, self.config.max_summary_length);
        let embedding = self
            .embedder
            .embed(content)
            .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))?;

        let normalized_tags = normalize_tags(tags);

        self.storage.with_writer(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO contexts (id, name, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![Uuid::new_v4().to_string(), context_name, now],
            )?;
            conn.execute(
                "INSERT INTO memories (id, content, summary, memory_type, created_at, \
                 updated_at, last_accessed_at, access_count, decay_rate, frustration_score, \
                 time_cost_hours, context_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5, 1, 0.1, ?6, ?7, \
                 (SELECT id FROM contexts WHERE name = ?8))",
                rusqlite::params![
                    id,
                    content,
                    summary,
                    memory_type.as_str(),
                    now,
                    frustration_score,
                    time_cost_hours,
                    context_name,
                ],
            )?;
            Ok(())
        })?;

        self.attach_tags(&id, &normalized_tags, now)?;
        self.store_embedding(&id, &embedding)?;

        Ok((id, summary, embedding))
    }

    pub(crate) fn attach_tags(&self, memory_id: &str, tags: &[String], now: chrono::DateTime<Utc>) -> Result<()> {
        for tag in tags {
            self.storage.with_writer(|conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO tags (id, name, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![Uuid::new_v4().to_string(), tag, now],
                )?;
                conn.execute(
                    "INSERT OR IGNORE INTO memory_tags (memory_id, tag_id) \
                     SELECT ?1, id FROM tags WHERE name = ?2",
                    rusqlite::params![memory_id, tag],
                )?;
                Ok(())
            })?;
        }
        Ok(())
    }

    pub(crate) fn store_embedding(&self, memory_id: &str, embedding: &[f32]) -> Result<()> {
        let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
        self.storage.with_writer(|conn| {
            conn.execute(queries::UPSERT_EMBEDDING, rusqlite::params![memory_id, bytes])?;
            Ok(())
        })?;

        #[cfg(feature = "vector-search")]
        {
            let mut index = self
                .vector_index
                .lock()
                .map_err(|_| MnemoError::LockTimeout { attempts: 0 })?;
            index
                .add(memory_id, embedding)
                .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))?;
        }
        Ok(())
    }

    /// Fetch a memory by id (spec §4.4.2), populated with its tags.
    pub fn get_by_id(&self, memory_id: &str) -> Result<Option<Memory>> {
        let memory = self.storage.with_reader(|conn| {
            conn.query_row(queries::GET_BY_ID, [memory_id], |row| row_to_memory(row))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })
        })?;

        let Some(mut memory) = memory else {
            return Ok(None);
        };
        memory.tags = self.tags_for(memory_id)?;
        Ok(Some(memory))
    }

    pub(crate) fn tags_for(&self, memory_id: &str) -> Result<Vec<String>> {
        self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(queries::GET_TAGS_FOR_MEMORY)?;
            let tags = stmt
                .query_map([memory_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(tags)
        })
    }

    /// Update a memory in place, or delete-and-recreate when `content`
    /// changes (spec §4.4.6) — the vector index forbids in-place mutation
    /// of an indexed embedding, so a content edit must reinsert the node
    /// under the same id with all incident edges rebuilt.
    pub fn update_memory(
        &self,
        memory_id: &str,
        content: Option<&str>,
        tags: Option<&[String]>,
        memory_type: Option<MemoryType>,
    ) -> Result<(bool, Vec<String>, String)> {
        let Some(existing) = self.get_by_id(memory_id)? else {
            return Ok((false, Vec::new(), String::new()));
        };

        let mut changes = Vec::new();
        let now = Utc::now();
        let mut summary = existing.summary.clone();

        if let Some(new_content) = content {
            let new_embedding = self
                .embedder
                .embed(new_content)
                .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))?;
            summary = generate_summary(new_content, self.config.max_summary_length);
            let new_type = memory_type.unwrap_or(existing.memory_type);
            let tags_to_apply: Vec<String> = match tags {
                Some(t) => normalize_tags(t),
                None => existing.tags.clone(),
            };

            let outgoing = self.links_from(memory_id)?;
            let incoming = self.links_to(memory_id)?;

            self.storage.with_writer(|conn| {
                conn.execute("DELETE FROM memory_tags WHERE memory_id = ?1", [memory_id])?;
                conn.execute(
                    "DELETE FROM memory_links WHERE source_id = ?1 OR target_id = ?1",
                    [memory_id],
                )?;
                conn.execute(queries::DELETE_MEMORY, [memory_id])?;
                conn.execute(
                    "INSERT INTO memories (id, content, summary, memory_type, created_at, \
                     updated_at, last_accessed_at, access_count, decay_rate, frustration_score, \
                     time_cost_hours, context_id) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7, ?8, ?9, ?10, \
                     (SELECT id FROM contexts WHERE name = ?11))",
                    rusqlite::params![
                        memory_id,
                        new_content,
                        summary,
                        new_type.as_str(),
                        existing.created_at,
                        now,
                        existing.access_count,
                        existing.decay_rate,
                        existing.frustration_score,
                        existing.time_cost_hours,
                        existing.context,
                    ],
                )?;
                Ok(())
            })?;

            self.attach_tags(memory_id, &tags_to_apply, now)?;
            self.store_embedding(memory_id, &new_embedding)?;

            for link in &outgoing {
                self.create_link_raw(memory_id, &link.other_id, link.relation_type, link.reason.as_deref(), link.created_at)?;
            }
            for link in &incoming {
                self.create_link_raw(&link.other_id, memory_id, link.relation_type, link.reason.as_deref(), link.created_at)?;
            }

            changes.push("content".to_string());
            if memory_type.is_some() {
                changes.push("memory_type".to_string());
            }
            if tags.is_some() {
                changes.push("tags".to_string());
            }
        } else {
            if let Some(new_type) = memory_type {
                self.storage.with_writer(|conn| {
                    conn.execute(
                        "UPDATE memories SET memory_type = ?2, updated_at = ?3 WHERE id = ?1",
                        rusqlite::params![memory_id, new_type.as_str(), now],
                    )?;
                    Ok(())
                })?;
                changes.push("memory_type".to_string());
            }

            if let Some(new_tags) = tags {
                let normalized = normalize_tags(new_tags);
                self.storage.with_writer(|conn| {
                    conn.execute("DELETE FROM memory_tags WHERE memory_id = ?1", [memory_id])?;
                    Ok(())
                })?;
                self.attach_tags(memory_id, &normalized, now)?;
                changes.push("tags".to_string());
            }

            if !changes.is_empty() {
                self.storage.with_writer(|conn| {
                    conn.execute(
                        "UPDATE memories SET updated_at = ?2 WHERE id = ?1",
                        rusqlite::params![memory_id, now],
                    )?;
                    Ok(())
                })?;
            }
        }

        Ok((true, changes, summary))
    }

    /// Delete a memory and every edge touching it (spec §4.4.... see
    /// `ON DELETE CASCADE` on `memory_tags`/`memory_links`).
    pub fn delete_memory(&self, memory_id: &str) -> Result<bool> {
        let existed = self.get_by_id(memory_id)?.is_some();
        if !existed {
            return Ok(false);
        }

        self.storage.with_writer(|conn| {
            conn.execute(queries::DELETE_MEMORY, [memory_id])?;
            Ok(())
        })?;

        #[cfg(feature = "vector-search")]
        {
            let mut index = self
                .vector_index
                .lock()
                .map_err(|_| MnemoError::LockTimeout { attempts: 0 })?;
            index
                .remove(memory_id)
                .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))?;
        }

        Ok(true)
    }

    /// Update access metadata (spec §4.4 "touch on recall").
    pub fn touch_memory(&self, memory_id: &str) -> Result<bool> {
        let now = Utc::now();
        let updated = self.storage.with_writer(|conn| {
            Ok(conn.execute(queries::TOUCH_MEMORY, rusqlite::params![memory_id, now])?)
        })?;
        Ok(updated > 0)
    }

    pub fn touch_memories(&self, memory_ids: &[String]) -> Result<usize> {
        let mut touched = 0;
        for id in memory_ids {
            if self.touch_memory(id)? {
                touched += 1;
            }
        }
        Ok(touched)
    }

    /// Embed arbitrary text outside of memory creation — used by the
    /// pattern consolidator to embed cluster samples (spec §4.7).
    pub fn embed_for_consolidation(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed(text)
            .map_err(|e| MnemoError::EmbeddingUnavailable(e.to_string()))
    }

    /// Memories carrying `tag`, ordered by access count descending (spec
    /// §4.7 candidate selection when a tag filter is given).
    pub fn get_memories_by_tag(&self, tag: &str, limit: usize) -> Result<Vec<Memory>> {
        let rows: Vec<Memory> = self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(queries::GET_MEMORIES_BY_TAG)?;
            let rows = stmt
                .query_map(rusqlite::params![tag, limit as i64], row_to_memory)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut memories = Vec::with_capacity(rows.len());
        for mut memory in rows {
            memory.tags = self.tags_for(&memory.id)?;
            memories.push(memory);
        }
        Ok(memories)
    }

    /// Memories accessed at least `min_access_count` times (spec §4.7
    /// candidate selection when no tag filter is given).
    pub fn get_frequently_accessed(&self, min_access_count: i64, limit: usize) -> Result<Vec<Memory>> {
        let rows: Vec<Memory> = self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(queries::GET_FREQUENTLY_ACCESSED)?;
            let rows = stmt
                .query_map(rusqlite::params![min_access_count, limit as i64], row_to_memory)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut memories = Vec::with_capacity(rows.len());
        for mut memory in rows {
            memory.tags = self.tags_for(&memory.id)?;
            memories.push(memory);
        }
        Ok(memories)
    }
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Deterministic summary truncation (spec §4.4.7): if content fits within
/// `max_len`, return it as-is. Otherwise cut to `max_len` and back up to
/// the last whitespace boundary when that boundary lies beyond 70% of the
/// limit, then append an ellipsis.
pub(crate) fn generate_summary(content: &str, max_len: usize) -> String {
    let content = content.trim();
    if content.chars().count() <= max_len {
        return content.to_string();
    }

    let truncated: String = content.chars().take(max_len).collect();
    let cutoff = (max_len as f64 * 0.7) as usize;

    if let Some(last_space) = truncated.rfind(char::is_whitespace) {
        let char_pos = truncated[..last_space].chars().count();
        if char_pos > cutoff {
            return format!("{}…", truncated[..last_space].trim_end());
        }
    }

    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_returned_unchanged() {
        assert_eq!(generate_summary("hello world", 200), "hello world");
    }

    #[test]
    fn long_content_backs_up_to_whitespace_past_70_percent() {
        let content = "a".repeat(75) + " " + &"b".repeat(50);
        let summary = generate_summary(&content, 100);
        assert!(summary.ends_with('…'));
        assert!(!summary.contains("bbbb"));
    }

    #[test]
    fn long_content_without_late_whitespace_hard_truncates() {
        let content = "a".repeat(300);
        let summary = generate_summary(&content, 100);
        assert_eq!(summary.chars().count(), 101);
        assert!(summary.ends_with('…'));
    }
}
