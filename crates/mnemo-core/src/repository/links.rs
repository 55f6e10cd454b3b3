//! Link creation, retrieval, and graph exploration (spec §4.4.8, §4.4.9,
//! §4.4.10).

use super::{row_to_memory, Repository};
use crate::error::{MnemoError, Result};
use crate::model::{LineageDirection, LineageNode, Memory, MemoryLink, RelationType};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A link with only the "other side" of the relationship kept, used when
/// rebuilding edges during `update_memory`'s delete-and-recreate.
pub(crate) struct RawLink {
    pub other_id: String,
    pub relation_type: RelationType,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Repository {
    /// Create a `RELATED_TO` edge (spec §4.4.8).
    pub fn create_link(
        &self,
        source_id: &str,
        target_id: &str,
        relation_type: RelationType,
        reason: Option<&str>,
    ) -> Result<()> {
        if source_id == target_id {
            return Err(MnemoError::SelfLink(source_id.to_string()));
        }

        if self.get_by_id(source_id)?.is_none() || self.get_by_id(target_id)?.is_none() {
            return Err(MnemoError::NotFound(format!("{source_id} or {target_id}")));
        }

        if let Some(existing) = self.existing_link_relation(source_id, target_id)? {
            return Err(MnemoError::DuplicateLink {
                source: source_id.to_string(),
                target: target_id.to_string(),
                existing_relation: existing,
            });
        }

        self.create_link_raw(source_id, target_id, relation_type, reason, Utc::now())
    }

    pub(crate) fn create_link_raw(
        &self,
        source_id: &str,
        target_id: &str,
        relation_type: RelationType,
        reason: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.storage.with_writer(|conn| {
            conn.execute(
                "INSERT INTO memory_links (id, source_id, target_id, relation_type, reason, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    source_id,
                    target_id,
                    relation_type.as_str(),
                    reason,
                    created_at,
                ],
            )?;
            Ok(())
        })
    }

    fn existing_link_relation(&self, source_id: &str, target_id: &str) -> Result<Option<RelationType>> {
        self.storage.with_reader(|conn| {
            let relation: Option<String> = conn
                .query_row(
                    crate::storage::queries::GET_LINK_BY_ENDPOINTS,
                    [source_id, target_id],
                    |row| row.get(1),
                )
                .ok();
            Ok(relation.and_then(|r| RelationType::parse_name(&r)))
        })
    }

    /// Outgoing `RELATED_TO` edges from `memory_id` (spec §4.4.9).
    pub fn get_links(&self, memory_id: &str) -> Result<Vec<MemoryLink>> {
        self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT l.target_id, m.summary, l.relation_type, l.reason, l.created_at \
                 FROM memory_links l JOIN memories m ON m.id = l.target_id \
                 WHERE l.source_id = ?1",
            )?;
            let links = stmt
                .query_map([memory_id], |row| {
                    let relation: String = row.get(2)?;
                    Ok(MemoryLink {
                        target_id: row.get(0)?,
                        target_summary: row.get(1)?,
                        relation_type: RelationType::parse_name(&relation)
                            .unwrap_or(RelationType::Related),
                        reason: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(links)
        })
    }

    /// Incoming `RELATED_TO` edges to `memory_id`, optionally filtered by
    /// relation type (spec §4.4.9). `MemoryLink::target_id` here carries
    /// the *source* memory's id — the caller reads it as "the memory that
    /// links to this one", reusing the same field rather than adding a
    /// parallel `source_id`-named type.
    pub fn get_incoming_links(
        &self,
        memory_id: &str,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<MemoryLink>> {
        self.storage.with_reader(|conn| {
            let sql = "SELECT l.source_id, m.summary, l.relation_type, l.reason, l.created_at \
                 FROM memory_links l JOIN memories m ON m.id = l.source_id \
                 WHERE l.target_id = ?1";
            let mut stmt = conn.prepare(sql)?;
            let links = stmt
                .query_map([memory_id], |row| {
                    let relation: String = row.get(2)?;
                    Ok(MemoryLink {
                        target_id: row.get(0)?,
                        target_summary: row.get(1)?,
                        relation_type: RelationType::parse_name(&relation)
                            .unwrap_or(RelationType::Related),
                        reason: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(links
                .into_iter()
                .filter(|l| relation_type.is_none_or(|rt| rt.as_str() == l.relation_type.as_str()))
                .collect())
        })
    }

    pub(crate) fn links_from(&self, memory_id: &str) -> Result<Vec<RawLink>> {
        self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT target_id, relation_type, reason, created_at FROM memory_links WHERE source_id = ?1",
            )?;
            let links = stmt
                .query_map([memory_id], |row| {
                    let relation: String = row.get(1)?;
                    Ok(RawLink {
                        other_id: row.get(0)?,
                        relation_type: RelationType::parse_name(&relation)
                            .unwrap_or(RelationType::Related),
                        reason: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(links)
        })
    }

    pub(crate) fn links_to(&self, memory_id: &str) -> Result<Vec<RawLink>> {
        self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT source_id, relation_type, reason, created_at FROM memory_links WHERE target_id = ?1",
            )?;
            let links = stmt
                .query_map([memory_id], |row| {
                    let relation: String = row.get(1)?;
                    Ok(RawLink {
                        other_id: row.get(0)?,
                        relation_type: RelationType::parse_name(&relation)
                            .unwrap_or(RelationType::Related),
                        reason: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(links)
        })
    }

    /// Delete a `RELATED_TO` edge (spec §4.4.8).
    pub fn delete_link(&self, source_id: &str, target_id: &str) -> Result<bool> {
        let deleted = self.storage.with_writer(|conn| {
            Ok(conn.execute(
                crate::storage::queries::DELETE_LINK,
                [source_id, target_id],
            )?)
        })?;
        Ok(deleted > 0)
    }

    /// Explore the neighborhood of a memory: direct links, tag siblings,
    /// and context siblings (spec §4.4.9). Each category is deduplicated
    /// against the categories already emitted, so a memory appearing in
    /// `linked` never also shows up in `by_tag`/`by_context`.
    pub fn explore_related(
        &self,
        memory_id: &str,
        include_tag_siblings: bool,
        include_context_siblings: bool,
        max_per_category: usize,
    ) -> Result<ExploreResult> {
        let linked = self.explore_linked(memory_id, max_per_category)?;
        let mut seen: std::collections::HashSet<String> =
            linked.iter().map(|m| m.id.clone()).collect();

        let by_tag = if include_tag_siblings {
            let siblings = self.explore_tag_siblings(memory_id, max_per_category)?;
            let filtered: Vec<Memory> = siblings
                .into_iter()
                .filter(|m| seen.insert(m.id.clone()))
                .collect();
            filtered
        } else {
            Vec::new()
        };

        let by_context = if include_context_siblings {
            let siblings = self.explore_context_siblings(memory_id, max_per_category)?;
            siblings.into_iter().filter(|m| seen.insert(m.id.clone())).collect()
        } else {
            Vec::new()
        };

        Ok(ExploreResult {
            linked,
            by_tag,
            by_context,
        })
    }

    fn explore_linked(&self, memory_id: &str, limit: usize) -> Result<Vec<Memory>> {
        self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(crate::storage::queries::EXPLORE_LINKED)?;
            let rows = stmt
                .query_map(rusqlite::params![memory_id, limit as i64], |row| {
                    let mut memory = row_to_memory(row)?;
                    let relation: String = row.get("relation_type")?;
                    let reason: Option<String> = row.get("reason")?;
                    memory.related_memories.push(MemoryLink {
                        target_id: memory_id.to_string(),
                        target_summary: None,
                        relation_type: RelationType::parse_name(&relation)
                            .unwrap_or(RelationType::Related),
                        reason,
                        created_at: row.get("link_created_at").ok(),
                    });
                    Ok(memory)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn explore_tag_siblings(&self, memory_id: &str, limit: usize) -> Result<Vec<Memory>> {
        self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(crate::storage::queries::EXPLORE_TAG_SIBLINGS)?;
            let rows = stmt
                .query_map(rusqlite::params![memory_id, limit as i64], |row| row_to_memory(row))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn explore_context_siblings(&self, memory_id: &str, limit: usize) -> Result<Vec<Memory>> {
        self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(crate::storage::queries::EXPLORE_CONTEXT_SIBLINGS)?;
            let rows = stmt
                .query_map(rusqlite::params![memory_id, limit as i64], |row| row_to_memory(row))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Breadth-first traversal of temporal relationships (spec §4.4.10).
    pub fn trace_lineage(
        &self,
        memory_id: &str,
        direction: LineageDirection,
        relation_types: Option<&[RelationType]>,
        max_depth: u32,
    ) -> Result<Vec<LineageNode>> {
        let relation_types: Vec<RelationType> = relation_types
            .map(|r| r.to_vec())
            .unwrap_or_else(|| RelationType::default_lineage_set().to_vec());

        let mut lineage = Vec::new();
        let mut visited: std::collections::HashSet<String> =
            std::collections::HashSet::from([memory_id.to_string()]);
        let mut frontier = vec![memory_id.to_string()];
        let mut depth = 0;

        while !frontier.is_empty() && depth < max_depth {
            depth += 1;
            let mut next_frontier = Vec::new();

            for current_id in &frontier {
                let rows = self.lineage_step(current_id, direction, &relation_types)?;
                for (node_id, summary, memory_type, created_at, relation_type, reason) in rows {
                    if visited.insert(node_id.clone()) {
                        next_frontier.push(node_id.clone());
                        lineage.push(LineageNode {
                            id: node_id,
                            summary,
                            memory_type,
                            created_at,
                            depth,
                            relation_type,
                            reason,
                        });
                    }
                }
            }

            frontier = next_frontier;
        }

        match direction {
            LineageDirection::Backward => lineage.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            LineageDirection::Forward => lineage.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }

        Ok(lineage)
    }

    #[allow(clippy::type_complexity)]
    fn lineage_step(
        &self,
        current_id: &str,
        direction: LineageDirection,
        relation_types: &[RelationType],
    ) -> Result<Vec<(String, String, crate::model::MemoryType, DateTime<Utc>, RelationType, Option<String>)>> {
        let placeholders: Vec<String> = (0..relation_types.len()).map(|i| format!("?{}", i + 2)).collect();
        let in_clause = placeholders.join(", ");

        let sql = match direction {
            LineageDirection::Backward => format!(
                "SELECT target.id, target.summary, target.memory_type, target.created_at, \
                 l.relation_type, l.reason \
                 FROM memory_links l JOIN memories target ON target.id = l.target_id \
                 WHERE l.source_id = ?1 AND l.relation_type IN ({in_clause}) \
                 ORDER BY target.created_at DESC"
            ),
            LineageDirection::Forward => format!(
                "SELECT source.id, source.summary, source.memory_type, source.created_at, \
                 l.relation_type, l.reason \
                 FROM memory_links l JOIN memories source ON source.id = l.source_id \
                 WHERE l.target_id = ?1 AND l.relation_type IN ({in_clause}) \
                 ORDER BY source.created_at ASC"
            ),
        };

        self.storage.with_reader(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::ToSql> = vec![&current_id];
            let relation_strs: Vec<&str> = relation_types.iter().map(|r| r.as_str()).collect();
            for s in &relation_strs {
                params.push(s);
            }

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    let memory_type: String = row.get(2)?;
                    let relation: String = row.get(4)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        crate::model::MemoryType::parse_name(&memory_type).unwrap_or_default(),
                        row.get::<_, DateTime<Utc>>(3)?,
                        RelationType::parse_name(&relation).unwrap_or(RelationType::Related),
                        row.get::<_, Option<String>>(5)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Result of `explore_related` (spec §4.4.9).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploreResult {
    pub linked: Vec<Memory>,
    pub by_tag: Vec<Memory>,
    pub by_context: Vec<Memory>,
}
