//! Centralized SQL for memory operations (spec §3 storage representation).
//!
//! One named constant per query instead of assembling SQL ad hoc at each
//! call site, so a future column addition touches one place instead of
//! N. Rows are read back by column name (`row.get("content")`) rather
//! than by position — `rusqlite` supports this directly, which
//! sidesteps the column-index-mismatch class of bug without needing
//! hand-kept index constants.

/// Shared projection for a full memory row, aliased so it can be reused
/// in queries that also select from `contexts`/`memory_links`.
pub const MEMORY_COLUMNS: &str = "m.id, m.content, m.summary, m.memory_type, \
    m.created_at, m.updated_at, m.last_accessed_at, m.access_count, \
    m.decay_rate, m.frustration_score, m.time_cost_hours";

pub const GET_BY_ID: &str = "SELECT m.id, m.content, m.summary, m.memory_type, \
    m.created_at, m.updated_at, m.last_accessed_at, m.access_count, m.decay_rate, \
    m.frustration_score, m.time_cost_hours, c.name as context \
    FROM memories m LEFT JOIN contexts c ON m.context_id = c.id \
    WHERE m.id = ?1";

pub const LIST_MEMORIES: &str = "SELECT m.id, m.content, m.summary, m.memory_type, \
    m.created_at, m.updated_at, m.last_accessed_at, m.access_count, m.decay_rate, \
    m.frustration_score, m.time_cost_hours, c.name as context \
    FROM memories m LEFT JOIN contexts c ON m.context_id = c.id \
    ORDER BY m.created_at DESC LIMIT ?1 OFFSET ?2";

pub const LIST_MEMORIES_BY_CONTEXT: &str = "SELECT m.id, m.content, m.summary, m.memory_type, \
    m.created_at, m.updated_at, m.last_accessed_at, m.access_count, m.decay_rate, \
    m.frustration_score, m.time_cost_hours, c.name as context \
    FROM memories m LEFT JOIN contexts c ON m.context_id = c.id \
    WHERE c.name = ?1 \
    ORDER BY m.created_at DESC LIMIT ?2 OFFSET ?3";

pub const GET_MEMORIES_BY_TAG: &str = "SELECT m.id, m.content, m.summary, m.memory_type, \
    m.created_at, m.updated_at, m.last_accessed_at, m.access_count, m.decay_rate, \
    m.frustration_score, m.time_cost_hours, c.name as context \
    FROM memories m \
    JOIN memory_tags mt ON mt.memory_id = m.id \
    JOIN tags t ON t.id = mt.tag_id AND t.name = ?1 \
    LEFT JOIN contexts c ON m.context_id = c.id \
    ORDER BY m.access_count DESC LIMIT ?2";

pub const GET_FREQUENTLY_ACCESSED: &str = "SELECT m.id, m.content, m.summary, m.memory_type, \
    m.created_at, m.updated_at, m.last_accessed_at, m.access_count, m.decay_rate, \
    m.frustration_score, m.time_cost_hours, c.name as context \
    FROM memories m LEFT JOIN contexts c ON m.context_id = c.id \
    WHERE m.access_count >= ?1 \
    ORDER BY m.access_count DESC LIMIT ?2";

pub const GET_TAGS_FOR_MEMORY: &str =
    "SELECT t.name FROM tags t JOIN memory_tags mt ON mt.tag_id = t.id WHERE mt.memory_id = ?1";

pub const EXPLORE_LINKED: &str = "SELECT m.id, m.content, m.summary, m.memory_type, \
    m.created_at, m.updated_at, m.last_accessed_at, m.access_count, m.decay_rate, \
    m.frustration_score, m.time_cost_hours, c.name as context, \
    l.relation_type, l.reason, l.created_at as link_created_at \
    FROM memory_links l \
    JOIN memories m ON m.id = l.target_id \
    LEFT JOIN contexts c ON m.context_id = c.id \
    WHERE l.source_id = ?1 \
    LIMIT ?2";

pub const EXPLORE_TAG_SIBLINGS: &str = "SELECT sibling.id, sibling.content, sibling.summary, \
    sibling.memory_type, sibling.created_at, sibling.updated_at, sibling.last_accessed_at, \
    sibling.access_count, sibling.decay_rate, sibling.frustration_score, \
    sibling.time_cost_hours, c.name as context, \
    COUNT(DISTINCT shared.tag_id) as shared_tag_count \
    FROM memory_tags mine \
    JOIN memory_tags shared ON shared.tag_id = mine.tag_id AND shared.memory_id != mine.memory_id \
    JOIN memories sibling ON sibling.id = shared.memory_id \
    LEFT JOIN contexts c ON sibling.context_id = c.id \
    WHERE mine.memory_id = ?1 \
    GROUP BY sibling.id \
    ORDER BY shared_tag_count DESC \
    LIMIT ?2";

pub const EXPLORE_CONTEXT_SIBLINGS: &str = "SELECT sibling.id, sibling.content, sibling.summary, \
    sibling.memory_type, sibling.created_at, sibling.updated_at, sibling.last_accessed_at, \
    sibling.access_count, sibling.decay_rate, sibling.frustration_score, \
    sibling.time_cost_hours, c.name as context \
    FROM memories m \
    JOIN memories sibling ON sibling.context_id = m.context_id AND sibling.id != m.id \
    LEFT JOIN contexts c ON sibling.context_id = c.id \
    WHERE m.id = ?1 AND m.context_id IS NOT NULL \
    ORDER BY sibling.created_at DESC \
    LIMIT ?2";

pub const GET_EMBEDDING: &str = "SELECT embedding FROM node_embeddings WHERE node_id = ?1";

pub const UPSERT_EMBEDDING: &str =
    "INSERT INTO node_embeddings (node_id, embedding) VALUES (?1, ?2) \
     ON CONFLICT(node_id) DO UPDATE SET embedding = excluded.embedding";

pub const LIST_ALL_EMBEDDINGS: &str = "SELECT node_id, embedding FROM node_embeddings";

pub const DELETE_MEMORY: &str = "DELETE FROM memories WHERE id = ?1";

pub const TOUCH_MEMORY: &str =
    "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ?2 WHERE id = ?1";

pub const GET_LINK_BY_ENDPOINTS: &str =
    "SELECT id, relation_type FROM memory_links WHERE source_id = ?1 AND target_id = ?2";

pub const DELETE_LINK: &str = "DELETE FROM memory_links WHERE source_id = ?1 AND target_id = ?2";

pub const CREATE_PATTERN: &str =
    "INSERT INTO patterns (id, content, summary, confidence, instance_count, created_at, updated_at) \
     VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)";

pub const UPSERT_PATTERN_EMBEDDING: &str =
    "INSERT INTO pattern_embeddings (pattern_id, embedding) VALUES (?1, ?2) \
     ON CONFLICT(pattern_id) DO UPDATE SET embedding = excluded.embedding";

pub const GET_PATTERN_BY_ID: &str = "SELECT id, content, summary, confidence, instance_count, \
    created_at, updated_at FROM patterns WHERE id = ?1";

pub const LIST_ALL_PATTERN_EMBEDDINGS: &str = "SELECT pattern_id, embedding FROM pattern_embeddings \
    JOIN patterns ON patterns.id = pattern_embeddings.pattern_id WHERE patterns.confidence >= ?1";

pub const PATTERN_INSTANCE_EXISTS: &str =
    "SELECT COUNT(*) FROM pattern_instances WHERE memory_id = ?1 AND pattern_id = ?2";

pub const LINK_MEMORY_TO_PATTERN: &str =
    "INSERT INTO pattern_instances (memory_id, pattern_id, confidence, created_at) VALUES (?1, ?2, ?3, ?4)";

pub const BUMP_PATTERN_CONFIDENCE: &str =
    "UPDATE patterns SET instance_count = instance_count + 1, updated_at = ?2, \
     confidence = CASE WHEN confidence < 0.9 THEN MIN(confidence + 0.05, 0.9) ELSE confidence END \
     WHERE id = ?1";

pub const COUNT_MEMORIES: &str = "SELECT COUNT(*) FROM memories";
pub const COUNT_MEMORIES_BY_TYPE: &str =
    "SELECT memory_type, COUNT(*) FROM memories GROUP BY memory_type";
pub const COUNT_CONTEXTS: &str = "SELECT COUNT(*) FROM contexts";
pub const COUNT_TAGS: &str = "SELECT COUNT(*) FROM tags";
pub const TOP_TAGS: &str = "SELECT t.name, COUNT(*) as c FROM memory_tags mt \
    JOIN tags t ON t.id = mt.tag_id GROUP BY t.name ORDER BY c DESC LIMIT ?1";
