//! Core data model: memories, contexts, tags, patterns, and the
//! relationships between them (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type of memory stored in the engine.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    #[default]
    Insight,
    Success,
    Failure,
    Decision,
    Note,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Insight => "insight",
            MemoryType::Success => "success",
            MemoryType::Failure => "failure",
            MemoryType::Decision => "decision",
            MemoryType::Note => "note",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "insight" => Some(MemoryType::Insight),
            "success" => Some(MemoryType::Success),
            "failure" => Some(MemoryType::Failure),
            "decision" => Some(MemoryType::Decision),
            "note" => Some(MemoryType::Note),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type of relationship between two memories (spec §3).
///
/// Includes the three temporal variants (`evolved_from`, `caused_by`,
/// `rejected_because`) that only appear as default filter values in
/// lineage traversal — see DESIGN.md OQ-1.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Related,
    Supersedes,
    Contradicts,
    Extends,
    DependsOn,
    EvolvedFrom,
    CausedBy,
    RejectedBecause,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Related => "related",
            RelationType::Supersedes => "supersedes",
            RelationType::Contradicts => "contradicts",
            RelationType::Extends => "extends",
            RelationType::DependsOn => "depends_on",
            RelationType::EvolvedFrom => "evolved_from",
            RelationType::CausedBy => "caused_by",
            RelationType::RejectedBecause => "rejected_because",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        Some(match s {
            "related" => RelationType::Related,
            "supersedes" => RelationType::Supersedes,
            "contradicts" => RelationType::Contradicts,
            "extends" => RelationType::Extends,
            "depends_on" => RelationType::DependsOn,
            "evolved_from" => RelationType::EvolvedFrom,
            "caused_by" => RelationType::CausedBy,
            "rejected_because" => RelationType::RejectedBecause,
            _ => return None,
        })
    }

    /// Default relation set followed by `trace_lineage` (spec §4.4.10).
    pub fn default_lineage_set() -> &'static [RelationType] {
        &[
            RelationType::EvolvedFrom,
            RelationType::CausedBy,
            RelationType::RejectedBecause,
            RelationType::Supersedes,
        ]
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Qualitative banding of `frustration_score` (spec §3 invariant 5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PainLevel {
    None,
    Low,
    Medium,
    High,
    Extreme,
}

impl PainLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.2 {
            PainLevel::None
        } else if score < 0.4 {
            PainLevel::Low
        } else if score < 0.6 {
            PainLevel::Medium
        } else if score < 0.8 {
            PainLevel::High
        } else {
            PainLevel::Extreme
        }
    }
}

/// A stored unit of knowledge (spec §3 `Memory`).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub summary: String,
    pub memory_type: MemoryType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: i64,
    pub decay_rate: f64,
    pub frustration_score: f64,
    pub time_cost_hours: Option<f64>,
    pub context: Option<String>,
    pub tags: Vec<String>,
    /// Vector similarity, or hybrid score after reranking (§4.4.4).
    /// `None` when the memory was not produced by a similarity search.
    pub similarity: Option<f64>,
    pub related_memories: Vec<MemoryLink>,
}

impl Memory {
    pub fn pain_level(&self) -> PainLevel {
        PainLevel::from_score(self.frustration_score)
    }
}

/// A `RELATED_TO` edge, as surfaced to callers (spec §3/§4.4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryLink {
    pub target_id: String,
    pub target_summary: Option<String>,
    pub relation_type: RelationType,
    pub reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// An abstract rule synthesized from a cluster of similar memories
/// (spec §3 `Pattern`).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub id: String,
    pub content: String,
    pub summary: String,
    pub confidence: f64,
    pub instance_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A node in a `trace_lineage` result (spec §4.4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageNode {
    pub id: String,
    pub summary: String,
    pub memory_type: MemoryType,
    pub created_at: DateTime<Utc>,
    pub depth: u32,
    pub relation_type: RelationType,
    pub reason: Option<String>,
}

/// Direction of `trace_lineage` traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineageDirection {
    Backward,
    Forward,
}

// ============================================================================
// Request / result DTOs (spec §6.2)
// ============================================================================

/// Input to `store_memory`. `deny_unknown_fields` rejects unexpected
/// payload keys at the transport boundary rather than silently ignoring
/// them.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct StoreMemoryInput {
    pub content: String,
    pub context_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub memory_type: MemoryType,
    #[serde(default)]
    pub is_painful: Option<bool>,
    #[serde(default)]
    pub time_cost_hours: Option<f64>,
    #[serde(default = "default_true")]
    pub auto_analyze: bool,
}

fn default_true() -> bool {
    true
}

/// A suggested link emitted by the analyzer (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedLink {
    pub target_id: String,
    pub target_summary: String,
    pub similarity: f64,
    pub suggested_relation: RelationType,
    pub reason: String,
}

/// An insight emitted by the analyzer (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeInsight {
    pub insight_type: String,
    pub message: String,
    pub related_memory_id: Option<String>,
    pub related_memory_summary: Option<String>,
    pub confidence: f64,
    pub suggested_action: Option<String>,
}

/// Result of `store_memory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMemoryResult {
    pub success: bool,
    pub memory_id: String,
    pub summary: String,
    pub suggested_links: Vec<SuggestedLink>,
    pub insights: Vec<KnowledgeInsight>,
}

/// Input to `recall_memories`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RecallMemoriesInput {
    pub query: String,
    #[serde(default = "default_recall_limit")]
    pub limit: usize,
    #[serde(default)]
    pub context_filter: Option<String>,
    #[serde(default)]
    pub tag_filter: Option<Vec<String>>,
    #[serde(default)]
    pub type_filter: Option<MemoryType>,
    #[serde(default = "default_true")]
    pub touch_on_recall: bool,
}

fn default_recall_limit() -> usize {
    5
}

/// Aggregate statistics (spec §6.2 `get_stats`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total_memories: i64,
    pub memories_by_type: std::collections::HashMap<String, i64>,
    pub total_contexts: i64,
    pub total_tags: i64,
    pub top_tags: Vec<TagCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

/// A health issue emitted by the health analyzer (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeHealthIssue {
    pub issue_type: String,
    pub severity: String,
    pub message: String,
    pub affected_memory_ids: Vec<String>,
    pub suggested_action: String,
}

/// Result of `analyze_knowledge` (spec §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeKnowledgeResult {
    pub total_memories: i64,
    pub health_score: f64,
    pub issues: Vec<KnowledgeHealthIssue>,
    pub suggestions: Vec<String>,
    pub stats: serde_json::Value,
}

/// Result of `consolidate_patterns` (spec §4.7/§6.2).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationSummary {
    pub patterns_found: usize,
    pub patterns_created: usize,
    pub memories_linked: usize,
    pub details: Vec<PatternDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDetail {
    pub pattern_id: String,
    pub summary: String,
    pub instance_count: i64,
}

/// Output of the frustration indexer (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrustrationIndex {
    pub frustration_score: f64,
    pub time_cost_hours: Option<f64>,
    pub pain_level: PainLevel,
    pub boost_factor: f64,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_round_trips_through_json() {
        let json = serde_json::to_string(&MemoryType::Failure).unwrap();
        assert_eq!(json, "\"failure\"");
        let back: MemoryType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MemoryType::Failure);
    }

    #[test]
    fn relation_type_has_all_eight_variants() {
        for name in [
            "related",
            "supersedes",
            "contradicts",
            "extends",
            "depends_on",
            "evolved_from",
            "caused_by",
            "rejected_because",
        ] {
            assert!(RelationType::parse_name(name).is_some(), "{name}");
        }
    }

    #[test]
    fn pain_level_bands_match_invariant_5() {
        assert_eq!(PainLevel::from_score(0.0), PainLevel::None);
        assert_eq!(PainLevel::from_score(0.2), PainLevel::Low);
        assert_eq!(PainLevel::from_score(0.4), PainLevel::Medium);
        assert_eq!(PainLevel::from_score(0.6), PainLevel::High);
        assert_eq!(PainLevel::from_score(0.8), PainLevel::Extreme);
        assert_eq!(PainLevel::from_score(1.0), PainLevel::Extreme);
    }

    #[test]
    fn store_memory_input_rejects_unknown_fields() {
        let raw = r#"{"content":"x","contextName":"c","tags":[],"bogus":1}"#;
        let result: std::result::Result<StoreMemoryInput, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }
}
