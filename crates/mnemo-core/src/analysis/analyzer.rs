//! New-memory analysis: similarity-based insight detection and link
//! suggestion (spec §4.5).

use crate::error::Result;
use crate::model::{KnowledgeInsight, MemoryType, RelationType, SuggestedLink};
use crate::repository::Repository;

/// Keywords that suggest the new content contradicts existing knowledge —
/// broader set, used to decide *whether to check* for a contradiction at
/// all. Distinct from [`CONTRADICT_KEYWORDS`], which only narrows the
/// *inferred relation type* of an already-suggested link. The two lists
/// overlap but are not the same list; conflating them changes which
/// memories get flagged.
const CONTRADICTION_KEYWORDS: &[&str] = &[
    "but", "however", "instead", "wrong", "incorrect", "not", "don't", "shouldn't", "actually",
    "contrary",
];

const SUPERSEDE_KEYWORDS: &[&str] = &["updated", "new version", "replaces", "improved", "better approach"];

const CONTRADICT_KEYWORDS: &[&str] = &["wrong", "incorrect", "actually", "contrary", "opposite"];

/// Similarity thresholds and the repository analysis runs against.
pub struct Analyzer {
    link_threshold: f64,
    duplicate_threshold: f64,
    contradiction_threshold: f64,
}

impl Analyzer {
    pub fn new(link_threshold: f64, duplicate_threshold: f64, contradiction_threshold: f64) -> Self {
        Self {
            link_threshold,
            duplicate_threshold,
            contradiction_threshold,
        }
    }

    /// Analyze a freshly stored memory against its neighborhood (spec
    /// §4.5). Returns suggested links plus any insights (duplicate /
    /// contradiction / success-after-failure) worth surfacing to the
    /// caller.
    pub fn analyze_new_memory(
        &self,
        repo: &Repository,
        new_memory_id: &str,
        content: &str,
        embedding: &[f32],
        memory_type: MemoryType,
    ) -> Result<(Vec<SuggestedLink>, Vec<KnowledgeInsight>)> {
        let mut suggested_links = Vec::new();
        let mut insights = Vec::new();

        let similar_memories: Vec<_> = repo
            .search_similar_by_embedding(embedding, 10, Some(new_memory_id))?
            .into_iter()
            .filter(|(_, _, similarity, _, _)| *similarity > self.link_threshold)
            .collect();

        for (other_id, other_summary, similarity, other_type, other_context) in similar_memories.iter().take(5) {
            if *similarity > self.duplicate_threshold {
                insights.push(KnowledgeInsight {
                    insight_type: "potential_duplicate".to_string(),
                    message: format!("This memory is very similar ({:.0}%) to an existing one.", similarity * 100.0),
                    related_memory_id: Some(other_id.clone()),
                    related_memory_summary: Some(other_summary.clone()),
                    confidence: *similarity,
                    suggested_action: Some(format!(
                        "Use update_memory on '{other_id}' or link with 'supersedes'"
                    )),
                });
            } else {
                let suggested_relation =
                    infer_relation_type(memory_type, *other_type, content);
                let reason = generate_link_reason(memory_type, *other_type, *similarity, other_context.as_deref());

                suggested_links.push(SuggestedLink {
                    target_id: other_id.clone(),
                    target_summary: other_summary.clone(),
                    similarity: *similarity,
                    suggested_relation,
                    reason,
                });
            }
        }

        let content_lower = content.to_lowercase();
        let has_contradiction_signals =
            CONTRADICTION_KEYWORDS.iter().any(|kw| content_lower.contains(kw));

        if has_contradiction_signals {
            if let Some((top_id, top_summary, top_similarity, _, _)) = similar_memories.first() {
                if *top_similarity > self.contradiction_threshold {
                    insights.push(KnowledgeInsight {
                        insight_type: "potential_contradiction".to_string(),
                        message: "This memory may contradict existing knowledge.".to_string(),
                        related_memory_id: Some(top_id.clone()),
                        related_memory_summary: Some(top_summary.clone()),
                        confidence: 0.6,
                        suggested_action: Some("Review and link with 'supersedes' or 'contradicts'".to_string()),
                    });
                }
            }
        }

        if memory_type == MemoryType::Success {
            for (other_id, other_summary, similarity, other_type, _) in &similar_memories {
                if *other_type == MemoryType::Failure && *similarity > 0.6 {
                    insights.push(KnowledgeInsight {
                        insight_type: "success_after_failure".to_string(),
                        message: "This success may resolve a previous failure.".to_string(),
                        related_memory_id: Some(other_id.clone()),
                        related_memory_summary: Some(other_summary.clone()),
                        confidence: *similarity,
                        suggested_action: Some(format!("Link to '{other_id}' with 'extends' relation")),
                    });
                    break;
                }
            }
        }

        Ok((suggested_links, insights))
    }
}

fn infer_relation_type(new_type: MemoryType, existing_type: MemoryType, new_content: &str) -> RelationType {
    let new_content_lower = new_content.to_lowercase();

    if new_type == MemoryType::Success
        && matches!(existing_type, MemoryType::Insight | MemoryType::Decision | MemoryType::Failure)
    {
        return RelationType::Extends;
    }

    if new_type == MemoryType::Decision && existing_type == MemoryType::Insight {
        return RelationType::DependsOn;
    }

    if SUPERSEDE_KEYWORDS.iter().any(|kw| new_content_lower.contains(kw)) {
        return RelationType::Supersedes;
    }

    if CONTRADICT_KEYWORDS.iter().any(|kw| new_content_lower.contains(kw)) {
        return RelationType::Contradicts;
    }

    RelationType::Related
}

fn generate_link_reason(
    new_type: MemoryType,
    existing_type: MemoryType,
    similarity: f64,
    existing_context: Option<&str>,
) -> String {
    let mut reasons = Vec::new();

    if similarity > 0.85 {
        reasons.push("Very high semantic similarity".to_string());
    } else if similarity > 0.75 {
        reasons.push("High semantic similarity".to_string());
    } else {
        reasons.push("Moderate semantic similarity".to_string());
    }

    if new_type == MemoryType::Success && existing_type == MemoryType::Failure {
        reasons.push("may be a solution to the recorded failure".to_string());
    } else if new_type == MemoryType::Success && existing_type == MemoryType::Insight {
        reasons.push("may be an application of this insight".to_string());
    } else if new_type == MemoryType::Decision && existing_type == MemoryType::Insight {
        reasons.push("decision may be based on this insight".to_string());
    }

    if let Some(context) = existing_context {
        reasons.push(format!("from project '{context}'"));
    }

    reasons.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_extends_from_success_onto_failure() {
        assert_eq!(
            infer_relation_type(MemoryType::Success, MemoryType::Failure, "it works now"),
            RelationType::Extends
        );
    }

    #[test]
    fn infers_depends_on_from_decision_onto_insight() {
        assert_eq!(
            infer_relation_type(MemoryType::Decision, MemoryType::Insight, "going with option B"),
            RelationType::DependsOn
        );
    }

    #[test]
    fn infers_supersedes_from_keyword() {
        assert_eq!(
            infer_relation_type(MemoryType::Note, MemoryType::Note, "this replaces the old approach"),
            RelationType::Supersedes
        );
    }

    #[test]
    fn infers_contradicts_from_keyword() {
        assert_eq!(
            infer_relation_type(MemoryType::Note, MemoryType::Note, "actually this is wrong"),
            RelationType::Contradicts
        );
    }

    #[test]
    fn falls_back_to_related() {
        assert_eq!(
            infer_relation_type(MemoryType::Note, MemoryType::Note, "just a note"),
            RelationType::Related
        );
    }

    #[test]
    fn link_reason_bands_by_similarity_and_appends_context() {
        let reason = generate_link_reason(MemoryType::Success, MemoryType::Failure, 0.9, Some("acme"));
        assert!(reason.contains("Very high semantic similarity"));
        assert!(reason.contains("solution to the recorded failure"));
        assert!(reason.contains("from project 'acme'"));
    }
}
