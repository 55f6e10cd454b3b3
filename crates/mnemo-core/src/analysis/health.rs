//! Knowledge base health analysis (spec §4.6): orphan/unlinked/stale
//! detection, health score, and improvement suggestions.

use crate::error::Result;
use crate::model::{AnalyzeKnowledgeResult, KnowledgeHealthIssue, MemoryStats, MemoryType};
use crate::repository::Repository;
use chrono::{Duration, Utc};

pub struct HealthAnalyzer {
    stale_days: i64,
}

impl HealthAnalyzer {
    pub fn new(stale_days: i64) -> Self {
        Self { stale_days }
    }

    pub fn analyze(&self, repo: &Repository) -> Result<AnalyzeKnowledgeResult> {
        let memory_stats = repo.get_stats()?;
        let total_memories = memory_stats.total_memories;

        if total_memories == 0 {
            return Ok(AnalyzeKnowledgeResult {
                total_memories: 0,
                health_score: 100.0,
                issues: Vec::new(),
                suggestions: vec!["Start storing memories to build your external brain!".to_string()],
                stats: serde_json::json!({}),
            });
        }

        let mut issues = Vec::new();

        let orphan_memories = repo.get_orphan_memories(10)?;
        if !orphan_memories.is_empty() {
            issues.push(KnowledgeHealthIssue {
                issue_type: "orphan_memories".to_string(),
                severity: "medium".to_string(),
                message: format!("{} memories have no tags.", orphan_memories.len()),
                affected_memory_ids: orphan_memories.iter().map(|(id, _)| id.clone()).collect(),
                suggested_action: "Add tags using update_memory".to_string(),
            });
        }

        let unlinked_count = repo.get_unlinked_count()?;

        if unlinked_count > 0 && total_memories > 5 {
            let link_ratio = unlinked_count as f64 / total_memories as f64;
            if link_ratio > 0.8 {
                issues.push(KnowledgeHealthIssue {
                    issue_type: "low_connectivity".to_string(),
                    severity: "low".to_string(),
                    message: format!("{unlinked_count}/{total_memories} memories have no links."),
                    affected_memory_ids: Vec::new(),
                    suggested_action: "Use explore_related and link_memories".to_string(),
                });
            }
        }

        let stale_threshold = Utc::now() - Duration::days(self.stale_days);
        let stale_memories = repo.get_stale_memories(stale_threshold, 10)?;
        if !stale_memories.is_empty() {
            issues.push(KnowledgeHealthIssue {
                issue_type: "stale_memories".to_string(),
                severity: "low".to_string(),
                message: format!(
                    "{}+ memories not updated in {}+ days.",
                    stale_memories.len(),
                    self.stale_days
                ),
                affected_memory_ids: stale_memories.iter().map(|(id, _)| id.clone()).collect(),
                suggested_action: "Review and update or mark as superseded".to_string(),
            });
        }

        let health_score = calculate_health_score(&issues, unlinked_count, total_memories);
        let suggestions = generate_suggestions(&issues, total_memories, &memory_stats);

        Ok(AnalyzeKnowledgeResult {
            total_memories,
            health_score,
            issues,
            suggestions,
            stats: serde_json::json!({ "unlinked_memories": unlinked_count }),
        })
    }
}

fn calculate_health_score(issues: &[KnowledgeHealthIssue], unlinked_count: i64, total_memories: i64) -> f64 {
    let mut score = 100.0;
    for issue in issues {
        score -= match issue.severity.as_str() {
            "high" => 20.0,
            "medium" => 10.0,
            "low" => 5.0,
            _ => 0.0,
        };
    }

    if total_memories > 0 && (unlinked_count as f64 / total_memories as f64) < 0.5 {
        score = (score + 5.0).min(100.0);
    }

    score.max(0.0)
}

fn generate_suggestions(
    issues: &[KnowledgeHealthIssue],
    total_memories: i64,
    memory_stats: &MemoryStats,
) -> Vec<String> {
    let mut suggestions = Vec::new();

    if issues.is_empty() {
        suggestions.push("Your knowledge base looks healthy!".to_string());
    } else {
        suggestions.push("Address the issues above to improve discoverability.".to_string());
    }

    if total_memories < 10 {
        suggestions.push("Keep recording insights for better semantic search.".to_string());
    }

    if memory_stats.memories_by_type.get(MemoryType::Failure.as_str()).copied().unwrap_or(0) == 0 {
        suggestions.push("Don't forget to record failures too!".to_string());
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_starts_at_100_and_gets_a_bonus_for_good_connectivity() {
        let score = calculate_health_score(&[], 1, 100);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn each_severity_deducts_the_documented_amount() {
        let issue = |severity: &str| KnowledgeHealthIssue {
            issue_type: "x".to_string(),
            severity: severity.to_string(),
            message: String::new(),
            affected_memory_ids: Vec::new(),
            suggested_action: String::new(),
        };
        assert_eq!(calculate_health_score(&[issue("high")], 60, 100), 80.0);
        assert_eq!(calculate_health_score(&[issue("medium")], 60, 100), 90.0);
        assert_eq!(calculate_health_score(&[issue("low")], 60, 100), 95.0);
    }

    #[test]
    fn score_never_drops_below_zero() {
        let issue = KnowledgeHealthIssue {
            issue_type: "x".to_string(),
            severity: "high".to_string(),
            message: String::new(),
            affected_memory_ids: Vec::new(),
            suggested_action: String::new(),
        };
        let issues = vec![issue; 10];
        assert_eq!(calculate_health_score(&issues, 60, 100), 0.0);
    }

    #[test]
    fn suggests_recording_failures_when_none_exist() {
        let mut stats = MemoryStats::default();
        stats.memories_by_type.insert("insight".to_string(), 5);
        let suggestions = generate_suggestions(&[], 20, &stats);
        assert!(suggestions.iter().any(|s| s.contains("record failures")));
    }
}
