//! Pattern extraction from clusters of similar memories (spec §4.7).

use crate::error::Result;
use crate::model::{ConsolidationSummary, Memory, MemoryType, PatternDetail};
use crate::repository::Repository;

pub struct PatternConsolidator;

impl PatternConsolidator {
    pub fn new() -> Self {
        Self
    }

    /// Cluster frequently-accessed (or tag-filtered) memories and either
    /// link them into an existing pattern or synthesize a new one (spec
    /// §4.7). Clustering is greedy and O(n²): each unclustered memory
    /// seeds a cluster that absorbs every remaining memory above
    /// `similarity_threshold` — there is no index over the candidate
    /// set, which is already capped at 100 memories upstream.
    pub fn consolidate(
        &self,
        repo: &Repository,
        tag_filter: Option<&str>,
        min_cluster_size: usize,
        similarity_threshold: f64,
    ) -> Result<ConsolidationSummary> {
        let mut summary = ConsolidationSummary::default();

        let candidates = match tag_filter {
            Some(tag) => get_memories_by_tag(repo, tag, 100)?,
            None => get_frequently_accessed(repo, 3, 100)?,
        };

        if candidates.len() < min_cluster_size {
            return Ok(summary);
        }

        let clusters = find_clusters(repo, &candidates, similarity_threshold, min_cluster_size)?;

        for cluster in clusters {
            let sample_content = cluster
                .iter()
                .take(3)
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let embedding = repo.embed_for_consolidation(&sample_content)?;

            let similar_patterns = repo.search_similar_patterns(&embedding, 3, 0.3)?;

            if let Some((pattern, confidence)) = similar_patterns.first() {
                if *confidence >= 0.8 {
                    for memory in &cluster {
                        repo.link_memory_to_pattern(&memory.id, &pattern.id, *confidence)?;
                        summary.memories_linked += 1;
                    }
                    summary.patterns_found += 1;
                    continue;
                }
            }

            if let Some(pattern_content) = synthesize_content(&cluster) {
                let (pattern_id, pattern_summary, _) = repo.create_pattern(&pattern_content, 0.5)?;
                for memory in &cluster {
                    repo.link_memory_to_pattern(&memory.id, &pattern_id, 0.6)?;
                    summary.memories_linked += 1;
                }
                summary.patterns_created += 1;
                summary.details.push(PatternDetail {
                    pattern_id,
                    summary: pattern_summary,
                    instance_count: cluster.len() as i64,
                });
            }
        }

        Ok(summary)
    }
}

impl Default for PatternConsolidator {
    fn default() -> Self {
        Self::new()
    }
}

fn get_memories_by_tag(repo: &Repository, tag: &str, limit: usize) -> Result<Vec<Memory>> {
    repo.get_memories_by_tag(tag, limit)
}

fn get_frequently_accessed(repo: &Repository, min_access_count: i64, limit: usize) -> Result<Vec<Memory>> {
    repo.get_frequently_accessed(min_access_count, limit)
}

fn find_clusters(
    repo: &Repository,
    memories: &[Memory],
    threshold: f64,
    min_size: usize,
) -> Result<Vec<Vec<Memory>>> {
    let mut clusters = Vec::new();
    let mut used: std::collections::HashSet<String> = std::collections::HashSet::new();

    let embeddings: Vec<Vec<f32>> = memories
        .iter()
        .map(|m| repo.embed_for_consolidation(&m.content))
        .collect::<Result<Vec<_>>>()?;

    for (i, memory) in memories.iter().enumerate() {
        if used.contains(&memory.id) {
            continue;
        }

        let mut cluster = vec![memory.clone()];
        used.insert(memory.id.clone());

        for (j, other) in memories.iter().enumerate() {
            if i == j || used.contains(&other.id) {
                continue;
            }
            let similarity = crate::embedding::cosine_similarity(&embeddings[i], &embeddings[j]) as f64;
            if similarity >= threshold {
                cluster.push(other.clone());
                used.insert(other.id.clone());
            }
        }

        if cluster.len() >= min_size {
            clusters.push(cluster);
        }
    }

    Ok(clusters)
}

/// Synthesize pattern content from a cluster: dominant memory type, tags
/// shared by at least half the cluster, and the first five summaries as
/// representative examples (spec §4.7).
fn synthesize_content(cluster: &[Memory]) -> Option<String> {
    if cluster.is_empty() {
        return None;
    }

    let mut tag_counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for memory in cluster {
        for tag in &memory.tags {
            *tag_counts.entry(tag.as_str()).or_insert(0) += 1;
        }
    }
    let threshold = cluster.len() as f64 * 0.5;
    let mut common_tags: Vec<&str> = tag_counts
        .into_iter()
        .filter(|(_, count)| *count as f64 >= threshold)
        .map(|(tag, _)| tag)
        .collect();
    common_tags.sort_unstable();

    let mut type_counts: std::collections::HashMap<MemoryType, usize> = std::collections::HashMap::new();
    for memory in cluster {
        *type_counts.entry(memory.memory_type).or_insert(0) += 1;
    }
    let dominant_type = type_counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(t, _)| t)
        .unwrap_or_default();

    let mut parts = vec![
        format!("**Pattern extracted from {} memories**", cluster.len()),
        String::new(),
        format!("- Dominant type: {dominant_type}"),
        format!(
            "- Common tags: {}",
            if common_tags.is_empty() { "none".to_string() } else { common_tags.join(", ") }
        ),
        String::new(),
        "**Representative examples:**".to_string(),
    ];
    for (i, memory) in cluster.iter().take(5).enumerate() {
        parts.push(format!("{}. {}", i + 1, memory.summary));
    }

    Some(parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn memory(id: &str, summary: &str, memory_type: MemoryType, tags: &[&str]) -> Memory {
        Memory {
            id: id.to_string(),
            content: summary.to_string(),
            summary: summary.to_string(),
            memory_type,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_accessed_at: None,
            access_count: 1,
            decay_rate: 0.1,
            frustration_score: 0.0,
            time_cost_hours: None,
            context: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            similarity: None,
            related_memories: Vec::new(),
        }
    }

    #[test]
    fn synthesizes_dominant_type_and_common_tags() {
        let cluster = vec![
            memory("1", "fix A", MemoryType::Failure, &["rust", "async"]),
            memory("2", "fix B", MemoryType::Failure, &["rust"]),
            memory("3", "fix C", MemoryType::Success, &["rust"]),
        ];
        let content = synthesize_content(&cluster).unwrap();
        assert!(content.contains("Dominant type: failure"));
        assert!(content.contains("Common tags: rust"));
        assert!(content.contains("1. fix A"));
    }

    #[test]
    fn empty_cluster_synthesizes_nothing() {
        assert!(synthesize_content(&[]).is_none());
    }
}
