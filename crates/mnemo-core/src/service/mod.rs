//! Memory service (spec §4.8) — the single facade every transport (CLI,
//! embedding application) is built against. Coordinates the repository
//! and the three analysis components; holds no storage state of its own.

use crate::analysis::{Analyzer, HealthAnalyzer, PatternConsolidator};
use crate::config::Config;
use crate::error::{MnemoError, Result};
use crate::frustration::FrustrationIndexer;
use crate::model::{
    AnalyzeKnowledgeResult, ConsolidationSummary, LineageDirection, LineageNode, Memory, MemoryLink,
    MemoryType, RelationType, StoreMemoryInput, StoreMemoryResult,
};
use crate::repository::{ExploreResult, Repository};

pub struct MemoryService {
    repo: Repository,
    analyzer: Analyzer,
    health_analyzer: HealthAnalyzer,
    pattern_consolidator: PatternConsolidator,
    frustration_indexer: FrustrationIndexer,
    max_tags: usize,
}

impl MemoryService {
    pub fn new(repo: Repository, config: &Config) -> Self {
        Self {
            analyzer: Analyzer::new(
                config.link_suggestion_threshold,
                config.duplicate_detection_threshold,
                config.contradiction_check_threshold,
            ),
            health_analyzer: HealthAnalyzer::new(config.stale_memory_days),
            pattern_consolidator: PatternConsolidator::new(),
            frustration_indexer: FrustrationIndexer::new(),
            max_tags: config.max_tags_per_memory,
            repo,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn validate_input(&self, content: &str, context_name: &str, tags: &[String]) -> Result<()> {
        if content.trim().is_empty() {
            return Err(MnemoError::Validation("content cannot be empty".to_string()));
        }
        if context_name.trim().is_empty() {
            return Err(MnemoError::Validation("context name cannot be empty".to_string()));
        }
        if tags.len() > self.max_tags {
            return Err(MnemoError::Validation(format!(
                "too many tags (max {}, got {})",
                self.max_tags,
                tags.len()
            )));
        }
        Ok(())
    }

    /// Store a new memory with automatic knowledge analysis (spec §4.4.1
    /// + §4.5, composed behind one call).
    pub fn store_memory(&self, input: StoreMemoryInput) -> Result<StoreMemoryResult> {
        self.validate_input(&input.content, &input.context_name, &input.tags)?;

        let frustration = self.frustration_indexer.index(
            &input.content,
            input.is_painful,
            input.time_cost_hours,
        );

        let (memory_id, summary, embedding) = self.repo.create_memory(
            &input.content,
            &input.context_name,
            &input.tags,
            input.memory_type,
            frustration.frustration_score,
            frustration.time_cost_hours,
        )?;

        let (suggested_links, insights) = if input.auto_analyze {
            self.analyzer.analyze_new_memory(
                &self.repo,
                &memory_id,
                &input.content,
                &embedding,
                input.memory_type,
            )?
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(StoreMemoryResult {
            success: true,
            memory_id,
            summary,
            suggested_links,
            insights,
        })
    }

    /// Semantic recall with hybrid scoring, touching returned memories'
    /// access metadata (spec §4.4.4 + "touch on recall").
    #[allow(clippy::too_many_arguments)]
    pub fn recall_memories(
        &self,
        query: &str,
        limit: usize,
        context_filter: Option<&str>,
        tag_filter: Option<&[String]>,
        type_filter: Option<MemoryType>,
        touch_on_recall: bool,
    ) -> Result<(Vec<Memory>, usize)> {
        let (memories, total) =
            self.repo
                .search_by_similarity(query, limit, context_filter, tag_filter, type_filter, true)?;

        if touch_on_recall && !memories.is_empty() {
            let ids: Vec<String> = memories.iter().map(|m| m.id.clone()).collect();
            self.repo.touch_memories(&ids)?;
        }

        Ok((memories, total))
    }

    pub fn list_memories(
        &self,
        limit: usize,
        offset: usize,
        context_filter: Option<&str>,
        tag_filter: Option<&[String]>,
        type_filter: Option<MemoryType>,
    ) -> Result<(Vec<Memory>, i64, bool)> {
        self.repo.list_memories(limit, offset, context_filter, tag_filter, type_filter)
    }

    pub fn get_memory(&self, memory_id: &str) -> Result<Option<Memory>> {
        self.repo.get_by_id(memory_id)
    }

    pub fn update_memory(
        &self,
        memory_id: &str,
        content: Option<&str>,
        tags: Option<&[String]>,
        memory_type: Option<MemoryType>,
    ) -> Result<(bool, Vec<String>, String)> {
        self.repo.update_memory(memory_id, content, tags, memory_type)
    }

    pub fn delete_memory(&self, memory_id: &str) -> Result<bool> {
        self.repo.delete_memory(memory_id)
    }

    pub fn link_memories(
        &self,
        source_id: &str,
        target_id: &str,
        relation_type: RelationType,
        reason: Option<&str>,
    ) -> Result<()> {
        self.repo.create_link(source_id, target_id, relation_type, reason)
    }

    pub fn unlink_memories(&self, source_id: &str, target_id: &str) -> Result<bool> {
        self.repo.delete_link(source_id, target_id)
    }

    pub fn get_memory_links(&self, memory_id: &str) -> Result<Vec<MemoryLink>> {
        self.repo.get_links(memory_id)
    }

    pub fn explore_related(
        &self,
        memory_id: &str,
        include_tag_siblings: bool,
        include_context_siblings: bool,
        max_per_category: usize,
    ) -> Result<ExploreResult> {
        self.repo
            .explore_related(memory_id, include_tag_siblings, include_context_siblings, max_per_category)
    }

    pub fn trace_lineage(
        &self,
        memory_id: &str,
        direction: LineageDirection,
        relation_types: Option<&[RelationType]>,
        max_depth: u32,
    ) -> Result<Vec<LineageNode>> {
        self.repo.trace_lineage(memory_id, direction, relation_types, max_depth)
    }

    pub fn get_stats(&self) -> Result<crate::model::MemoryStats> {
        self.repo.get_stats()
    }

    pub fn analyze_knowledge(&self) -> Result<AnalyzeKnowledgeResult> {
        self.health_analyzer.analyze(&self.repo)
    }

    pub fn consolidate_patterns(
        &self,
        tag_filter: Option<&str>,
        min_cluster_size: usize,
        similarity_threshold: f64,
    ) -> Result<ConsolidationSummary> {
        self.pattern_consolidator
            .consolidate(&self.repo, tag_filter, min_cluster_size, similarity_threshold)
    }
}
