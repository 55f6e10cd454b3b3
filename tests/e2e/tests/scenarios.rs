//! End-to-end scenarios spanning store, recall, linking, health, and
//! consolidation — the cross-module workflows a single unit test can't
//! exercise on its own.

mod support;

use mnemo_core::model::{LineageDirection, MemoryType, RelationType, StoreMemoryInput};
use support::{store, test_mnemo};

/// S1: a memory round-trips through store → get with content and context
/// preserved, and the stored tags are the lowercased input set.
#[test]
fn s1_store_then_get_round_trips_content_and_context() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    let result = store(
        service,
        "Postgres connection pool exhaustion under burst load",
        "backend",
        &["Database", "PERF"],
        MemoryType::Failure,
    );

    let memory = service.get_memory(&result.memory_id).unwrap().unwrap();
    assert_eq!(memory.content, "Postgres connection pool exhaustion under burst load");
    assert_eq!(memory.context.as_deref(), Some("backend"));
    assert_eq!(memory.tags, vec!["database".to_string(), "perf".to_string()]);
}

/// S2: recalling a memory with `touch_on_recall=true` strictly increments
/// `access_count` once per invocation, per returned memory.
#[test]
fn s2_recall_with_touch_increments_access_count() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    let result = store(
        service,
        "Switching the retry backoff to exponential fixed the thundering herd",
        "infra",
        &["resilience"],
        MemoryType::Success,
    );

    let before = service.get_memory(&result.memory_id).unwrap().unwrap();
    assert_eq!(before.access_count, 1);

    let (memories, total) = service
        .recall_memories(
            "thundering herd backoff",
            5,
            None,
            None,
            None,
            true,
        )
        .unwrap();
    assert!(total >= 1);
    assert!(memories.iter().any(|m| m.id == result.memory_id));

    let after = service.get_memory(&result.memory_id).unwrap().unwrap();
    assert_eq!(after.access_count, before.access_count + 1);
}

/// S3: updating a memory's content preserves its id and creation time and
/// keeps existing links in place with their original relation/reason.
#[test]
fn s3_update_preserves_identity_and_links() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    let a = store(service, "Initial draft of the caching strategy", "docs", &[], MemoryType::Note);
    let b = store(service, "Follow-up decision: use write-through caching", "docs", &[], MemoryType::Decision);

    service
        .link_memories(&b.memory_id, &a.memory_id, RelationType::EvolvedFrom, Some("refined the draft"))
        .unwrap();

    let before = service.get_memory(&b.memory_id).unwrap().unwrap();

    let (success, _changes, _summary) = service
        .update_memory(&b.memory_id, Some("Follow-up decision: use write-through caching everywhere"), None, None)
        .unwrap();
    assert!(success);

    let after = service.get_memory(&b.memory_id).unwrap().unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.content, "Follow-up decision: use write-through caching everywhere");

    let links = service.get_memory_links(&b.memory_id).unwrap();
    let link = links.iter().find(|l| l.target_id == a.memory_id).expect("link survives update");
    assert_eq!(link.relation_type, RelationType::EvolvedFrom);
    assert_eq!(link.reason.as_deref(), Some("refined the draft"));
}

/// S4: linking the same ordered pair twice fails with a duplicate-link
/// error that carries the original relation type.
#[test]
fn s4_duplicate_link_is_rejected_with_existing_relation() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    let a = store(service, "Rate limiter trips under legitimate retries", "api", &[], MemoryType::Failure);
    let b = store(service, "Added jitter to client retries", "api", &[], MemoryType::Success);

    service.link_memories(&a.memory_id, &b.memory_id, RelationType::CausedBy, None).unwrap();
    let err = service
        .link_memories(&a.memory_id, &b.memory_id, RelationType::Related, None)
        .unwrap_err();

    match err {
        mnemo_core::error::MnemoError::DuplicateLink { existing_relation, .. } => {
            assert_eq!(existing_relation, RelationType::CausedBy);
        }
        other => panic!("expected DuplicateLink, got {other:?}"),
    }
}

/// S5: tracing lineage backward from a chain of `evolved_from` links
/// returns ancestors in increasing depth order.
#[test]
fn s5_trace_lineage_walks_evolved_from_chain() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    let root = store(service, "Original approach: polling every 5s", "worker", &[], MemoryType::Decision);
    let mid = store(service, "Switched to long-polling", "worker", &[], MemoryType::Decision);
    let tip = store(service, "Switched to a push-based queue", "worker", &[], MemoryType::Decision);

    service.link_memories(&mid.memory_id, &root.memory_id, RelationType::EvolvedFrom, None).unwrap();
    service.link_memories(&tip.memory_id, &mid.memory_id, RelationType::EvolvedFrom, None).unwrap();

    let lineage = service
        .trace_lineage(&tip.memory_id, LineageDirection::Backward, None, 10)
        .unwrap();

    let ids: Vec<&str> = lineage.iter().map(|n| n.id.as_str()).collect();
    assert!(ids.contains(&mid.memory_id.as_str()));
    assert!(ids.contains(&root.memory_id.as_str()));

    let mid_depth = lineage.iter().find(|n| n.id == mid.memory_id).unwrap().depth;
    let root_depth = lineage.iter().find(|n| n.id == root.memory_id).unwrap().depth;
    assert!(root_depth > mid_depth);
}

/// S6: consolidating a cluster of tag-filtered, near-duplicate memories
/// produces at least one pattern and links every clustered memory to it.
#[test]
fn s6_consolidate_patterns_clusters_similar_memories_under_a_shared_tag() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    for i in 0..4 {
        store(
            service,
            &format!("Deadlock #{i} caused by holding the write lock across an await point"),
            "concurrency",
            &["deadlock"],
            MemoryType::Failure,
        );
    }

    let summary = service.consolidate_patterns(Some("deadlock"), 3, 0.5).unwrap();
    assert!(summary.patterns_found + summary.patterns_created >= 1);
    assert!(summary.memories_linked >= 3);
}

/// Storing an empty content string is rejected by validation before it
/// ever reaches storage.
#[test]
fn store_rejects_empty_content() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    let err = service
        .store_memory(StoreMemoryInput {
            content: "   ".to_string(),
            context_name: "x".to_string(),
            tags: vec![],
            memory_type: MemoryType::Note,
            is_painful: None,
            time_cost_hours: None,
            auto_analyze: false,
        })
        .unwrap_err();
    assert!(matches!(err, mnemo_core::error::MnemoError::Validation(_)));
}
