//! Property-style checks for the testable invariants (spec §8) that don't
//! fit naturally into a single module's unit tests because they cross the
//! repository/analysis/service boundary.

mod support;

use mnemo_core::model::{MemoryType, RelationType, StoreMemoryInput};
use support::{store, test_mnemo};

/// Invariant 5: `create_link(a, a, *)` always fails with `SelfLink`,
/// regardless of whether `a` exists.
#[test]
fn invariant_self_link_always_rejected() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    let err = service
        .link_memories("nonexistent-id", "nonexistent-id", RelationType::Related, None)
        .unwrap_err();
    assert!(matches!(err, mnemo_core::error::MnemoError::SelfLink(_)));

    let a = store(service, "A real memory", "ctx", &[], MemoryType::Note);
    let err = service
        .link_memories(&a.memory_id, &a.memory_id, RelationType::Related, None)
        .unwrap_err();
    assert!(matches!(err, mnemo_core::error::MnemoError::SelfLink(_)));
}

/// Invariant 6: hybrid-ranked recall results are sorted non-increasing on
/// the composite score.
#[test]
fn invariant_hybrid_ranking_is_non_increasing() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    for i in 0..6 {
        store(
            service,
            &format!("Note about async cancellation safety, variant {i}"),
            "rust",
            &["async"],
            MemoryType::Note,
        );
    }

    let (memories, _total) = service
        .recall_memories("async cancellation safety", 10, None, None, None, false)
        .unwrap();

    let scores: Vec<f64> = memories.iter().map(|m| m.similarity.unwrap_or(0.0)).collect();
    for pair in scores.windows(2) {
        assert!(pair[0] >= pair[1], "scores not sorted: {scores:?}");
    }
}

/// Invariant 7: frustration scoring stays within bounds for both extremes
/// — empty content and a very long one.
#[test]
fn invariant_frustration_score_bounded_for_extreme_inputs() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    let long_content = "this is SO frustrating!!! ".repeat(400);

    let empty_result = service.store_memory(StoreMemoryInput {
        content: "a".to_string(),
        context_name: "ctx".to_string(),
        tags: vec![],
        memory_type: MemoryType::Note,
        is_painful: None,
        time_cost_hours: None,
        auto_analyze: false,
    });
    assert!(empty_result.is_ok());

    let long_result = service
        .store_memory(StoreMemoryInput {
            content: long_content,
            context_name: "ctx".to_string(),
            tags: vec![],
            memory_type: MemoryType::Failure,
            is_painful: Some(true),
            time_cost_hours: Some(5.0),
            auto_analyze: false,
        })
        .unwrap();

    let memory = service.get_memory(&long_result.memory_id).unwrap().unwrap();
    assert!((0.0..=1.0).contains(&memory.frustration_score));
}

/// Invariant 1: stored content, context, and lowercased tags round-trip
/// through `get_by_id` unchanged.
#[test]
fn invariant_store_round_trips_content_context_and_tags() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    let result = store(
        service,
        "Config reload race fixed with a generation counter",
        "ops",
        &["RELOAD", "Race"],
        MemoryType::Success,
    );

    let memory = service.get_memory(&result.memory_id).unwrap().unwrap();
    assert_eq!(memory.context.as_deref(), Some("ops"));
    let tags: std::collections::HashSet<_> = memory.tags.into_iter().collect();
    assert!(tags.contains("reload"));
    assert!(tags.contains("race"));
}

/// Invariant 4: linking the same ordered pair twice always fails the
/// second time, no matter which relation type is attempted second.
#[test]
fn invariant_duplicate_link_fails_regardless_of_second_relation() {
    let mnemo = test_mnemo();
    let service = mnemo.service();

    let a = store(service, "First memory", "ctx", &[], MemoryType::Note);
    let b = store(service, "Second memory", "ctx", &[], MemoryType::Note);

    service.link_memories(&a.memory_id, &b.memory_id, RelationType::Supersedes, None).unwrap();

    for relation in [RelationType::Related, RelationType::Contradicts, RelationType::Extends] {
        let err = service.link_memories(&a.memory_id, &b.memory_id, relation, None).unwrap_err();
        assert!(matches!(err, mnemo_core::error::MnemoError::DuplicateLink { .. }));
    }
}
