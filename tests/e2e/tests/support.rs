//! Shared harness for the integration suite: an in-memory store plus a
//! `store` helper that skips the boilerplate of building a
//! `StoreMemoryInput` by hand in every scenario.

use mnemo_core::model::{MemoryType, StoreMemoryInput, StoreMemoryResult};
use mnemo_core::service::MemoryService;
use mnemo_core::{Config, Mnemo};

#[allow(dead_code)]
pub fn test_mnemo() -> Mnemo {
    Mnemo::open_in_memory(Config::default()).expect("open in-memory store")
}

#[allow(dead_code)]
pub fn store(
    service: &MemoryService,
    content: &str,
    context: &str,
    tags: &[&str],
    memory_type: MemoryType,
) -> StoreMemoryResult {
    service
        .store_memory(StoreMemoryInput {
            content: content.to_string(),
            context_name: context.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            memory_type,
            is_painful: None,
            time_cost_hours: None,
            auto_analyze: true,
        })
        .expect("store_memory should succeed")
}
