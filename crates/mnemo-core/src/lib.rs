//! # mnemo-core
//!
//! A local, single-user knowledge memory store: a personal graph of
//! memories (facts, decisions, failures, successes, patterns) linked by
//! typed relations, searchable by semantic similarity, and periodically
//! consolidated by a background dream worker.
//!
//! ## Architecture
//!
//! - [`embedding`]: text-to-vector embedding, deterministic fallback and
//!   (optionally) local fastembed.
//! - [`storage`]: SQLite-backed dual reader/writer connection manager and
//!   schema migrations.
//! - [`search`]: HNSW vector index over the embedding space (feature
//!   `vector-search`).
//! - [`repository`]: CRUD, linking, pattern, search, and stats operations
//!   over the memory graph.
//! - [`analysis`]: insight detection on new memories, knowledge-base
//!   health scoring, and pattern consolidation.
//! - [`frustration`]: sentiment/frustration scoring applied at ingest.
//! - [`service`]: [`service::MemoryService`], the facade every transport
//!   is built against.
//! - [`dream`]: background consolidation worker.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use mnemo_core::{Config, Mnemo};
//! use mnemo_core::model::{MemoryType, StoreMemoryInput};
//!
//! let config = Config::from_env();
//! let mnemo = Mnemo::open(config)?;
//!
//! let result = mnemo.service().store_memory(StoreMemoryInput {
//!     content: "Switching to tokio::sync::Mutex fixed the deadlock under load".to_string(),
//!     context_name: "backend".to_string(),
//!     tags: vec![],
//!     memory_type: MemoryType::Success,
//!     is_painful: None,
//!     time_cost_hours: None,
//!     auto_analyze: true,
//! })?;
//! println!("stored {}", result.memory_id);
//! # Ok::<(), mnemo_core::error::MnemoError>(())
//! ```
//!
//! ## Feature flags
//!
//! - `embeddings` (default): local embedding generation via fastembed.
//! - `vector-search` (default): HNSW vector search via usearch.

pub mod analysis;
pub mod config;
pub mod dream;
pub mod embedding;
pub mod error;
pub mod frustration;
pub mod model;
pub mod repository;
pub mod service;
pub mod storage;

#[cfg(feature = "vector-search")]
pub mod search;

pub use config::Config;
pub use error::{MnemoError, Result};
pub use repository::Repository;
pub use service::MemoryService;

use std::sync::Arc;

/// Top-level handle to an open memory store: owns the storage manager and
/// exposes the [`MemoryService`] facade. Construct once per process (or
/// per data directory) and share the handle across callers.
pub struct Mnemo {
    service: MemoryService,
}

impl Mnemo {
    /// Open (creating and migrating if absent) the database at
    /// `config.data_dir`, building the repository and service layers.
    pub fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let manager = storage::Manager::open_with_retry(
            &config.db_path(),
            config.write_max_retries,
            config.write_retry_delay_ms,
        )?;

        let embedder = embedding::default_embedder();
        let repo = Repository::new(Arc::new(manager), embedder, config.clone())?;
        let service = MemoryService::new(repo, &config);

        Ok(Self { service })
    }

    /// Open an in-memory store, useful for tests and short-lived tools.
    pub fn open_in_memory(config: Config) -> Result<Self> {
        let manager = storage::Manager::open_in_memory()?;

        let embedder = embedding::default_embedder();
        let repo = Repository::new(Arc::new(manager), embedder, config.clone())?;
        let service = MemoryService::new(repo, &config);

        Ok(Self { service })
    }

    pub fn service(&self) -> &MemoryService {
        &self.service
    }
}
