//! Storage layer: SQLite-backed graph store (spec C2/C3).
//!
//! The graph (memories, contexts, tags, patterns, and the edges between
//! them) is modeled relationally rather than with a dedicated graph
//! database, with SQLite as the single storage engine. `manager` owns
//! the reader/writer connections and the write-lock retry protocol;
//! `queries` centralizes the SQL; `migrations` owns schema evolution.

mod manager;
mod migrations;
pub mod queries;

pub use manager::{Manager, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS};
pub use migrations::{apply_migrations, get_current_version, Migration, MIGRATIONS};
