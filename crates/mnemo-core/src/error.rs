//! Error taxonomy shared by every component.
//!
//! Variants map 1:1 onto the error taxonomy: validation and not-found
//! failures are returned verbatim, lock contention is recovered by retry at
//! the call site that chooses to, and storage failures on the vector-search
//! path are recovered locally by falling back to a linear scan.

use crate::model::RelationType;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MnemoError>;

/// The full error taxonomy produced by the memory engine.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MnemoError {
    /// Input failed validation (empty content, empty context, too many tags).
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced memory id does not exist.
    #[error("memory not found: {0}")]
    NotFound(String),

    /// An edge already exists for the ordered `(source, target)` pair.
    #[error(
        "link already exists from {source} to {target} with relation '{existing_relation}'"
    )]
    DuplicateLink {
        source: String,
        target: String,
        existing_relation: RelationType,
    },

    /// `source == target` in a link request.
    #[error("cannot link memory {0} to itself")]
    SelfLink(String),

    /// The read-write handle could not be acquired within the retry budget.
    #[error("could not acquire write lock after {attempts} attempts")]
    LockTimeout { attempts: u32 },

    /// Underlying storage failure (index miss, malformed row, IO).
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    /// I/O failure outside of the database itself (lock files, directories).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedding backend is unavailable; fatal at startup per spec §4.1.
    #[error("embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),
}

impl MnemoError {
    /// Render the `{success: false, error: <message>}` envelope transports
    /// are expected to produce (spec §7, "user-visible failures").
    pub fn to_envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": self.to_string(),
        })
    }
}
