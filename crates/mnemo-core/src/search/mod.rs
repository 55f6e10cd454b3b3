//! Vector search (spec C4.4.3). Keyword/hybrid/reranking search, codebase
//! watching, and cross-encoder reranking belonged to broader retrieval
//! surfaces this crate does not implement and were dropped with the rest
//! of that stack.

#[cfg(feature = "vector-search")]
mod vector;

#[cfg(feature = "vector-search")]
pub use vector::{
    VectorIndex, VectorIndexConfig, VectorIndexStats, VectorSearchError, DEFAULT_CONNECTIVITY,
    DEFAULT_DIMENSIONS, DEFAULT_EXPANSION_ADD, DEFAULT_EXPANSION_SEARCH,
};
