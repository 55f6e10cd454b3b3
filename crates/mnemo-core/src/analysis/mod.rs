//! Analysis layer (spec C5/C6/C7): insight detection on new memories,
//! knowledge-base health scoring, and pattern consolidation. Each is an
//! independent struct the `service` module composes, rather than a
//! private helper on the service itself, so each stays unit-testable on
//! its own.

mod analyzer;
mod consolidator;
mod health;

pub use analyzer::Analyzer;
pub use consolidator::PatternConsolidator;
pub use health::HealthAnalyzer;
