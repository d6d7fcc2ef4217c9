#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Ensemble combination: reduces per-classifier votes or scores to one prediction per sample
//! using majority vote, max, min, mean, or median rules, optionally weighted.

/// Combiner, rules, reviewer, and engine.
#[path = "../combiner/main.rs"]
pub mod combiner;

/// Engine configuration loaded from JSON.
#[path = "../config.rs"]
pub mod config;

/// Error types for construction, weighting, and rule failures.
#[path = "../error.rs"]
pub mod error;

/// Telemetry helpers for logging/event emission.
#[path = "../telemetry.rs"]
pub mod telemetry;

pub use combiner::{
    rules::RuleFn, CombinationEngine, CombinationResult, CombinationReviewer, CombinationRule,
    Combiner,
};
pub use config::CombinerConfig;
pub use error::{CombinationError, RuleError};
pub use telemetry::{CombinationTelemetry, CombinationTelemetryBuilder};
