//! Code metrics collection.
//!
//! - [`engine`]: `AnalysisEngine` seam over the code counter (tokei)
//! - [`collector`]: `MetricsCollector` with timeout and serialization around the engine

pub mod collector;
pub mod engine;

pub use collector::{
    reduce_rows, EngineCollector, MetricsCollector, DEFAULT_METRICS_TIMEOUT, DENY_LIST,
};
pub use engine::{AnalysisEngine, LanguageRow, TokeiEngine};
