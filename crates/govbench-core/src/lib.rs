//! # govbench-core
//!
//! Deterministic half of the governance benchmark.
//!
//! Everything here runs without a model: pulling JSON out of free-form
//! model text, validating the records each stage produces, laying them out
//! on disk, and turning a set of judge verdicts into a comparative summary
//! and significance tests.
//!
//! ## Key Guarantees
//!
//! 1. **Fail-closed records**: a record that does not match its shape is
//!    rejected, never half-read
//! 2. **Gapless run numbering**: concurrent allocations never reuse or skip
//!    an identifier
//! 3. **Absent is not zero**: a missing metric is left out of every mean
//!
//! ## Example
//!
//! ```rust,ignore
//! use govbench_core::{Aggregator, RunStore, StatsReport};
//!
//! let store = RunStore::open("data")?;
//! let records = store.load_evaluations()?;
//! store.write_summary(&Aggregator::summarize(&records))?;
//! println!("{}", StatsReport::compute(&records));
//! ```

pub mod aggregate;
pub mod allocator;
pub mod extract;
pub mod framework;
pub mod records;
pub mod stats;
pub mod store;

// Re-export main types at crate root
pub use aggregate::{AggregateSummary, Aggregator, FrameworkSummary};
pub use allocator::RunAllocator;
pub use extract::{extract_json, parse_json, ExtractError};
pub use framework::{select_classes, Framework, ScenarioClass, SCENARIO_CLASSES};
pub use records::{
    EvaluationRecord, FrameworkAssessment, GovernanceLog, GovernanceLogEntry, Metric, RecordError,
    ScenarioRecord,
};
pub use stats::{Comparison, SignificanceTier, StatsReport};
pub use store::{write_json_atomic, RunDir, RunStore, StoreError};
