//! Typed records for every artifact of a run directory.
//!
//! Model output arrives as untyped JSON. Each record type has a validating
//! `from_value` constructor that fails closed: a document of the wrong shape
//! is rejected, never patched up.

mod evaluation;
mod governance;
mod scenario;
mod schema;

pub use evaluation::{
    ActionableIntelligence, DetectionMetrics, EvaluationRecord, FrameworkAssessment, GroundTruth,
    Metric,
};
pub use governance::{GovernanceLog, GovernanceLogEntry};
pub use scenario::ScenarioRecord;
pub use schema::{validate_evaluation_schema, SchemaError};

use serde_json::Value;
use thiserror::Error;

/// Errors raised while validating a record.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected {expected}, found {found}")]
    Shape {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Schema validation failed: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Entry {index} has no string 'type' discriminator")]
    MissingDiscriminator { index: usize },
}

/// Human-readable JSON kind, for shape errors.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
