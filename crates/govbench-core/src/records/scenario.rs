//! Scenario records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{json_kind, RecordError};

/// A synthetic scenario.
///
/// Opaque apart from `scenario_name`, which is only used for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioRecord(Map<String, Value>);

impl ScenarioRecord {
    /// Accept any JSON object.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(RecordError::Shape {
                expected: "JSON object",
                found: json_kind(&other),
            }),
        }
    }

    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn scenario_name(&self) -> Option<&str> {
        self.0.get("scenario_name").and_then(Value::as_str)
    }

    /// Name for log lines; `N/A` when the scenario is unnamed.
    pub fn display_name(&self) -> &str {
        self.scenario_name().unwrap_or("N/A")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Two-space indented JSON, as injected into prompts and written to disk.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.0)
    }
}
