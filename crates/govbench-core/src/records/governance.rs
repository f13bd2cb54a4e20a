//! Governance logs: ordered entries tagged with the framework that produced them.

use serde::Serialize;
use serde_json::{Map, Value};

use super::{json_kind, RecordError};
use crate::framework::Framework;

/// One governance log entry. The `type` field names the producing framework.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GovernanceLogEntry(Map<String, Value>);

impl GovernanceLogEntry {
    /// The raw discriminator.
    pub fn tag(&self) -> &str {
        // Presence is checked when the log is built.
        self.0.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    /// The recognized framework, if the tag names one.
    pub fn framework(&self) -> Option<Framework> {
        Framework::from_log_tag(self.tag())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// A governance log for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GovernanceLog(Vec<GovernanceLogEntry>);

impl GovernanceLog {
    /// Accept an array of objects that each carry a string `type`.
    ///
    /// Entries with an unrecognized tag are kept; they simply belong to no
    /// framework partition.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(RecordError::Shape {
                    expected: "JSON array of log entries",
                    found: json_kind(&other),
                })
            }
        };

        let mut entries = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let map = match item {
                Value::Object(map) => map,
                other => {
                    return Err(RecordError::Shape {
                        expected: "JSON object log entry",
                        found: json_kind(&other),
                    })
                }
            };
            if !matches!(map.get("type"), Some(Value::String(_))) {
                return Err(RecordError::MissingDiscriminator { index });
            }
            entries.push(GovernanceLogEntry(map));
        }

        Ok(Self(entries))
    }

    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn entries(&self) -> &[GovernanceLogEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries produced by one framework, in log order.
    pub fn partition(&self, framework: Framework) -> Vec<&GovernanceLogEntry> {
        self.0
            .iter()
            .filter(|entry| entry.framework() == Some(framework))
            .collect()
    }

    /// One framework's partition as two-space indented JSON.
    pub fn partition_json(&self, framework: Framework) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.partition(framework))
    }

    /// Number of entries whose tag matches no recognized framework.
    pub fn unrecognized(&self) -> usize {
        self.0.iter().filter(|entry| entry.framework().is_none()).count()
    }

    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.0)
    }
}
