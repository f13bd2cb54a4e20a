//! JSON Schema validation for evaluation records.
//!
//! Judge output is checked against `schema/evaluation.schema.json` before it
//! is deserialized, so a record with a mistyped metric is rejected instead of
//! being silently coerced.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded evaluation schema (loaded at compile time).
const EVALUATION_SCHEMA_JSON: &str = include_str!("../../schema/evaluation.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(EVALUATION_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Validate an evaluation record against the schema.
///
/// Returns every violation found, each tagged with its instance path.
pub fn validate_evaluation_schema(value: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_record_passes() {
        let value = serde_json::json!({ "performance_comparison": {} });
        assert!(validate_evaluation_schema(&value).is_ok());
    }

    #[test]
    fn test_missing_comparison_fails() {
        let value = serde_json::json!({ "scenario_details": {} });
        assert!(validate_evaluation_schema(&value).is_err());
    }

    #[test]
    fn test_string_score_fails() {
        let value = serde_json::json!({
            "performance_comparison": {
                "langchain": { "governance_maturity_score": "high" }
            }
        });
        let errors = validate_evaluation_schema(&value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("governance_maturity_score")));
    }

    #[test]
    fn test_null_score_allowed() {
        let value = serde_json::json!({
            "performance_comparison": {
                "langchain": { "detection_metrics": { "detection_rate": null } }
            }
        });
        assert!(validate_evaluation_schema(&value).is_ok());
    }
}
