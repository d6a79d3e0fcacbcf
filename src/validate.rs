//! Artifact validation.
//!
//! The orchestrator depends only on the `Validator` contract. `ShapeValidator`
//! is the concrete check used for generated content: a JSON array of exactly
//! `item_count` records whose first record carries every required field and
//! a nested collection of exactly `nested_count` entries.

use serde_json::Value;
use std::path::Path;

/// Structural expectations for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedShape {
    pub item_count: usize,
    pub required_fields: Vec<String>,
    pub nested_field: String,
    pub nested_count: usize,
}

/// Accept/reject verdict with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub accepted: bool,
    pub reason: String,
}

impl ValidationOutcome {
    pub fn accept(reason: impl Into<String>) -> Self {
        Self {
            accepted: true,
            reason: reason.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
        }
    }
}

/// Inspects a generated artifact. Implementations report malformed input
/// through the outcome; they do not fail.
pub trait Validator: Send + Sync {
    fn validate(&self, artifact: &Path, shape: &ExpectedShape) -> ValidationOutcome;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeValidator;

impl Validator for ShapeValidator {
    fn validate(&self, artifact: &Path, shape: &ExpectedShape) -> ValidationOutcome {
        let content = match std::fs::read_to_string(artifact) {
            Ok(content) => content,
            Err(e) => {
                return ValidationOutcome::reject(format!(
                    "cannot read {}: {}",
                    artifact.display(),
                    e
                ));
            }
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => return ValidationOutcome::reject(format!("invalid JSON: {}", e)),
        };

        check_shape(&value, shape)
    }
}

fn check_shape(value: &Value, shape: &ExpectedShape) -> ValidationOutcome {
    let Some(records) = value.as_array() else {
        return ValidationOutcome::reject(format!(
            "expected a list of records, found {}",
            kind(value)
        ));
    };

    if records.len() != shape.item_count {
        return ValidationOutcome::reject(format!(
            "expected {} records, found {}",
            shape.item_count,
            records.len()
        ));
    }

    let Some(first) = records.first() else {
        // item_count == 0 and the list is empty
        return ValidationOutcome::accept("empty list as configured");
    };

    let Some(fields) = first.as_object() else {
        return ValidationOutcome::reject(format!(
            "first record must be an object, found {}",
            kind(first)
        ));
    };

    let missing: Vec<&str> = shape
        .required_fields
        .iter()
        .filter(|f| !fields.contains_key(f.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return ValidationOutcome::reject(format!(
            "first record is missing field(s): {}",
            missing.join(", ")
        ));
    }

    let nested_len = match fields.get(&shape.nested_field) {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(entries)) => entries.len(),
        Some(other) => {
            return ValidationOutcome::reject(format!(
                "'{}' must be a collection, found {}",
                shape.nested_field,
                kind(other)
            ));
        }
        None => {
            return ValidationOutcome::reject(format!(
                "first record is missing field(s): {}",
                shape.nested_field
            ));
        }
    };

    if nested_len != shape.nested_count {
        return ValidationOutcome::reject(format!(
            "'{}' must have {} entries, found {}",
            shape.nested_field, shape.nested_count, nested_len
        ));
    }

    ValidationOutcome::accept(format!("{} records", records.len()))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn shape() -> ExpectedShape {
        ExpectedShape {
            item_count: 3,
            required_fields: vec!["word".into(), "translations".into()],
            nested_field: "translations".into(),
            nested_count: 2,
        }
    }

    fn record() -> Value {
        json!({"word": "casa", "translations": ["house", "home"]})
    }

    fn write(value: &Value) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch_001.json");
        std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_accepts_conforming_artifact() {
        let (_dir, path) = write(&json!([record(), record(), record()]));
        let outcome = ShapeValidator.validate(&path, &shape());
        assert!(outcome.accepted, "{}", outcome.reason);
    }

    #[test]
    fn test_nested_object_counts_entries() {
        let first = json!({"word": "casa", "translations": {"en": "house", "de": "Haus"}});
        let (_dir, path) = write(&json!([first, record(), record()]));
        assert!(ShapeValidator.validate(&path, &shape()).accepted);
    }

    #[test]
    fn test_rejects_wrong_record_count() {
        let (_dir, path) = write(&json!([record(), record()]));
        let outcome = ShapeValidator.validate(&path, &shape());
        assert!(!outcome.accepted);
        assert!(outcome.reason.contains("expected 3 records, found 2"));
    }

    #[test]
    fn test_rejects_missing_fields() {
        let first = json!({"translations": ["a", "b"]});
        let (_dir, path) = write(&json!([first, record(), record()]));
        let outcome = ShapeValidator.validate(&path, &shape());
        assert!(!outcome.accepted);
        assert!(outcome.reason.contains("word"));
    }

    #[test]
    fn test_rejects_wrong_nested_count() {
        let first = json!({"word": "casa", "translations": ["house"]});
        let (_dir, path) = write(&json!([first, record(), record()]));
        let outcome = ShapeValidator.validate(&path, &shape());
        assert!(!outcome.accepted);
        assert!(outcome.reason.contains("must have 2 entries, found 1"));
    }

    #[test]
    fn test_rejects_scalar_nested_field() {
        let first = json!({"word": "casa", "translations": "house"});
        let (_dir, path) = write(&json!([first, record(), record()]));
        let outcome = ShapeValidator.validate(&path, &shape());
        assert!(outcome.reason.contains("must be a collection"));
    }

    #[test]
    fn test_rejects_non_list_top_level() {
        let (_dir, path) = write(&json!({"items": []}));
        let outcome = ShapeValidator.validate(&path, &shape());
        assert!(!outcome.accepted);
        assert!(outcome.reason.contains("found an object"));
    }

    #[test]
    fn test_malformed_json_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[{\"word\": ").unwrap();
        let outcome = ShapeValidator.validate(&path, &shape());
        assert!(!outcome.accepted);
        assert!(outcome.reason.starts_with("invalid JSON"));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let outcome = ShapeValidator.validate(&dir.path().join("nope.json"), &shape());
        assert!(!outcome.accepted);
        assert!(outcome.reason.contains("cannot read"));
    }
}
