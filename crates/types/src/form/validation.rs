//! Validation helpers shared across wizard consumers.
//!
//! These routines check candidate values (typed by the user or restored from
//! a draft) against the declarative constraints in the form schema. They are
//! pure functions of their inputs: nothing here mutates the record or
//! persists state, and a [`ValidationReport`] is recomputed on every request.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::form::{FieldValidation, FormSchema};
use crate::record::{FormRecord, total_quantity_of_value};

/// Per-request validation outcome: field name to error message, plus an
/// overall verdict. Empty report means the checked fields all passed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: IndexMap<String, String>,
}

impl ValidationReport {
    /// True when no checked field produced an error.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record an error message for a field.
    pub fn reject(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(field.into(), message.into());
    }

    /// Error message for a field, when it failed.
    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    /// Iterates `(field, message)` pairs in check order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(field, message)| (field.as_str(), message.as_str()))
    }

    /// Number of failed fields.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when the report carries no errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

/// True when the value carries user-entered content: non-null, non-blank
/// string, non-empty array or object.
pub fn has_meaningful_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Validate a candidate value against the declarative field rules.
///
/// The checks mirror the behaviour expected by the wizard and CLI:
/// - Absent or blank candidates fail only the `required` rule.
/// - Enumerations must include the candidate.
/// - Patterns, minimum length, and maximum length only apply to strings.
/// - Quantity totals only apply to line-item arrays.
/// - Non-string values are allowed when the rules carry no string-specific
///   requirements.
pub fn validate_candidate_value(candidate: Option<&Value>, validation: &FieldValidation) -> Result<(), String> {
    let Some(candidate) = candidate.filter(|value| has_meaningful_value(value)) else {
        if validation.required {
            return Err("this field is required".to_string());
        }
        return Ok(());
    };

    if !validation.allowed_values.is_empty() {
        let matches_allowed_value = validation
            .allowed_values
            .iter()
            .any(|allowed| json_values_match(allowed, candidate));
        if !matches_allowed_value {
            return Err("value is not in the allowed set".to_string());
        }
    }

    if let Some(min_total) = validation.min_total_quantity
        && total_quantity_of_value(candidate) < min_total
    {
        if min_total == 1 {
            return Err("add at least one item".to_string());
        }
        return Err(format!("items must total at least {}", min_total));
    }

    match candidate {
        Value::String(text) => {
            if let Some(min_length) = validation.min_length
                && text.chars().count() < min_length
            {
                return Err(format!("value must be at least {} characters", min_length));
            }

            if let Some(max_length) = validation.max_length
                && text.chars().count() > max_length
            {
                return Err(format!("value must be at most {} characters", max_length));
            }

            if let Some(pattern) = &validation.pattern {
                let regex = Regex::new(pattern).map_err(|error| format!("invalid pattern '{}': {}", pattern, error))?;
                if !regex.is_match(text) {
                    return Err(format!("value must match the pattern {}", pattern));
                }
            }
            Ok(())
        }
        other => {
            if validation.pattern.is_some() || validation.min_length.is_some() || validation.max_length.is_some() {
                Err("value must be text to satisfy validation rules".to_string())
            } else if validation.allowed_values.is_empty() || validation.allowed_values.iter().any(|item| item == other) {
                Ok(())
            } else {
                Err("value is not in the allowed set".to_string())
            }
        }
    }
}

/// Validate the named fields of a schema against the record, skipping fields
/// whose branch is not active for the record's current discriminator state.
///
/// Fields absent from the catalog are ignored here; step tables are verified
/// against the catalog at schema load time, so an unknown name cannot occur
/// through the wizard path.
pub fn validate_fields<'a>(
    schema: &FormSchema,
    record: &FormRecord,
    fields: impl IntoIterator<Item = &'a str>,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    for field in fields {
        let Some(definition) = schema.fields.get(field) else {
            continue;
        };
        if !schema.field_active(field, record) {
            continue;
        }
        if let Err(message) = validate_candidate_value(record.get(field), &definition.validate) {
            report.reject(field, message);
        }
    }
    report
}

fn json_values_match(expected: &Value, candidate: &Value) -> bool {
    if expected == candidate {
        return true;
    }
    match (expected, candidate) {
        (Value::String(expected_text), Value::String(candidate_text)) => expected_text == candidate_text,
        (Value::String(expected_text), other) => expected_text == &other.to_string(),
        (other, Value::String(candidate_text)) => {
            if let Ok(parsed) = serde_json::from_str::<Value>(candidate_text) {
                other == &parsed
            } else {
                other == &Value::String(candidate_text.clone())
            }
        }
        _ => false,
    }
}
