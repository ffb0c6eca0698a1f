//! The partial record a wizard run accumulates.
//!
//! A [`FormRecord`] is mutated field-by-field as the user progresses. At any
//! point in time only the fields belonging to completed steps are guaranteed
//! present and valid; everything else may be absent or stale (for example,
//! values entered under a branch that is no longer selected). The record is
//! serializable so it can round-trip through the draft store unchanged.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single `{category, quantity}` entry inside an items field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item category, for example "jacket" or "blanket".
    pub category: String,
    /// Number of items donated. Unset quantities deserialize to zero.
    #[serde(default)]
    pub quantity: u64,
}

/// Field values captured so far, keyed by field name in authoring order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormRecord {
    values: IndexMap<String, Value>,
}

impl FormRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or replaces) the value for a field.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    /// Returns the raw value for a field, if one was captured.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Returns the value for a field as a string slice, if it is a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }

    /// Removes a captured value, returning it when present.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.shift_remove(field)
    }

    /// True when no field has been captured yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates captured `(field, value)` pairs in authoring order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Parses an items field into typed line items.
    ///
    /// Entries that do not match the `{category, quantity}` shape are
    /// ignored rather than failing the whole list; a malformed draft must
    /// never wedge the wizard.
    pub fn line_items(&self, field: &str) -> Vec<LineItem> {
        match self.values.get(field) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Sum of quantities across all line items of an items field.
    pub fn total_quantity(&self, field: &str) -> u64 {
        self.line_items(field).iter().map(|item| item.quantity).sum()
    }
}

/// Sum of quantities inside a raw items value, tolerating malformed entries.
pub(crate) fn total_quantity_of_value(value: &Value) -> u64 {
    match value {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| serde_json::from_value::<LineItem>(entry.clone()).ok())
            .map(|item| item.quantity)
            .sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_round_trip() {
        let mut record = FormRecord::new();
        record.set("name", json!("Jane Doe"));
        record.set("phone", json!("9876543210"));

        assert_eq!(record.get_str("name"), Some("Jane Doe"));
        assert_eq!(record.get("phone"), Some(&json!("9876543210")));
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn serde_round_trip_preserves_values() {
        let mut record = FormRecord::new();
        record.set("name", json!("Jane"));
        record.set("items", json!([{"category": "jacket", "quantity": 2}]));

        let text = serde_json::to_string(&record).unwrap();
        let restored: FormRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn line_items_skip_malformed_entries() {
        let mut record = FormRecord::new();
        record.set(
            "items",
            json!([
                {"category": "jacket", "quantity": 2},
                "not an item",
                {"category": "blanket"},
            ]),
        );

        let items = record.line_items("items");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, 2);
        // Missing quantity defaults to zero.
        assert_eq!(items[1].quantity, 0);
        assert_eq!(record.total_quantity("items"), 2);
    }

    #[test]
    fn total_quantity_of_non_array_is_zero() {
        let mut record = FormRecord::new();
        record.set("items", json!("oops"));
        assert_eq!(record.total_quantity("items"), 0);
        assert_eq!(record.total_quantity("never_set"), 0);
    }
}
