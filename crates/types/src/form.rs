//! Declarative form schema: field catalog, validation rules, and step table.
//!
//! A [`FormSchema`] is fixed at wizard construction time and never mutated at
//! runtime. Fields carry their own declarative validation metadata; a field
//! may additionally be gated behind a [`BranchRule`] so it only participates
//! in validation while the discriminator field selects its branch.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::record::FormRecord;

pub mod validation;

/// Structural problems detected while verifying a schema.
///
/// These are programmer (or form-author) errors: they abort schema
/// construction and are never surfaced as user-facing validation messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A step lists a field that does not exist in the field catalog.
    #[error("step '{step}' references undefined field '{field}'")]
    UndefinedField { step: String, field: String },
    /// A field appears in more than one step.
    #[error("field '{field}' is owned by both step '{first}' and step '{second}'")]
    DoubleOwned { field: String, first: String, second: String },
    /// A field exists in the catalog but no step owns it.
    #[error("field '{field}' is not owned by any step")]
    Orphaned { field: String },
    /// A branch rule points at a field that is not the declared discriminator.
    #[error("field '{field}' branches on '{branch_field}', but the schema discriminator is {discriminator:?}")]
    BranchMismatch {
        field: String,
        branch_field: String,
        discriminator: Option<String>,
    },
    /// The declared discriminator is missing from the field catalog.
    #[error("discriminator '{0}' is not a schema field")]
    UnknownDiscriminator(String),
}

/// Primitive kind of a form field, used by presentation layers to pick an
/// input affordance. The engine only treats [`FieldKind::Items`] specially
/// (for quantity-total rules); everything else validates as opaque JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text.
    #[default]
    Text,
    /// Telephone number entered as text.
    Phone,
    /// Email address entered as text.
    Email,
    /// Calendar date entered as text (`YYYY-MM-DD`).
    Date,
    /// Time of day entered as text (`HH:MM`).
    Time,
    /// One value chosen from an enumerated set.
    Select,
    /// A variable-length list of `{category, quantity}` line items.
    Items,
}

/// Declarative validation metadata attached to a single field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FieldValidation {
    /// Whether the field must hold a meaningful value.
    #[serde(default)]
    pub required: bool,
    /// Enumerated values the candidate must match (when non-empty).
    #[serde(default)]
    pub allowed_values: Vec<JsonValue>,
    /// Regular expression string candidates must match.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Minimum number of characters for string candidates.
    #[serde(default)]
    pub min_length: Option<usize>,
    /// Maximum number of characters for string candidates.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Minimum summed quantity across line items (items fields only).
    #[serde(default)]
    pub min_total_quantity: Option<u64>,
}

/// Gates a field to one branch of the form.
///
/// The field is *active* only while the record's current value for
/// `field` equals `equals`. Inactive fields are skipped by validation
/// entirely, even when a stale value from a previously selected branch is
/// still present in the record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchRule {
    /// Name of the discriminator field this rule inspects.
    pub field: String,
    /// Discriminator value that activates the gated field.
    pub equals: JsonValue,
}

/// A single field in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FieldDefinition {
    /// Human-readable label shown next to the input.
    #[serde(default)]
    pub label: String,
    /// Optional descriptive copy for detail panes or prompts.
    #[serde(default)]
    pub description: Option<String>,
    /// Primitive kind driving the input affordance.
    #[serde(default)]
    pub kind: FieldKind,
    /// Declarative validation rules.
    #[serde(default)]
    pub validate: FieldValidation,
    /// Branch gate, when the field belongs to a conditional sub-flow.
    #[serde(default)]
    pub branch: Option<BranchRule>,
    /// Placeholder text rendered while the field is empty.
    #[serde(default)]
    pub placeholder: Option<String>,
}

/// One page of the wizard: an identifier, a label, and the subset of the
/// field catalog it owns. Ordinal position is the index inside
/// [`FormSchema::steps`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDefinition {
    /// Stable step identifier (for example `contact`).
    pub id: String,
    /// Human-readable step title.
    #[serde(default)]
    pub title: String,
    /// Names of the catalog fields this step owns.
    #[serde(default)]
    pub fields: Vec<String>,
}

/// A fully authored intake form: metadata, field catalog, and step table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormSchema {
    /// Canonical form identifier, doubling as the draft key (for example
    /// `donation-form`).
    #[serde(default)]
    pub form: String,
    /// Optional human-readable title.
    #[serde(default)]
    pub title: Option<String>,
    /// Name of the discriminator field selecting between branches, if any.
    #[serde(default)]
    pub discriminator: Option<String>,
    /// Field catalog keyed by field name, preserving authoring order.
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
    /// Ordered wizard steps.
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl FormSchema {
    /// Verifies the structural invariants of the schema.
    ///
    /// Every step field must exist in the catalog, every catalog field must
    /// be owned by exactly one step, and branch rules must reference the
    /// declared discriminator. Run once at construction or load time.
    pub fn verify(&self) -> Result<(), SchemaError> {
        if let Some(discriminator) = &self.discriminator
            && !self.fields.contains_key(discriminator)
        {
            return Err(SchemaError::UnknownDiscriminator(discriminator.clone()));
        }

        let mut owners: IndexMap<&str, &str> = IndexMap::new();
        for step in &self.steps {
            for field in &step.fields {
                if !self.fields.contains_key(field) {
                    return Err(SchemaError::UndefinedField {
                        step: step.id.clone(),
                        field: field.clone(),
                    });
                }
                if let Some(first) = owners.insert(field.as_str(), step.id.as_str()) {
                    return Err(SchemaError::DoubleOwned {
                        field: field.clone(),
                        first: first.to_string(),
                        second: step.id.clone(),
                    });
                }
            }
        }

        for (name, definition) in &self.fields {
            if !owners.contains_key(name.as_str()) {
                return Err(SchemaError::Orphaned { field: name.clone() });
            }
            if let Some(branch) = &definition.branch
                && self.discriminator.as_deref() != Some(branch.field.as_str())
            {
                return Err(SchemaError::BranchMismatch {
                    field: name.clone(),
                    branch_field: branch.field.clone(),
                    discriminator: self.discriminator.clone(),
                });
            }
        }

        Ok(())
    }

    /// True when the field participates in validation for the record's
    /// current discriminator state. Fields without a branch rule are always
    /// active; gated fields are active only while the discriminator holds
    /// the branch value.
    pub fn field_active(&self, field: &str, record: &FormRecord) -> bool {
        match self.fields.get(field).and_then(|definition| definition.branch.as_ref()) {
            Some(rule) => record.get(&rule.field) == Some(&rule.equals),
            None => true,
        }
    }

    /// Names of the step's fields that are active for the given record.
    pub fn active_step_fields<'a>(&'a self, step_index: usize, record: &FormRecord) -> Vec<&'a str> {
        self.steps
            .get(step_index)
            .map(|step| {
                step.fields
                    .iter()
                    .map(String::as_str)
                    .filter(|field| self.field_active(field, record))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of every catalog field active for the given record, in
    /// authoring order. This is the set checked by the final pre-submission
    /// validation pass.
    pub fn active_fields<'a>(&'a self, record: &FormRecord) -> Vec<&'a str> {
        self.fields
            .keys()
            .map(String::as_str)
            .filter(|field| self.field_active(field, record))
            .collect()
    }

    /// Index of the last step, or `None` for an empty step table.
    pub fn last_step_index(&self) -> Option<usize> {
        self.steps.len().checked_sub(1)
    }
}
