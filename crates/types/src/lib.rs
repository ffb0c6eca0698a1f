//! Strongly typed intake form definitions shared across the engine, draft
//! store, and CLI.
//!
//! The models defined here describe a multi-step intake form as data: the
//! field catalog with its declarative validation rules, the ordered step
//! table, and the partial [`FormRecord`](record::FormRecord) a wizard run
//! accumulates. Authoring order is preserved everywhere (via `IndexMap`) so
//! consumers can render fields and steps in a predictable sequence.

pub mod catalog;
pub mod form;
pub mod record;

pub use form::validation::{ValidationReport, has_meaningful_value, validate_candidate_value, validate_fields};
pub use form::{BranchRule, FieldDefinition, FieldKind, FieldValidation, FormSchema, SchemaError, StepDefinition};
pub use record::{FormRecord, LineItem};
