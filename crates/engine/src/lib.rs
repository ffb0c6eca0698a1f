//! # Doorstep Engine
//!
//! The Doorstep engine drives multi-step intake wizards: it owns the wizard
//! state machine, validates each step against the declarative form schema,
//! persists drafts as the user types, and hands completed records to an
//! asynchronous submission gateway.
//!
//! ## Key pieces
//!
//! - **`wizard`**: the [`WizardController`] state machine — one state per
//!   step plus the submitting/succeeded/failed tail, with validation-gated
//!   forward transitions and free backward navigation
//! - **`gateway`**: the [`SubmissionGateway`] boundary to the opaque
//!   persistence collaborator, with HTTP and canned implementations
//! - **`session`**: a Tokio task wrapping a controller behind command and
//!   event channels for interactive frontends
//! - **form files**: [`parse_form_file`] loads additional schemas from
//!   YAML or JSON documents and verifies them on load
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use doorstep_engine::{StepOutcome, WizardController};
//! use doorstep_types::catalog::donation_form;
//! use doorstep_util::InMemoryDraftStore;
//!
//! let store = Arc::new(InMemoryDraftStore::new());
//! let mut wizard = WizardController::new(donation_form(), store)?;
//! wizard.set_field("name", serde_json::json!("Jane Doe"))?;
//! wizard.set_field("phone", serde_json::json!("9876543210"))?;
//! assert_eq!(wizard.next(), StepOutcome::Advanced(1));
//! # Ok::<(), doorstep_engine::WizardError>(())
//! ```

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use doorstep_types::FormSchema;

pub mod gateway;
pub mod session;
pub mod wizard;

pub use gateway::http::HttpSubmissionGateway;
pub use gateway::{StaticGateway, SubmissionError, SubmissionGateway, SubmissionReceipt};
pub use session::{WizardCommand, WizardEvent, run_wizard_session};
pub use wizard::{StepOutcome, SubmissionStatus, SubmitOutcome, WizardController, WizardError};

/// A parsed form-file document: form identifier to verified schema.
#[derive(Debug, Clone)]
pub struct FormBundle {
    /// Schemas keyed by their form identifier.
    pub forms: HashMap<String, FormSchema>,
}

/// Loads a form schema file from the filesystem.
///
/// The file may hold a single schema (top-level `form`, `fields`, `steps`
/// keys) or several under a `forms:` key. YAML and JSON both parse, since
/// YAML is a superset of JSON for our purposes. Every schema is verified on
/// load; a structurally broken form file is refused outright rather than
/// failing later inside a running wizard.
///
/// # Errors
///
/// Returns an error when the file cannot be read, does not match either
/// document shape, or contains a schema that fails verification.
pub fn parse_form_file(file_path: impl AsRef<Path>) -> Result<FormBundle> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read form file: {}", file_path.display()))?;

    // Attempt the multi-form document first so a multi document is never
    // accepted as a single schema with ignored fields.
    #[derive(Deserialize)]
    struct MultiFormDocument {
        forms: HashMap<String, FormSchema>,
    }

    let forms = if let Ok(document) = serde_yaml::from_str::<MultiFormDocument>(&content) {
        document.forms
    } else if let Ok(schema) = serde_yaml::from_str::<FormSchema>(&content) {
        let mut forms = HashMap::new();
        let name = if schema.form.is_empty() { "default".to_string() } else { schema.form.clone() };
        forms.insert(name, schema);
        forms
    } else {
        anyhow::bail!(
            "Unsupported form document format. Expected one of:\n\
             - Single form schema with 'form', 'fields', and 'steps' keys\n\
             - Multi-form document with schemas under a 'forms' key\n\
             "
        );
    };

    for (name, schema) in &forms {
        schema
            .verify()
            .with_context(|| format!("form '{}' in {} failed verification", name, file_path.display()))?;
    }

    Ok(FormBundle { forms })
}
