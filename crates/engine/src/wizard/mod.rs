//! The wizard state machine: one state per step plus the submission states.

mod controller;

pub use controller::WizardController;

use doorstep_types::{SchemaError, ValidationReport};
use thiserror::Error;

use crate::gateway::{SubmissionError, SubmissionReceipt};

/// Submission lifecycle of a wizard instance.
///
/// `Submitting` marks the only suspension point in the machine; while it is
/// set, step navigation and further submit calls are ignored so at most one
/// submission of a record is ever in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    /// No submission attempted since the last reset.
    #[default]
    Idle,
    /// A submission round-trip is in flight.
    Submitting,
    /// The backend accepted the record.
    Succeeded,
    /// The last submission attempt failed; the record is intact for retry.
    Failed,
}

/// Programmer errors raised by the wizard API. These indicate misuse of the
/// engine, not bad user input, and have no recovery path.
#[derive(Debug, Error)]
pub enum WizardError {
    /// The schema failed its structural integrity check.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A caller wrote to a field the schema does not define.
    #[error("unknown field '{0}'")]
    UnknownField(String),
    /// Submit was invoked while the wizard was not on its final step.
    #[error("submit is only available from the final step")]
    NotOnFinalStep,
    /// The schema has no steps at all.
    #[error("schema '{0}' defines no steps")]
    EmptySchema(String),
}

/// Outcome of a `next` or `back` transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step pointer advanced to the given index.
    Advanced(usize),
    /// The step pointer moved back to the given index.
    MovedBack(usize),
    /// Validation failed; the step pointer did not move.
    Rejected(ValidationReport),
    /// The final step validated clean; the wizard may submit.
    ReadyToSubmit,
    /// The request arrived while navigation was disabled (submission in
    /// flight or already succeeded) and was dropped.
    Ignored,
}

/// Outcome of a submit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend accepted the record and the draft was cleared.
    Submitted(SubmissionReceipt),
    /// Final validation failed; the wizard stays on the last step.
    Rejected(ValidationReport),
    /// The gateway reported a failure; record and draft are intact.
    Failed(SubmissionError),
    /// A submission was already in flight or already succeeded; no request
    /// was dispatched.
    Ignored,
}
