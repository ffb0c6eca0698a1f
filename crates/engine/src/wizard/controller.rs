//! The wizard controller: owns the record, the step pointer, and the
//! submission status for one wizard mount.
//!
//! Every operation here runs on the caller's task in response to a discrete
//! user action; the only suspension point is [`WizardController::submit`],
//! which awaits the gateway round-trip. The controller is instance-scoped —
//! there is no ambient singleton — and presentation layers read and write
//! the record exclusively through its accessors.

use serde_json::{Map as JsonMap, Value};
use std::sync::Arc;
use tracing::{debug, info};

use doorstep_types::{FormRecord, FormSchema, StepDefinition, ValidationReport, validate_fields};
use doorstep_util::{DraftKey, DraftStore};

use crate::gateway::SubmissionGateway;
use crate::wizard::{StepOutcome, SubmissionStatus, SubmitOutcome, WizardError};

/// State machine coordinating a single multi-step intake run.
pub struct WizardController {
    schema: FormSchema,
    draft_key: DraftKey,
    draft_store: Arc<dyn DraftStore>,
    current_step: usize,
    record: FormRecord,
    status: SubmissionStatus,
    last_report: ValidationReport,
}

impl WizardController {
    /// Builds a controller for the schema, restoring field values from the
    /// draft store when a draft exists.
    ///
    /// The schema is verified up front; a malformed step table is a
    /// programmer error and aborts construction. Re-opening always starts
    /// at step 0 regardless of how far the drafted run had progressed.
    pub fn new(schema: FormSchema, draft_store: Arc<dyn DraftStore>) -> Result<Self, WizardError> {
        schema.verify()?;
        if schema.steps.is_empty() {
            return Err(WizardError::EmptySchema(schema.form.clone()));
        }

        let draft_key = DraftKey::new(schema.form.clone());
        let record = draft_store.load(&draft_key).unwrap_or_default();
        if !record.is_empty() {
            info!(form = %schema.form, "Restored draft for wizard");
        }

        Ok(Self {
            schema,
            draft_key,
            draft_store,
            current_step: 0,
            record,
            status: SubmissionStatus::Idle,
            last_report: ValidationReport::default(),
        })
    }

    /// The schema driving this wizard.
    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    /// Zero-based index of the active step.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Definition of the active step.
    pub fn step(&self) -> &StepDefinition {
        &self.schema.steps[self.current_step]
    }

    /// True when the active step is the last one.
    pub fn on_final_step(&self) -> bool {
        self.schema.last_step_index() == Some(self.current_step)
    }

    /// The record as captured so far, stale branch values included.
    pub fn record(&self) -> &FormRecord {
        &self.record
    }

    /// Submission status of this wizard instance.
    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    /// Validation result from the most recent gated transition.
    pub fn last_report(&self) -> &ValidationReport {
        &self.last_report
    }

    /// Updates a field value and saves a draft snapshot.
    ///
    /// Writing to a field the schema does not define is a programmer error.
    /// Changing the discriminator never moves the step pointer; which
    /// fields are required is re-evaluated lazily at the next validation.
    /// The draft write is fire-and-forget: persistence failures are logged
    /// inside the store and never block the caller.
    pub fn set_field(&mut self, field: &str, value: Value) -> Result<(), WizardError> {
        if !self.schema.fields.contains_key(field) {
            return Err(WizardError::UnknownField(field.to_string()));
        }
        self.record.set(field, value);
        self.draft_store.save(&self.draft_key, &self.record);
        Ok(())
    }

    /// Requests a forward transition.
    ///
    /// The active step's fields are validated under the current branch; on
    /// failure the step pointer stays put and the report is surfaced. On
    /// the final step a clean pass validates the whole active field set and
    /// answers [`StepOutcome::ReadyToSubmit`] instead of advancing.
    pub fn next(&mut self) -> StepOutcome {
        if self.navigation_disabled() {
            return StepOutcome::Ignored;
        }

        let step_fields = self.schema.active_step_fields(self.current_step, &self.record);
        let report = validate_fields(&self.schema, &self.record, step_fields);
        if !report.is_valid() {
            debug!(step = self.current_step, errors = report.len(), "Step validation rejected");
            self.last_report = report.clone();
            return StepOutcome::Rejected(report);
        }

        if self.on_final_step() {
            let full_report = validate_fields(&self.schema, &self.record, self.schema.active_fields(&self.record));
            self.last_report = full_report.clone();
            if full_report.is_valid() {
                return StepOutcome::ReadyToSubmit;
            }
            return StepOutcome::Rejected(full_report);
        }

        self.current_step += 1;
        self.last_report = ValidationReport::default();
        StepOutcome::Advanced(self.current_step)
    }

    /// Requests a backward transition. Always succeeds above step 0 and
    /// never validates or clears anything.
    pub fn back(&mut self) -> StepOutcome {
        if self.navigation_disabled() {
            return StepOutcome::Ignored;
        }
        if self.current_step == 0 {
            return StepOutcome::Ignored;
        }
        self.current_step -= 1;
        StepOutcome::MovedBack(self.current_step)
    }

    /// The payload a submission would carry: active fields only. Values
    /// entered under a branch that is no longer selected are purged from
    /// the outgoing record (they stay in the in-memory record, so switching
    /// the branch back restores them).
    pub fn submission_payload(&self) -> Value {
        let mut payload = JsonMap::new();
        for field in self.schema.active_fields(&self.record) {
            if let Some(value) = self.record.get(field) {
                payload.insert(field.to_string(), value.clone());
            }
        }
        Value::Object(payload)
    }

    /// Submits the record through the gateway.
    ///
    /// Only legal from the final step. Re-runs the full active-field
    /// validation first; a failure keeps the wizard on the last step with
    /// status unchanged. While a submission is in flight (or after one has
    /// succeeded) further submit calls are dropped without dispatching a
    /// second request. Success clears the draft; failure leaves record and
    /// draft intact for a user-initiated retry. Either way the status never
    /// sticks at `Submitting`.
    pub async fn submit(&mut self, gateway: &dyn SubmissionGateway) -> Result<SubmitOutcome, WizardError> {
        if matches!(self.status, SubmissionStatus::Submitting | SubmissionStatus::Succeeded) {
            return Ok(SubmitOutcome::Ignored);
        }
        if !self.on_final_step() {
            return Err(WizardError::NotOnFinalStep);
        }

        let report = validate_fields(&self.schema, &self.record, self.schema.active_fields(&self.record));
        if !report.is_valid() {
            self.last_report = report.clone();
            return Ok(SubmitOutcome::Rejected(report));
        }

        self.status = SubmissionStatus::Submitting;
        let payload = self.submission_payload();
        let outcome = gateway.create(&self.schema.form, payload).await;

        match outcome {
            Ok(receipt) => {
                info!(form = %self.schema.form, id = %receipt.id, "Submission accepted");
                self.status = SubmissionStatus::Succeeded;
                self.draft_store.clear(&self.draft_key);
                Ok(SubmitOutcome::Submitted(receipt))
            }
            Err(error) => {
                info!(form = %self.schema.form, error = %error, "Submission failed; record retained");
                self.status = SubmissionStatus::Failed;
                Ok(SubmitOutcome::Failed(error))
            }
        }
    }

    /// Returns to step 0 with an empty record, clears the draft, and resets
    /// the submission status. Available after success or on external close.
    pub fn reset(&mut self) {
        self.current_step = 0;
        self.record = FormRecord::new();
        self.status = SubmissionStatus::Idle;
        self.last_report = ValidationReport::default();
        self.draft_store.clear(&self.draft_key);
    }

    fn navigation_disabled(&self) -> bool {
        matches!(self.status, SubmissionStatus::Submitting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{StaticGateway, SubmissionError};
    use doorstep_types::catalog::{donation_form, volunteer_form};
    use doorstep_util::InMemoryDraftStore;
    use serde_json::json;

    fn controller_with_store(schema: FormSchema) -> (WizardController, Arc<InMemoryDraftStore>) {
        let store = Arc::new(InMemoryDraftStore::new());
        let controller = WizardController::new(schema, store.clone()).expect("schema verifies");
        (controller, store)
    }

    fn fill_contact(controller: &mut WizardController) {
        controller.set_field("name", json!("Jane Doe")).unwrap();
        controller.set_field("phone", json!("9876543210")).unwrap();
    }

    #[test]
    fn next_is_gated_by_step_validation() {
        let (mut controller, _store) = controller_with_store(donation_form());

        // Property: an unmet required field pins the step pointer.
        let outcome = controller.next();
        let StepOutcome::Rejected(report) = outcome else {
            panic!("expected rejection, got {:?}", outcome);
        };
        assert!(!report.is_empty());
        assert_eq!(controller.current_step(), 0);

        fill_contact(&mut controller);
        assert_eq!(controller.next(), StepOutcome::Advanced(1));
    }

    #[test]
    fn back_never_validates() {
        let (mut controller, _store) = controller_with_store(donation_form());
        fill_contact(&mut controller);
        controller.next();

        // Step 1 is invalid (no delivery method chosen), back still works.
        assert_eq!(controller.back(), StepOutcome::MovedBack(0));
        assert_eq!(controller.back(), StepOutcome::Ignored);
        assert_eq!(controller.current_step(), 0);
    }

    #[test]
    fn branch_errors_stay_inside_the_active_branch() {
        let (mut controller, _store) = controller_with_store(donation_form());
        fill_contact(&mut controller);
        controller.next();

        controller.set_field("delivery_method", json!("drop_off")).unwrap();
        let StepOutcome::Rejected(report) = controller.next() else {
            panic!("expected rejection without a drop-off location");
        };
        assert!(report.error("dropoff_location").is_some());
        assert!(report.error("address").is_none());
        assert!(report.error("preferred_date").is_none());

        controller.set_field("delivery_method", json!("pickup")).unwrap();
        let StepOutcome::Rejected(report) = controller.next() else {
            panic!("expected rejection without pickup details");
        };
        assert!(report.error("address").is_some());
        assert!(report.error("dropoff_location").is_none());
    }

    #[test]
    fn unknown_field_is_a_programmer_error() {
        let (mut controller, _store) = controller_with_store(donation_form());
        let error = controller.set_field("no_such_field", json!("x")).unwrap_err();
        assert!(matches!(error, WizardError::UnknownField(_)));
    }

    #[test]
    fn field_edits_persist_drafts() {
        let (mut controller, store) = controller_with_store(donation_form());
        controller.set_field("name", json!("Jane Doe")).unwrap();

        let draft = store.load(&DraftKey::new("donation-form")).expect("draft saved");
        assert_eq!(draft.get_str("name"), Some("Jane Doe"));
    }

    #[test]
    fn reopening_restores_values_at_step_zero() {
        let store = Arc::new(InMemoryDraftStore::new());
        {
            let mut controller = WizardController::new(donation_form(), store.clone()).unwrap();
            fill_contact(&mut controller);
            controller.next();
            assert_eq!(controller.current_step(), 1);
        }

        let controller = WizardController::new(donation_form(), store).unwrap();
        assert_eq!(controller.current_step(), 0);
        assert_eq!(controller.record().get_str("name"), Some("Jane Doe"));
    }

    #[test]
    fn corrupt_draft_opens_a_blank_wizard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drafts.json");
        std::fs::write(&path, "not json at all").unwrap();

        let store = Arc::new(doorstep_util::JsonDraftStore::open(Some(path)));
        let controller = WizardController::new(donation_form(), store).unwrap();
        assert!(controller.record().is_empty());
        assert_eq!(controller.current_step(), 0);
    }

    fn drive_to_ready(controller: &mut WizardController) {
        fill_contact(controller);
        assert_eq!(controller.next(), StepOutcome::Advanced(1));
        controller.set_field("delivery_method", json!("drop_off")).unwrap();
        controller.set_field("dropoff_location", json!("midtown-center")).unwrap();
        assert_eq!(controller.next(), StepOutcome::Advanced(2));
        controller
            .set_field("items", json!([{"category": "jacket", "quantity": 2}]))
            .unwrap();
        assert_eq!(controller.next(), StepOutcome::ReadyToSubmit);
    }

    #[tokio::test]
    async fn donation_intake_end_to_end() {
        let (mut controller, store) = controller_with_store(donation_form());
        fill_contact(&mut controller);
        assert_eq!(controller.next(), StepOutcome::Advanced(1));

        // Choosing the branch does not move the step pointer.
        controller.set_field("delivery_method", json!("drop_off")).unwrap();
        assert_eq!(controller.current_step(), 1);

        // Next without a location: error on dropoff_location, no advance.
        let StepOutcome::Rejected(report) = controller.next() else {
            panic!("expected rejection");
        };
        assert!(report.error("dropoff_location").is_some());
        assert_eq!(controller.current_step(), 1);

        controller.set_field("dropoff_location", json!("midtown-center")).unwrap();
        assert_eq!(controller.next(), StepOutcome::Advanced(2));

        controller
            .set_field("items", json!([{"category": "jacket", "quantity": 2}]))
            .unwrap();
        assert_eq!(controller.next(), StepOutcome::ReadyToSubmit);

        let gateway = StaticGateway::succeeding("abc");
        let outcome = controller.submit(&gateway).await.unwrap();
        let SubmitOutcome::Submitted(receipt) = outcome else {
            panic!("expected submission, got {:?}", outcome);
        };
        assert_eq!(receipt.id, "abc");
        assert_eq!(controller.status(), SubmissionStatus::Succeeded);
        assert!(store.load(&DraftKey::new("donation-form")).is_none());
    }

    #[tokio::test]
    async fn item_totals_gate_the_items_step() {
        let (mut controller, _store) = controller_with_store(donation_form());
        fill_contact(&mut controller);
        controller.next();
        controller.set_field("delivery_method", json!("drop_off")).unwrap();
        controller.set_field("dropoff_location", json!("midtown-center")).unwrap();
        controller.next();

        // All quantities zero: the "at least one item" rule rejects.
        controller
            .set_field("items", json!([{"category": "jacket", "quantity": 0}]))
            .unwrap();
        let StepOutcome::Rejected(report) = controller.next() else {
            panic!("expected rejection at zero quantity");
        };
        assert!(report.error("items").is_some());
    }

    #[tokio::test]
    async fn stale_branch_values_are_purged_from_the_payload() {
        let (mut controller, _store) = controller_with_store(donation_form());
        fill_contact(&mut controller);
        controller.next();

        // Fill the pickup branch first, then switch to drop-off.
        controller.set_field("delivery_method", json!("pickup")).unwrap();
        controller.set_field("address", json!("12 Elm Street")).unwrap();
        controller.set_field("preferred_date", json!("2026-09-01")).unwrap();
        controller.set_field("preferred_time", json!("10:30")).unwrap();
        controller.set_field("delivery_method", json!("drop_off")).unwrap();
        controller.set_field("dropoff_location", json!("midtown-center")).unwrap();
        assert_eq!(controller.next(), StepOutcome::Advanced(2));
        controller
            .set_field("items", json!([{"category": "jacket", "quantity": 1}]))
            .unwrap();
        assert_eq!(controller.next(), StepOutcome::ReadyToSubmit);

        // The stale pickup values stay in the record but leave the payload.
        assert_eq!(controller.record().get_str("address"), Some("12 Elm Street"));
        let payload = controller.submission_payload();
        assert!(payload.get("address").is_none());
        assert!(payload.get("preferred_date").is_none());
        assert_eq!(payload.get("dropoff_location"), Some(&json!("midtown-center")));

        let gateway = StaticGateway::succeeding("abc");
        controller.submit(&gateway).await.unwrap();
        assert!(gateway.received()[0].1.get("address").is_none());
    }

    #[tokio::test]
    async fn failed_submission_preserves_record_and_draft() {
        let (mut controller, store) = controller_with_store(donation_form());
        drive_to_ready(&mut controller);
        let submitted = controller.submission_payload();

        let gateway = StaticGateway::failing(SubmissionError::Transport("connection reset".into()));
        let outcome = controller.submit(&gateway).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        assert_eq!(controller.status(), SubmissionStatus::Failed);

        // Record is byte-for-byte what was submitted; the draft survives.
        assert_eq!(controller.submission_payload(), submitted);
        assert!(store.load(&DraftKey::new("donation-form")).is_some());

        // Retry is user-initiated and allowed after a failure.
        let retry_gateway = StaticGateway::succeeding("abc");
        let outcome = controller.submit(&retry_gateway).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
    }

    #[tokio::test]
    async fn submit_after_success_dispatches_nothing() {
        let (mut controller, _store) = controller_with_store(donation_form());
        drive_to_ready(&mut controller);

        let gateway = StaticGateway::succeeding("abc");
        controller.submit(&gateway).await.unwrap();
        assert_eq!(gateway.call_count(), 1);

        assert_eq!(controller.submit(&gateway).await.unwrap(), SubmitOutcome::Ignored);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn submit_off_the_final_step_is_a_programmer_error() {
        let (mut controller, _store) = controller_with_store(donation_form());
        let gateway = StaticGateway::succeeding("abc");
        let error = controller.submit(&gateway).await.unwrap_err();
        assert!(matches!(error, WizardError::NotOnFinalStep));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn reset_returns_to_a_blank_wizard() {
        let (mut controller, store) = controller_with_store(donation_form());
        drive_to_ready(&mut controller);
        let gateway = StaticGateway::succeeding("abc");
        controller.submit(&gateway).await.unwrap();

        controller.reset();
        assert_eq!(controller.current_step(), 0);
        assert!(controller.record().is_empty());
        assert_eq!(controller.status(), SubmissionStatus::Idle);
        assert!(store.load(&DraftKey::new("donation-form")).is_none());
    }

    #[test]
    fn volunteer_branch_switch_retains_unrelated_fields() {
        let (mut controller, _store) = controller_with_store(volunteer_form());
        controller.set_field("name", json!("Sam Lee")).unwrap();
        controller.set_field("phone", json!("5551234567")).unwrap();
        assert_eq!(controller.next(), StepOutcome::Advanced(1));

        controller.set_field("role", json!("events")).unwrap();
        assert_eq!(controller.next(), StepOutcome::Advanced(2));
        controller.set_field("availability", json!(["weekends"])).unwrap();

        // Back to the role step and change the discriminator.
        controller.back();
        controller.set_field("role", json!("sorting")).unwrap();

        // Earlier-entered availability is retained...
        assert_eq!(controller.record().get("availability"), Some(&json!(["weekends"])));

        // ...and re-validation does not spuriously flag unrelated fields.
        assert_eq!(controller.next(), StepOutcome::Advanced(2));
        assert_eq!(controller.next(), StepOutcome::ReadyToSubmit);
    }

    #[test]
    fn volunteer_driver_branch_requires_licence() {
        let (mut controller, _store) = controller_with_store(volunteer_form());
        controller.set_field("name", json!("Sam Lee")).unwrap();
        controller.set_field("phone", json!("5551234567")).unwrap();
        controller.next();

        controller.set_field("role", json!("driver")).unwrap();
        let StepOutcome::Rejected(report) = controller.next() else {
            panic!("expected licence requirement");
        };
        assert!(report.error("drivers_license").is_some());

        controller.set_field("role", json!("events")).unwrap();
        assert_eq!(controller.next(), StepOutcome::Advanced(2));
    }
}
