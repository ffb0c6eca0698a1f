//! Asynchronous wizard session that streams lifecycle events and responds to
//! UI commands.
//!
//! This module wraps the synchronous [`WizardController`] in a cooperative
//! task: commands arrive over a Tokio channel and are applied strictly one
//! at a time, lifecycle events flow back over a second channel. Dropping the
//! event receiver detaches the UI — a submission already in flight still
//! runs to completion, but its late outcome is discarded instead of
//! resurrecting a closed wizard's visible state.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::debug;

use doorstep_types::ValidationReport;

use crate::gateway::SubmissionGateway;
use crate::wizard::{StepOutcome, SubmissionStatus, SubmitOutcome, WizardController, WizardError};

/// Commands a presentation layer issues against a running session.
#[derive(Debug, Clone)]
pub enum WizardCommand {
    /// Write a field value (triggers a draft snapshot).
    SetField {
        /// Schema field name.
        field: String,
        /// New value.
        value: Value,
    },
    /// Request a validation-gated forward transition.
    Next,
    /// Request an unconditional backward transition.
    Back,
    /// Submit the record through the session's gateway.
    Submit,
    /// Return to a blank wizard.
    Reset,
    /// End the session.
    Close,
}

/// Lifecycle events emitted while the session runs.
#[derive(Debug, Clone)]
pub enum WizardEvent {
    /// The step pointer entered the given step.
    StepEntered {
        /// Zero-based step index.
        index: usize,
        /// Stable step identifier.
        step_id: String,
        /// Human-readable step title.
        title: String,
        /// Emission time.
        at: DateTime<Utc>,
    },
    /// A gated transition or submission was rejected by validation.
    ValidationFailed {
        /// Per-field errors for the checked fields.
        report: ValidationReport,
    },
    /// A submission round-trip started.
    SubmissionStarted {
        /// Emission time.
        at: DateTime<Utc>,
    },
    /// A submission round-trip finished (either way).
    SubmissionFinished {
        /// Terminal status: `Succeeded` or `Failed`.
        status: SubmissionStatus,
        /// Backend identifier on success.
        receipt_id: Option<String>,
        /// Error text on failure.
        error: Option<String>,
        /// Emission time.
        at: DateTime<Utc>,
    },
    /// The session ended.
    Closed {
        /// Emission time.
        at: DateTime<Utc>,
    },
}

/// Drives a wizard session until `Close` arrives or the command channel
/// disconnects.
///
/// Commands are serialized: a second `Next` or `Submit` arriving while one
/// is being processed waits its turn behind the first, so step transitions
/// never interleave and at most one submission is in flight. All event
/// sends are best-effort — once the receiver is gone the session keeps
/// consuming commands (and finishes an in-flight submission) without
/// anywhere to report to.
pub async fn run_wizard_session(
    mut controller: WizardController,
    gateway: Arc<dyn SubmissionGateway>,
    mut command_rx: UnboundedReceiver<WizardCommand>,
    event_tx: UnboundedSender<WizardEvent>,
) -> Result<(), WizardError> {
    emit_step_entered(&controller, &event_tx);

    while let Some(command) = command_rx.recv().await {
        match command {
            WizardCommand::SetField { field, value } => {
                controller.set_field(&field, value)?;
            }
            WizardCommand::Next => match controller.next() {
                StepOutcome::Advanced(_) | StepOutcome::ReadyToSubmit => emit_step_entered(&controller, &event_tx),
                StepOutcome::Rejected(report) => {
                    let _ = event_tx.send(WizardEvent::ValidationFailed { report });
                }
                StepOutcome::MovedBack(_) | StepOutcome::Ignored => {}
            },
            WizardCommand::Back => {
                if let StepOutcome::MovedBack(_) = controller.back() {
                    emit_step_entered(&controller, &event_tx);
                }
            }
            WizardCommand::Submit => {
                let _ = event_tx.send(WizardEvent::SubmissionStarted { at: Utc::now() });
                match controller.submit(gateway.as_ref()).await? {
                    SubmitOutcome::Submitted(receipt) => {
                        let _ = event_tx.send(WizardEvent::SubmissionFinished {
                            status: SubmissionStatus::Succeeded,
                            receipt_id: Some(receipt.id),
                            error: None,
                            at: Utc::now(),
                        });
                    }
                    SubmitOutcome::Failed(error) => {
                        let _ = event_tx.send(WizardEvent::SubmissionFinished {
                            status: SubmissionStatus::Failed,
                            receipt_id: None,
                            error: Some(error.to_string()),
                            at: Utc::now(),
                        });
                    }
                    SubmitOutcome::Rejected(report) => {
                        let _ = event_tx.send(WizardEvent::ValidationFailed { report });
                    }
                    SubmitOutcome::Ignored => {
                        debug!("Duplicate submit dropped");
                    }
                }
            }
            WizardCommand::Reset => {
                controller.reset();
                emit_step_entered(&controller, &event_tx);
            }
            WizardCommand::Close => break,
        }
    }

    let _ = event_tx.send(WizardEvent::Closed { at: Utc::now() });
    Ok(())
}

fn emit_step_entered(controller: &WizardController, event_tx: &UnboundedSender<WizardEvent>) {
    let step = controller.step();
    let _ = event_tx.send(WizardEvent::StepEntered {
        index: controller.current_step(),
        step_id: step.id.clone(),
        title: step.title.clone(),
        at: Utc::now(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::StaticGateway;
    use doorstep_types::catalog::donation_form;
    use doorstep_util::InMemoryDraftStore;
    use serde_json::json;
    use tokio::sync::mpsc::unbounded_channel;

    fn set(field: &str, value: Value) -> WizardCommand {
        WizardCommand::SetField {
            field: field.into(),
            value,
        }
    }

    fn full_donation_run() -> Vec<WizardCommand> {
        vec![
            set("name", json!("Jane Doe")),
            set("phone", json!("9876543210")),
            WizardCommand::Next,
            set("delivery_method", json!("drop_off")),
            set("dropoff_location", json!("midtown-center")),
            WizardCommand::Next,
            set("items", json!([{"category": "jacket", "quantity": 2}])),
            WizardCommand::Next,
            WizardCommand::Submit,
            WizardCommand::Close,
        ]
    }

    #[tokio::test]
    async fn session_streams_lifecycle_events() {
        let controller = WizardController::new(donation_form(), Arc::new(InMemoryDraftStore::new())).unwrap();
        let gateway = Arc::new(StaticGateway::succeeding("abc"));

        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, mut event_rx) = unbounded_channel();
        for command in full_donation_run() {
            command_tx.send(command).unwrap();
        }
        drop(command_tx);

        run_wizard_session(controller, gateway.clone(), command_rx, event_tx)
            .await
            .unwrap();

        let mut saw_success = false;
        let mut saw_closed = false;
        while let Ok(event) = event_rx.try_recv() {
            match event {
                WizardEvent::SubmissionFinished { status, receipt_id, .. } => {
                    saw_success |= status == SubmissionStatus::Succeeded && receipt_id.as_deref() == Some("abc");
                }
                WizardEvent::Closed { .. } => saw_closed = true,
                _ => {}
            }
        }
        assert!(saw_success);
        assert!(saw_closed);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_submit_commands_dispatch_one_request() {
        let controller = WizardController::new(donation_form(), Arc::new(InMemoryDraftStore::new())).unwrap();
        let gateway = Arc::new(StaticGateway::succeeding("abc"));

        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, _event_rx) = unbounded_channel();
        let mut commands = full_donation_run();
        // Queue a second Submit right behind the first.
        commands.insert(commands.len() - 1, WizardCommand::Submit);
        for command in commands {
            command_tx.send(command).unwrap();
        }
        drop(command_tx);

        run_wizard_session(controller, gateway.clone(), command_rx, event_tx)
            .await
            .unwrap();
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn detached_receiver_does_not_abort_the_session() {
        let controller = WizardController::new(donation_form(), Arc::new(InMemoryDraftStore::new())).unwrap();
        let gateway = Arc::new(StaticGateway::succeeding("abc"));

        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();
        // The UI goes away before the run starts; events have nowhere to go.
        drop(event_rx);
        for command in full_donation_run() {
            command_tx.send(command).unwrap();
        }
        drop(command_tx);

        run_wizard_session(controller, gateway.clone(), command_rx, event_tx)
            .await
            .unwrap();
        // The in-flight work still completed.
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn rejected_next_emits_validation_failure() {
        let controller = WizardController::new(donation_form(), Arc::new(InMemoryDraftStore::new())).unwrap();
        let gateway = Arc::new(StaticGateway::succeeding("abc"));

        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, mut event_rx) = unbounded_channel();
        command_tx.send(WizardCommand::Next).unwrap();
        command_tx.send(WizardCommand::Close).unwrap();
        drop(command_tx);

        run_wizard_session(controller, gateway, command_rx, event_tx).await.unwrap();

        let mut saw_rejection = false;
        while let Ok(event) = event_rx.try_recv() {
            if let WizardEvent::ValidationFailed { report } = event {
                saw_rejection = true;
                assert!(report.error("name").is_some());
            }
        }
        assert!(saw_rejection);
    }
}
