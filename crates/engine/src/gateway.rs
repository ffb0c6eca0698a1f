//! The asynchronous boundary between a completed wizard run and whatever
//! stores the record.
//!
//! The persistence collaborator is opaque to the engine: it receives a fully
//! validated payload and answers with either a receipt carrying the new
//! record's identifier or an error. The gateway never retries on its own;
//! retrying is a user-initiated re-submit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use thiserror::Error;

pub mod http;

/// Successful submission outcome: the identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Backend-assigned record identifier.
    pub id: String,
}

/// Failures crossing the submission boundary. Both variants are recoverable:
/// the wizard stays on the final step with the record intact so the user can
/// correct and retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// The backend received the record and refused it.
    #[error("submission rejected: {0}")]
    Rejected(String),
    /// The record may never have reached the backend (network or I/O).
    #[error("submission failed: {0}")]
    Transport(String),
}

/// Persistence collaborator contract.
///
/// `kind` is the form identifier (for example `donation-form`); `payload`
/// contains only the fields active under the record's final discriminator
/// state.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    /// Creates a record of the given kind, returning its identifier.
    async fn create(&self, kind: &str, payload: Value) -> Result<SubmissionReceipt, SubmissionError>;
}

/// Canned response the [`StaticGateway`] returns for every call.
#[derive(Debug, Clone)]
pub enum StaticResponse {
    /// Succeed with this receipt identifier.
    Succeed(String),
    /// Fail with this error.
    Fail(SubmissionError),
}

/// Gateway double for tests and `--dry-run` style previews: answers with a
/// canned response and records every payload it received.
pub struct StaticGateway {
    response: StaticResponse,
    received: Mutex<Vec<(String, Value)>>,
}

impl StaticGateway {
    /// Gateway that accepts every submission with the given identifier.
    pub fn succeeding(id: impl Into<String>) -> Self {
        Self {
            response: StaticResponse::Succeed(id.into()),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Gateway that fails every submission with the given error.
    pub fn failing(error: SubmissionError) -> Self {
        Self {
            response: StaticResponse::Fail(error),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Payloads received so far, in arrival order.
    pub fn received(&self) -> Vec<(String, Value)> {
        self.received.lock().expect("gateway lock poisoned").clone()
    }

    /// Number of create calls dispatched to this gateway.
    pub fn call_count(&self) -> usize {
        self.received.lock().expect("gateway lock poisoned").len()
    }
}

#[async_trait]
impl SubmissionGateway for StaticGateway {
    async fn create(&self, kind: &str, payload: Value) -> Result<SubmissionReceipt, SubmissionError> {
        self.received
            .lock()
            .expect("gateway lock poisoned")
            .push((kind.to_string(), payload));
        match &self.response {
            StaticResponse::Succeed(id) => Ok(SubmissionReceipt { id: id.clone() }),
            StaticResponse::Fail(error) => Err(error.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn static_gateway_records_payloads() {
        let gateway = StaticGateway::succeeding("abc");
        let receipt = gateway.create("donation-form", json!({"name": "Jane"})).await.unwrap();
        assert_eq!(receipt.id, "abc");
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(gateway.received()[0].0, "donation-form");
    }

    #[tokio::test]
    async fn static_gateway_surfaces_failures() {
        let gateway = StaticGateway::failing(SubmissionError::Transport("connection reset".into()));
        let error = gateway.create("donation-form", json!({})).await.unwrap_err();
        assert!(matches!(error, SubmissionError::Transport(_)));
        assert_eq!(gateway.call_count(), 1);
    }
}
