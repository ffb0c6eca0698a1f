//! HTTP-backed submission gateway.
//!
//! Posts the JSON payload to `{base_url}/{kind}` and maps the response onto
//! the gateway contract: a 2xx answer with an `id` field becomes a receipt,
//! any other status becomes [`SubmissionError::Rejected`], and connection
//! failures become [`SubmissionError::Transport`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{SubmissionError, SubmissionGateway, SubmissionReceipt};

/// Gateway that forwards submissions to a remote intake API.
pub struct HttpSubmissionGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ReceiptBody {
    id: String,
}

impl HttpSubmissionGateway {
    /// Builds a gateway rooted at `base_url` (no trailing slash required).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, kind: &str) -> String {
        format!("{}/{}", self.base_url, kind)
    }
}

#[async_trait]
impl SubmissionGateway for HttpSubmissionGateway {
    async fn create(&self, kind: &str, payload: Value) -> Result<SubmissionReceipt, SubmissionError> {
        let url = self.endpoint(kind);
        debug!(%url, "Submitting intake record");

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|error| SubmissionError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.trim().is_empty() {
                status.to_string()
            } else {
                format!("{}: {}", status, body.trim())
            };
            return Err(SubmissionError::Rejected(detail));
        }

        let receipt: ReceiptBody = response
            .json()
            .await
            .map_err(|error| SubmissionError::Rejected(format!("malformed receipt: {}", error)))?;
        Ok(SubmissionReceipt { id: receipt.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_kind() {
        let gateway = HttpSubmissionGateway::new("https://intake.example.com/api/");
        assert_eq!(gateway.endpoint("donation-form"), "https://intake.example.com/api/donation-form");
    }
}
