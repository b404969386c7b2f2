//! Final answer delivery.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of a submission attempt.
///
/// Transport failures are data, not errors: `status_code` is `None` and
/// `response` carries the error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    pub status_code: Option<u16>,
    pub response: String,
}

impl SubmissionResult {
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            response: message.into(),
        }
    }
}

/// Fields identifying who is submitting for which page.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub email: &'a str,
    pub secret: &'a str,
    /// The page the answer belongs to.
    pub url: &'a str,
    pub answer: &'a serde_json::Value,
}

/// Delivers the final answer to its destination. Never fails.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, destination: &str, submission: &Submission<'_>) -> SubmissionResult;
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    email: &'a str,
    secret: &'a str,
    url: &'a str,
    answer: &'a serde_json::Value,
}

/// POSTs the answer as JSON.
pub struct HttpSubmitter {
    client: Client,
}

impl HttpSubmitter {
    /// `client` should carry the submission timeout.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, destination: &str, submission: &Submission<'_>) -> SubmissionResult {
        let body = SubmitBody {
            email: submission.email,
            secret: submission.secret,
            url: submission.url,
            answer: submission.answer,
        };

        let response = match self.client.post(destination).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(destination, error = %e, "Submission transport failed");
                return SubmissionResult::transport_error(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(destination, status, error = %e, "Failed to read submission response");
                return SubmissionResult {
                    status_code: Some(status),
                    response: e.to_string(),
                };
            }
        };

        info!(destination, status, "Answer submitted");
        SubmissionResult {
            status_code: Some(status),
            response: text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_destination_is_reported_as_data() {
        let submitter = HttpSubmitter::new(Client::new());
        let answer = serde_json::json!(1);
        let submission = Submission {
            email: "a@b.test",
            secret: "s",
            url: "https://q.test",
            answer: &answer,
        };

        // Port 9 (discard) on localhost is almost never listening.
        let result = submitter
            .submit("http://127.0.0.1:9/submit", &submission)
            .await;

        assert_eq!(result.status_code, None);
        assert!(!result.response.is_empty());
    }

    #[tokio::test]
    async fn malformed_destination_is_reported_as_data() {
        let submitter = HttpSubmitter::new(Client::new());
        let answer = serde_json::json!("x");
        let submission = Submission {
            email: "a@b.test",
            secret: "s",
            url: "https://q.test",
            answer: &answer,
        };

        let result = submitter.submit("not a url", &submission).await;
        assert_eq!(result.status_code, None);
    }

    #[test]
    fn serializes_missing_status_as_null() {
        let value = serde_json::to_value(SubmissionResult::transport_error("refused")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"status_code": null, "response": "refused"})
        );
    }
}
