use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::handlers::api_auth::secret_matches;
use crate::handlers::problem_details;
use crate::pipeline::{RunOutcome, RunReport, RunRequest, RunStatus, Stage};
use crate::sandbox::ExecutionError;
use crate::server::AppState;
use crate::store::RunId;
use crate::submit::SubmissionResult;

#[derive(Deserialize)]
pub struct CreateRunRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: RunStatus,
    pub run_id: RunId,
    pub run_folder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_response: Option<SubmissionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl From<RunReport> for RunResponse {
    fn from(report: RunReport) -> Self {
        let mut response = RunResponse {
            status: report.run.status,
            run_id: report.run.id,
            run_folder: report.run_folder.to_string_lossy().into_owned(),
            final_answer: None,
            submit_url: None,
            submit_response: None,
            failed_stage: None,
            error: None,
        };
        match report.outcome {
            RunOutcome::Completed { answer, submission } => {
                response.final_answer = Some(answer.answer);
                response.submit_url = Some(answer.submit_url);
                response.submit_response = Some(submission);
            }
            RunOutcome::Halted { stage, error } => {
                response.failed_stage = Some(stage);
                response.error = Some(error);
            }
        }
        response
    }
}

/// Run the whole pipeline for one page. The secret is checked before
/// anything is created on disk.
///
/// Once accepted, the run always finishes and writes its manifest, even if
/// the response is never delivered.
pub async fn create_run(
    State(state): State<AppState>,
    Json(req): Json<CreateRunRequest>,
) -> Response {
    if !secret_matches(state.secret.as_deref(), &req.secret) {
        warn!(email = %req.email, "Rejected run request with invalid secret");
        return problem_details::forbidden("Invalid secret").into_response();
    }
    if req.url.trim().is_empty() {
        return problem_details::bad_request("url must not be empty").into_response();
    }

    info!(email = %req.email, url = %req.url, "Accepted run request");
    let request = RunRequest {
        email: req.email,
        secret: req.secret,
        url: req.url,
    };

    // Detached from the request future: dropping the response does not
    // cancel the run.
    let orchestrator = state.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.run(&request).await });

    match task.await {
        Ok(Ok(report)) => Json(RunResponse::from(report)).into_response(),
        Ok(Err(e)) => problem_details::internal_error(e.to_string()).into_response(),
        Err(e) => {
            error!(error = %e, "Pipeline task failed");
            problem_details::internal_error("pipeline task failed").into_response()
        }
    }
}
