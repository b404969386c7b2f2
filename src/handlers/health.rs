use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::server::AppState;

pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[derive(Serialize)]
pub struct ReadyzResponse {
    pub status: &'static str,
    pub sandbox: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_executions: Option<usize>,
}

pub async fn readyz(State(state): State<AppState>) -> Json<ReadyzResponse> {
    let executor = state.orchestrator.executor();
    Json(ReadyzResponse {
        status: "ok",
        sandbox: executor.mode(),
        max_concurrent_executions: executor.admission_limit(),
    })
}
