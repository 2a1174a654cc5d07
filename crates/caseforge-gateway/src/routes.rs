use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::info;

use caseforge_core::types::RunRequest;

use crate::state::AppState;

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// POST /api/runs — execute one run to completion and return the final state.
//
// This endpoint never returns a non-2xx for workflow failures: every failure
// mode is reported in the body as status = "error" with a reasoning, so
// callers have one shape to parse.
pub async fn submit_run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Json<serde_json::Value> {
    info!(task = %request.task, api = %request.api_name, "Run submitted");

    let done = caseforge_agent::run_request(state.deps.clone(), request).await;
    let body = serde_json::to_value(&done).unwrap_or_else(|e| {
        serde_json::json!({
            "status": "error",
            "reasoning": format!("failed to serialize run state: {e}"),
        })
    });
    Json(body)
}
