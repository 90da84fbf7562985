/* src/handlers.rs */

use crate::{report, response, state::AppState};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// GET /v1/task - Returns whether the polling tasks are running.
pub async fn get_task_status(State(state): State<AppState>) -> Response {
    let is_running = *state.task_running.read();
    response::success(Some(json!({
        "running": is_running,
        "accounts": state.trackers.len(),
    })))
}

/// GET /v1/status - Returns every account with a position, ranked like the report.
pub async fn get_status(State(state): State<AppState>) -> Response {
    let ranked = report::rank(report::collect(&state.trackers));
    response::success(Some(ranked))
}

/// GET /v1/status/{name} - Returns a single account's snapshot.
pub async fn get_account_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    let Some(tracker) = state.trackers.iter().find(|t| t.name() == name.trim()) else {
        return response::error(StatusCode::NOT_FOUND, "Account is not monitored.");
    };
    match tracker.snapshot() {
        Some(snapshot) => response::success(Some(snapshot)),
        None => (
            StatusCode::ACCEPTED,
            Json(json!({"status": "Accepted", "message": "No position has been fetched yet."})),
        )
            .into_response(),
    }
}
