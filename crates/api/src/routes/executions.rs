//! Execution lifecycle endpoints.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};
use skein_core::ExecutionId;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

fn ack(execution_id: ExecutionId, status: &str) -> Json<Value> {
    Json(json!({"status": status, "executionId": execution_id}))
}

/// `POST /api/executions/{id}/pause/`.
pub async fn pause(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.pause(execution_id, auth.user_id)?;
    Ok(ack(execution_id, "paused"))
}

/// `POST /api/executions/{id}/resume/`.
pub async fn resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.resume(execution_id, auth.user_id)?;
    Ok(ack(execution_id, "running"))
}

/// `POST /api/executions/{id}/stop/`.
pub async fn stop(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.stop(execution_id, auth.user_id)?;
    Ok(ack(execution_id, "cancelled"))
}

/// `GET /api/executions/{id}/status/` — the full handle (including any
/// pending HITL request), falling back to the persisted record for runs
/// that are no longer resident.
pub async fn status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Json<Value>, ApiError> {
    if let Some(handle) = state.orchestrator.get_status(execution_id, auth.user_id) {
        return Ok(Json(serde_json::to_value(handle).map_err(|_| ApiError::Internal)?));
    }
    let record = state
        .executions
        .get_execution(execution_id, auth.user_id)
        .await?;
    Ok(Json(json!({
        "executionId": record.execution_id,
        "workflowId": record.workflow_id,
        "state": record.status,
        "startedAt": record.started_at,
        "completedAt": record.completed_at,
        "error": record.error_message,
        "progress": if record.status.is_terminal() { 100.0 } else { 0.0 },
    })))
}
