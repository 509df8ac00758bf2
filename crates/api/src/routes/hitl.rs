//! Human-in-the-loop endpoints.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use skein_core::RequestId;
use skein_execution::{HitlAction, HitlResponse};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/hitl/pending/`.
pub async fn pending(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let requests = state
        .orchestrator
        .list_pending_hitl(auth.user_id)
        .await
        .map_err(ApiError::from)?;
    let count = requests.len();
    Ok(Json(json!({"requests": requests, "count": count})))
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
    action: HitlAction,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

/// `POST /api/hitl/{request_id}/respond/`.
pub async fn respond(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<RequestId>,
    Json(body): Json<RespondBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .orchestrator
        .respond_to_hitl(
            request_id,
            auth.user_id,
            HitlResponse {
                action: body.action,
                value: body.value,
                message: body.message,
            },
        )
        .await?;
    Ok(Json(json!({"status": "submitted", "requestId": request_id})))
}
