//! Compile, validate and execute endpoints.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use skein_compiler::{CompileResult, Compiler};
use skein_core::WorkflowId;
use skein_orchestrator::StartRequest;
use skein_storage::TriggerType;
use skein_throttle::RateClass;
use skein_workflow::WorkflowStatus;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

async fn compile_for_user(
    state: &AppState,
    auth: AuthUser,
    workflow_id: WorkflowId,
) -> Result<CompileResult, ApiError> {
    state
        .rate_limiter
        .check(
            RateClass::Compile,
            &auth.user_id.to_string(),
            auth.tier,
        )
        .map_err(|err| ApiError::TooManyRequests(err.to_string()))?;

    let workflow = state
        .workflows
        .get_workflow(workflow_id, auth.user_id)
        .await?;
    let owned = state
        .credentials
        .credential_ids(auth.user_id)
        .await
        .unwrap_or_default();
    Ok(Compiler::new(workflow.graph, owned, state.registry.clone()).compile())
}

/// `POST /api/workflows/{id}/compile/` — 200 on success, 400 with the
/// structured error list on validation failure.
pub async fn compile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(workflow_id): Path<WorkflowId>,
) -> Result<Response, ApiError> {
    let result = compile_for_user(&state, auth, workflow_id).await?;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let body = json!({
        "success": result.success,
        "errors": result.errors,
        "warnings": result.warnings,
        "executionPlan": result.execution_plan,
        "stats": {"nodeCount": result.node_count, "edgeCount": result.edge_count},
    });
    Ok((status, Json(body)).into_response())
}

/// `POST /api/workflows/{id}/validate/` — summary with the top five errors.
pub async fn validate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(workflow_id): Path<WorkflowId>,
) -> Result<Json<Value>, ApiError> {
    let result = compile_for_user(&state, auth, workflow_id).await?;
    let top: Vec<_> = result.errors.iter().take(5).collect();
    Ok(Json(json!({
        "valid": result.success,
        "errorCount": result.errors.len(),
        "errors": top,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ExecuteBody {
    #[serde(default)]
    input_data: Option<Value>,
    /// Asynchronous dispatch is the default; `false` waits for completion.
    #[serde(default, rename = "async")]
    run_async: Option<bool>,
}

/// `POST /api/workflows/{id}/execute/` — 202 with the handle summary.
pub async fn execute(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(workflow_id): Path<WorkflowId>,
    body: Option<Json<ExecuteBody>>,
) -> Result<Response, ApiError> {
    state
        .rate_limiter
        .check(
            RateClass::Execute,
            &auth.user_id.to_string(),
            auth.tier,
        )
        .map_err(|err| ApiError::TooManyRequests(err.to_string()))?;

    let body = body.map(|Json(body)| body).unwrap_or(ExecuteBody {
        input_data: None,
        run_async: None,
    });
    let workflow = state
        .workflows
        .get_workflow(workflow_id, auth.user_id)
        .await?;
    if workflow.status == WorkflowStatus::Archived {
        return Err(ApiError::BadRequest("workflow is archived".to_owned()));
    }

    let handle = state
        .orchestrator
        .start(
            StartRequest::for_workflow(
                &workflow,
                auth.user_id,
                body.input_data.unwrap_or_else(|| json!({})),
            )
            .with_trigger(TriggerType::Api),
        )
        .await?;

    let summary = |state_name: String| {
        json!({
            "executionId": handle.execution_id,
            "workflowId": handle.workflow_id,
            "state": state_name,
            "startedAt": handle.started_at,
        })
    };

    if body.run_async.unwrap_or(true) {
        return Ok((StatusCode::ACCEPTED, Json(summary(handle.state.to_string()))).into_response());
    }

    // Synchronous mode: poll the handle until terminal (bounded).
    let deadline = std::time::Instant::now() + Duration::from_secs(60);
    loop {
        if let Some(snapshot) = state
            .orchestrator
            .get_status(handle.execution_id, auth.user_id)
        {
            if snapshot.state.is_terminal() {
                return Ok(
                    (StatusCode::OK, Json(summary(snapshot.state.to_string()))).into_response()
                );
            }
        }
        if std::time::Instant::now() >= deadline {
            return Ok(
                (StatusCode::ACCEPTED, Json(summary("running".to_owned()))).into_response()
            );
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
