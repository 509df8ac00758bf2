//! Credential CRUD. Decrypted material never appears in a response.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use skein_core::CredentialId;
use skein_credential::credential_type_catalog;
use skein_storage::{CredentialKind, CredentialRecord};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// The non-secret projection of a credential returned to clients.
fn redacted(record: &CredentialRecord) -> Value {
    json!({
        "id": record.id,
        "name": record.name,
        "kind": record.kind,
        "isActive": record.is_active,
        "createdAt": record.created_at,
        "updatedAt": record.updated_at,
        "lastUsedAt": record.last_used_at,
        "tokenExpiresAt": record.token_expires_at,
    })
}

/// `GET /api/credentials/types/`.
pub async fn types() -> Json<Value> {
    Json(credential_type_catalog())
}

/// `GET /api/credentials/`.
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let records = state
        .credentials
        .credential_records(auth.user_id)
        .await?;
    let rows: Vec<Value> = records.iter().map(redacted).collect();
    Ok(Json(json!({"credentials": rows})))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    name: String,
    kind: CredentialKind,
    data: Value,
    #[serde(default)]
    oauth_token_url: Option<String>,
}

/// `POST /api/credentials/`.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateBody>,
) -> Result<Response, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_owned()));
    }
    let record = state
        .credentials
        .create(
            auth.user_id,
            body.name,
            body.kind,
            &body.data,
            body.oauth_token_url,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(redacted(&record))).into_response())
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    data: Value,
}

/// `PUT /api/credentials/{id}/`.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(credential_id): Path<CredentialId>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .credentials
        .update(credential_id, auth.user_id, &body.data)
        .await?;
    Ok(Json(json!({"status": "updated", "id": credential_id})))
}

/// `DELETE /api/credentials/{id}/`.
pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(credential_id): Path<CredentialId>,
) -> Result<Json<Value>, ApiError> {
    state
        .credentials
        .delete(credential_id, auth.user_id)
        .await?;
    Ok(Json(json!({"status": "deleted", "id": credential_id})))
}

/// `POST /api/credentials/{id}/verify/`.
pub async fn verify(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(credential_id): Path<CredentialId>,
) -> Result<Json<Value>, ApiError> {
    let problems = state
        .credentials
        .verify(credential_id, auth.user_id)
        .await?;
    Ok(Json(json!({"valid": problems.is_empty(), "problems": problems})))
}
