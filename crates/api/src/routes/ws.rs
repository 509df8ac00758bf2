//! WebSocket endpoint for execution events and HITL responses.
//!
//! Authentication happens *after* the upgrade so the typed close codes
//! (4001 auth, 4003 access) can actually reach the client.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::{Value, json};
use skein_core::{ExecutionId, RequestId};
use skein_eventbus::EventType;
use skein_execution::{HitlAction, HitlResponse};
use tracing::debug;

use crate::auth::{AuthUser, verify_token};
use crate::state::AppState;

const CLOSE_AUTH_FAILED: u16 = 4001;
const CLOSE_ACCESS_DENIED: u16 = 4003;

/// `GET /ws/executions/{id}/` — JWT in the `token` query parameter or the
/// `Authorization` header.
pub async fn execution_socket(
    State(state): State<AppState>,
    Path(execution_id): Path<ExecutionId>,
    headers: HeaderMap,
    axum::extract::RawQuery(query): axum::extract::RawQuery,
    ws: WebSocketUpgrade,
) -> Response {
    // Token from header or query; verified post-upgrade for typed closes.
    let token = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer ").map(str::to_owned))
        .or_else(|| {
            query.as_deref().and_then(|query| {
                query
                    .split('&')
                    .find_map(|pair| pair.strip_prefix("token=").map(str::to_owned))
            })
        });

    ws.on_upgrade(move |socket| async move {
        serve_socket(state, execution_id, token, socket).await;
    })
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

async fn serve_socket(
    state: AppState,
    execution_id: ExecutionId,
    token: Option<String>,
    mut socket: WebSocket,
) {
    let auth: Option<AuthUser> =
        token.and_then(|token| verify_token(&token, &state.config.jwt_secret).ok());
    let Some(auth) = auth else {
        close_with(socket, CLOSE_AUTH_FAILED, "authentication failed").await;
        return;
    };

    if state
        .executions
        .get_execution(execution_id, auth.user_id)
        .await
        .is_err()
    {
        close_with(socket, CLOSE_ACCESS_DENIED, "access denied").await;
        return;
    }

    let mut subscription = state.broadcaster.subscribe(execution_id);
    let connected = json!({"type": "connected", "data": {"execution_id": execution_id}});
    if socket
        .send(Message::Text(connected.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) =
                            handle_client_message(&state, auth, &text).await
                        {
                            if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary/ping/pong frames: nothing to do
                    Some(Err(err)) => {
                        debug!("websocket receive error: {err}");
                        break;
                    }
                }
            }
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let kind = if event.event_type == EventType::HitlRequest {
                    "hitl.request"
                } else {
                    "execution.event"
                };
                let frame = json!({
                    "type": kind,
                    "data": {
                        "type": event.event_type,
                        "data": event.data,
                        "sequence": event.sequence,
                        "timestamp": event.timestamp,
                    },
                });
                if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
                if event.event_type.is_terminal() {
                    break;
                }
            }
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}

/// Dispatch one client → server message; the returned value (if any) is
/// sent back.
async fn handle_client_message(
    state: &AppState,
    auth: AuthUser,
    text: &str,
) -> Option<Value> {
    let message: Value = serde_json::from_str(text).ok()?;
    match message.get("type").and_then(Value::as_str) {
        Some("ping") => Some(json!({"type": "pong", "data": {}})),
        Some("hitl_response") => {
            let request_id = message
                .get("request_id")
                .and_then(Value::as_str)
                .and_then(|raw| RequestId::parse(raw).ok())?;
            let action: HitlAction =
                serde_json::from_value(message.get("action").cloned().unwrap_or(Value::Null))
                    .ok()?;
            let response = HitlResponse {
                action,
                value: message.get("value").cloned(),
                message: message
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            };
            match state
                .orchestrator
                .respond_to_hitl(request_id, auth.user_id, response)
                .await
            {
                Ok(()) => Some(json!({"type": "notification", "data": {"status": "submitted"}})),
                Err(err) => Some(json!({"type": "error", "data": {"error": err.to_string()}})),
            }
        }
        // Subscription management beyond the path-scoped execution is a
        // no-op: this socket is already bound to one execution.
        Some("subscribe" | "unsubscribe") => None,
        _ => Some(json!({"type": "error", "data": {"error": "unknown message type"}})),
    }
}
