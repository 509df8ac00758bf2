//! SSE streaming and event-history replay.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use http::header::{CACHE_CONTROL, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use skein_core::ExecutionId;
use skein_eventbus::{EventStream, StreamEvent};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

const STREAM_TIMEOUT: Duration = Duration::from_secs(300);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

fn sse_payload(event: &StreamEvent) -> Value {
    json!({
        "type": event.event_type,
        "data": event.data,
        "sequence": event.sequence,
        "timestamp": event.timestamp,
    })
}

/// `GET /api/streaming/executions/{id}/stream/` — `text/event-stream` with
/// the connected → events → heartbeat sequence from the broadcaster.
pub async fn stream(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Response, ApiError> {
    // Ownership gate before any resources are committed.
    state
        .executions
        .get_execution(execution_id, auth.user_id)
        .await?;
    let guard = state
        .stream_limiter
        .open(auth.user_id, auth.tier)
        .map_err(|err| ApiError::TooManyRequests(err.to_string()))?;

    let subscription = state.broadcaster.subscribe(execution_id);
    let events = EventStream::new(subscription, STREAM_TIMEOUT, HEARTBEAT_INTERVAL);

    // The guard rides along in the stream state so the connection slot is
    // released exactly when the stream is dropped.
    let body = futures::stream::unfold((events, guard), |(mut events, guard)| async move {
        let event = events.next().await?;
        let sse_event = Event::default()
            .id(event.event_id.to_string())
            .event(event.event_type.as_str())
            .json_data(sse_payload(&event))
            .ok()?;
        Some((Ok::<Event, Infallible>(sse_event), (events, guard)))
    });

    let mut response = Sse::new(body).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    headers.insert(
        http::header::CONNECTION,
        HeaderValue::from_static("keep-alive"),
    );
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct ReplayParams {
    #[serde(default)]
    after_sequence: u64,
    #[serde(default)]
    limit: Option<usize>,
}

/// `GET /api/streaming/executions/{id}/events/?after_sequence=N&limit=L`.
pub async fn replay(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(execution_id): Path<ExecutionId>,
    Query(params): Query<ReplayParams>,
) -> Result<Json<Value>, ApiError> {
    state
        .executions
        .get_execution(execution_id, auth.user_id)
        .await?;

    let limit = params.limit.unwrap_or(100).min(500);
    let events = state
        .events
        .events_after(execution_id, params.after_sequence, limit)
        .await?;

    let has_more = events.len() == limit;
    let rows: Vec<Value> = events
        .iter()
        .map(|event| {
            json!({
                "id": event.event_id,
                "type": event.event_type,
                "data": event.data,
                "sequence": event.sequence,
                "timestamp": event.timestamp,
            })
        })
        .collect();
    Ok(Json(json!({
        "execution_id": execution_id,
        "events": rows,
        "has_more": has_more,
    })))
}
