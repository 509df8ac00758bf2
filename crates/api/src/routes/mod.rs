//! Route table.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod credentials;
pub mod executions;
pub mod hitl;
pub mod streaming;
pub mod workflows;
pub mod ws;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Workflows
        .route("/api/workflows/{id}/compile/", post(workflows::compile))
        .route("/api/workflows/{id}/validate/", post(workflows::validate))
        .route("/api/workflows/{id}/execute/", post(workflows::execute))
        // Execution lifecycle
        .route("/api/executions/{id}/pause/", post(executions::pause))
        .route("/api/executions/{id}/resume/", post(executions::resume))
        .route("/api/executions/{id}/stop/", post(executions::stop))
        .route("/api/executions/{id}/status/", get(executions::status))
        // HITL
        .route("/api/hitl/pending/", get(hitl::pending))
        .route("/api/hitl/{request_id}/respond/", post(hitl::respond))
        // Streaming
        .route(
            "/api/streaming/executions/{id}/stream/",
            get(streaming::stream),
        )
        .route(
            "/api/streaming/executions/{id}/events/",
            get(streaming::replay),
        )
        .route("/ws/executions/{id}/", get(ws::execution_socket))
        // Credentials
        .route("/api/credentials/types/", get(credentials::types))
        .route(
            "/api/credentials/",
            get(credentials::list).post(credentials::create),
        )
        .route(
            "/api/credentials/{id}/",
            axum::routing::put(credentials::update).delete(credentials::remove),
        )
        .route("/api/credentials/{id}/verify/", post(credentials::verify))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
