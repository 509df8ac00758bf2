//! Shared application state.

use std::sync::Arc;

use skein_credential::CredentialManager;
use skein_eventbus::Broadcaster;
use skein_handlers::HandlerRegistry;
use skein_orchestrator::Orchestrator;
use skein_storage::{EventStore, ExecutionStore, WorkflowStore};
use skein_throttle::{RateLimiter, StreamLimiter};

use crate::config::ApiConfig;

/// Everything the route handlers share. Cheap to clone; all members are
/// reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Execution lifecycle control.
    pub orchestrator: Arc<Orchestrator>,
    /// Live event fan-out.
    pub broadcaster: Arc<Broadcaster>,
    /// Node handler registry (palette, validation).
    pub registry: Arc<HandlerRegistry>,
    /// Workflow records.
    pub workflows: Arc<dyn WorkflowStore>,
    /// Execution records.
    pub executions: Arc<dyn ExecutionStore>,
    /// Event history for replay.
    pub events: Arc<dyn EventStore>,
    /// Credential manager.
    pub credentials: Arc<CredentialManager>,
    /// Per-user token buckets.
    pub rate_limiter: Arc<RateLimiter>,
    /// Concurrent-stream caps.
    pub stream_limiter: StreamLimiter,
    /// Process configuration.
    pub config: Arc<ApiConfig>,
}
