//! Stream event shape and vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_core::ExecutionId;
use uuid::Uuid;

/// The event vocabulary emitted during an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Sent once per subscriber when its stream opens.
    Connected,
    /// The execution started.
    WorkflowStart,
    /// The execution finished successfully. Terminal.
    WorkflowComplete,
    /// The execution failed. Terminal.
    WorkflowError,
    /// A node began executing.
    NodeStarted,
    /// A node finished (successfully or not).
    NodeComplete,
    /// A node was skipped (branch not taken).
    NodeSkipped,
    /// A human-in-the-loop request was raised.
    HitlRequest,
    /// Progress update.
    Progress,
    /// Keep-alive filler during inactivity.
    Heartbeat,
}

impl EventType {
    /// Whether receipt of this event ends a stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::WorkflowComplete | Self::WorkflowError)
    }

    /// The wire name (`snake_case`), as used in SSE `event:` lines.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::WorkflowStart => "workflow_start",
            Self::WorkflowComplete => "workflow_complete",
            Self::WorkflowError => "workflow_error",
            Self::NodeStarted => "node_started",
            Self::NodeComplete => "node_complete",
            Self::NodeSkipped => "node_skipped",
            Self::HitlRequest => "hitl_request",
            Self::Progress => "progress",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event on an execution's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// The execution this event belongs to.
    pub execution_id: ExecutionId,
    /// Event kind.
    pub event_type: EventType,
    /// Kind-specific payload.
    pub data: Value,
    /// Monotonic, gap-free per-execution sequence number. Synthetic
    /// per-subscriber events (`connected`, `heartbeat`) carry 0.
    pub sequence: u64,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    /// A synthetic per-subscriber event (not sequenced, not persisted).
    #[must_use]
    pub fn synthetic(execution_id: ExecutionId, event_type: EventType, data: Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            execution_id,
            event_type,
            data,
            sequence: 0,
            timestamp: Utc::now(),
        }
    }
}
