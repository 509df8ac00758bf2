//! What a driver run produces.

use serde_json::Value;
use skein_core::NodeId;
use skein_execution::ExecutionStatus;

/// Terminal result of one driver run.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Terminal status (`Completed`, `Failed`, `Cancelled`, or `Paused`
    /// when a custom supervisor suspended the run).
    pub status: ExecutionStatus,
    /// The last non-skipped node's output items, as JSON.
    pub output: Value,
    /// Human-readable error for failed runs.
    pub error: Option<String>,
    /// The node the failure is attributed to.
    pub failed_node: Option<NodeId>,
    /// Developer-facing failure detail.
    pub traceback: Option<String>,
}

impl ExecutionOutcome {
    /// A completed run with its final output.
    #[must_use]
    pub fn completed(output: Value) -> Self {
        Self {
            status: ExecutionStatus::Completed,
            output,
            error: None,
            failed_node: None,
            traceback: None,
        }
    }

    /// A failed run.
    #[must_use]
    pub fn failed(
        node: Option<NodeId>,
        error: impl Into<String>,
        traceback: Option<String>,
    ) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            output: Value::Null,
            error: Some(error.into()),
            failed_node: node,
            traceback,
        }
    }

    /// A cancelled run.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Cancelled,
            output: Value::Null,
            error: Some(reason.into()),
            failed_node: None,
            traceback: None,
        }
    }
}
