//! Workflow model errors.

use thiserror::Error;

/// Errors raised by the workflow model.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A lifecycle transition is not allowed.
    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },

    /// The graph JSON could not be decoded.
    #[error("malformed workflow graph: {0}")]
    MalformedGraph(#[from] serde_json::Error),
}
