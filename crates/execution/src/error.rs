//! Execution error types.

use thiserror::Error;

/// Errors raised at execution time.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A status transition is not legal from the current state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },

    /// The execution was cancelled.
    #[error("execution cancelled")]
    Cancelled,

    /// A node exceeded its per-node timeout.
    #[error("node '{node_id}' timed out after {seconds}s")]
    NodeTimeout {
        /// The node that timed out.
        node_id: String,
        /// The configured timeout.
        seconds: u64,
    },

    /// The execution exhausted its overall time budget.
    #[error("execution time budget exhausted")]
    BudgetExhausted,

    /// No handler is registered for a node type.
    #[error("no handler registered for node type '{0}'")]
    HandlerMissing(String),

    /// A referenced execution is unknown to the orchestrator.
    #[error("execution not found")]
    NotFound,

    /// The caller does not own the referenced execution.
    #[error("access denied")]
    AccessDenied,

    /// Credential material could not be fetched or decrypted.
    #[error("credential failure: {0}")]
    Credential(String),

    /// A serialization or deserialization error.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_timeout_display() {
        let err = ExecutionError::NodeTimeout {
            node_id: "b".into(),
            seconds: 5,
        };
        assert_eq!(err.to_string(), "node 'b' timed out after 5s");
    }

    #[test]
    fn handler_missing_display() {
        let err = ExecutionError::HandlerMissing("mystery".into());
        assert!(err.to_string().contains("mystery"));
    }
}
