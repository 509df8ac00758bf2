//! Execution and node-run status enums.

use serde::{Deserialize, Serialize};

/// The overall status of one workflow execution.
///
/// Lifecycle: `Pending → Running → {Completed | Failed | Cancelled}`, with
/// excursions to `Paused` and `WaitingHuman` that return to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, driver not yet running.
    Pending,
    /// Actively executing nodes.
    Running,
    /// Held at the pause gate; resumable.
    Paused,
    /// Blocked on a human-in-the-loop response.
    WaitingHuman,
    /// Finished; every node executed or was skipped.
    Completed,
    /// Finished with a fatal node or infrastructure error.
    Failed,
    /// Stopped by the user or by budget exhaustion.
    Cancelled,
}

impl ExecutionStatus {
    /// Whether this is a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the run is live (may still make progress).
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused | Self::WaitingHuman)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::WaitingHuman => write!(f, "waiting_human"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-node run status recorded in the node execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunStatus {
    /// Not yet reached by the driver.
    #[default]
    Pending,
    /// Handler currently executing.
    Running,
    /// Handler finished successfully.
    Completed,
    /// Handler failed (after exhausting retries).
    Failed,
    /// On a conditional branch that was not taken.
    Skipped,
}

impl std::fmt::Display for NodeRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::WaitingHuman.is_terminal());
    }

    #[test]
    fn active_states() {
        assert!(ExecutionStatus::Running.is_active());
        assert!(ExecutionStatus::Paused.is_active());
        assert!(ExecutionStatus::WaitingHuman.is_active());
        assert!(!ExecutionStatus::Pending.is_active());
        assert!(!ExecutionStatus::Cancelled.is_active());
    }

    #[test]
    fn wire_form_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::WaitingHuman).unwrap(),
            "\"waiting_human\""
        );
        assert_eq!(
            serde_json::to_string(&NodeRunStatus::Skipped).unwrap(),
            "\"skipped\""
        );
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(ExecutionStatus::WaitingHuman.to_string(), "waiting_human");
        assert_eq!(NodeRunStatus::Completed.to_string(), "completed");
    }
}
