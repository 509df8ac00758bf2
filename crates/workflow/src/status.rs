//! Workflow lifecycle status.

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Lifecycle status of a stored workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Being edited; not runnable by triggers.
    #[default]
    Draft,
    /// Live and runnable.
    Active,
    /// Temporarily disabled by the owner.
    Paused,
    /// Retired. Terminal: an archived workflow cannot be reactivated.
    Archived,
}

impl WorkflowStatus {
    /// Whether a transition from `self` to `to` is legal.
    ///
    /// Transitions only move the lifecycle forward (`Draft → Active`,
    /// `Active ⇄ Paused`, anything → `Archived`); `Archived` is terminal.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Active)
                | (Self::Active, Self::Paused)
                | (Self::Paused, Self::Active)
                | (Self::Draft | Self::Active | Self::Paused, Self::Archived)
        )
    }

    /// Validate a transition, returning an error describing the pair when
    /// it is not legal.
    pub fn transition(self, to: Self) -> Result<Self, WorkflowError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(WorkflowError::InvalidStatusTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_activates() {
        assert!(WorkflowStatus::Draft.can_transition(WorkflowStatus::Active));
    }

    #[test]
    fn active_pauses_and_resumes() {
        assert!(WorkflowStatus::Active.can_transition(WorkflowStatus::Paused));
        assert!(WorkflowStatus::Paused.can_transition(WorkflowStatus::Active));
    }

    #[test]
    fn anything_archives_except_archived() {
        assert!(WorkflowStatus::Draft.can_transition(WorkflowStatus::Archived));
        assert!(WorkflowStatus::Active.can_transition(WorkflowStatus::Archived));
        assert!(WorkflowStatus::Paused.can_transition(WorkflowStatus::Archived));
        assert!(!WorkflowStatus::Archived.can_transition(WorkflowStatus::Archived));
    }

    #[test]
    fn archived_is_terminal() {
        assert!(!WorkflowStatus::Archived.can_transition(WorkflowStatus::Active));
        assert!(!WorkflowStatus::Archived.can_transition(WorkflowStatus::Draft));
    }

    #[test]
    fn backward_transitions_rejected() {
        assert!(!WorkflowStatus::Active.can_transition(WorkflowStatus::Draft));
        assert!(!WorkflowStatus::Paused.can_transition(WorkflowStatus::Draft));
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = WorkflowStatus::Archived
            .transition(WorkflowStatus::Active)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid status transition from archived to active"
        );
    }

    #[test]
    fn serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Draft).unwrap(),
            "\"draft\""
        );
    }
}
