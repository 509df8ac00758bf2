//! Validated status transitions.

use crate::error::ExecutionError;
use crate::status::ExecutionStatus;

/// Whether `from → to` is a legal execution transition.
#[must_use]
pub fn execution_transition_allowed(from: ExecutionStatus, to: ExecutionStatus) -> bool {
    use ExecutionStatus as S;
    matches!(
        (from, to),
        (S::Pending, S::Running | S::Cancelled | S::Failed)
            | (
                S::Running,
                S::Paused | S::WaitingHuman | S::Completed | S::Failed | S::Cancelled
            )
            | (S::Paused, S::Running | S::Cancelled)
            | (S::WaitingHuman, S::Running | S::Cancelled | S::Failed)
    )
}

/// Validate an execution transition.
pub fn validate_execution_transition(
    from: ExecutionStatus,
    to: ExecutionStatus,
) -> Result<(), ExecutionError> {
    if execution_transition_allowed(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExecutionStatus as S;

    #[test]
    fn happy_path() {
        assert!(execution_transition_allowed(S::Pending, S::Running));
        assert!(execution_transition_allowed(S::Running, S::Completed));
    }

    #[test]
    fn pause_resume_cycle() {
        assert!(execution_transition_allowed(S::Running, S::Paused));
        assert!(execution_transition_allowed(S::Paused, S::Running));
    }

    #[test]
    fn hitl_cycle() {
        assert!(execution_transition_allowed(S::Running, S::WaitingHuman));
        assert!(execution_transition_allowed(S::WaitingHuman, S::Running));
    }

    #[test]
    fn cancel_from_any_live_state() {
        assert!(execution_transition_allowed(S::Pending, S::Cancelled));
        assert!(execution_transition_allowed(S::Running, S::Cancelled));
        assert!(execution_transition_allowed(S::Paused, S::Cancelled));
        assert!(execution_transition_allowed(S::WaitingHuman, S::Cancelled));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [S::Completed, S::Failed, S::Cancelled] {
            for target in [S::Pending, S::Running, S::Paused, S::Completed] {
                assert!(!execution_transition_allowed(terminal, target));
            }
        }
    }

    #[test]
    fn pause_only_from_running() {
        assert!(!execution_transition_allowed(S::Pending, S::Paused));
        assert!(!execution_transition_allowed(S::WaitingHuman, S::Paused));
    }

    #[test]
    fn validation_error_names_states() {
        let err = validate_execution_transition(S::Completed, S::Running).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid transition from completed to running"
        );
    }
}
