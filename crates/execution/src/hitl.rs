//! Human-in-the-loop request and response types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use skein_core::{ExecutionId, NodeId, RequestId, UserId};

/// Why the execution is asking a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlRequestType {
    /// Approve-or-reject gate before a consequential action.
    Approval,
    /// Free-form question.
    Clarification,
    /// Decision after a node error.
    ErrorRecovery,
    /// Non-blocking review request.
    Review,
}

/// Lifecycle of a HITL request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlStatus {
    /// Waiting for a response.
    Pending,
    /// Approved by the user.
    Approved,
    /// Rejected by the user.
    Rejected,
    /// Answered (clarification) by the user.
    Answered,
    /// Timed out; the auto action was applied.
    Timeout,
    /// The owning execution ended before a response arrived.
    Cancelled,
}

/// What to do when a request times out without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoAction {
    /// Treat as approved.
    Approve,
    /// Treat as rejected.
    #[default]
    Reject,
    /// Skip the gated node.
    Skip,
}

/// The action a responder chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlAction {
    /// Approve the gated action.
    Approve,
    /// Reject the gated action.
    Reject,
    /// Answer a clarification.
    Answer,
    /// Skip the gated node.
    Skip,
    /// Retry the failed node.
    Retry,
}

impl From<AutoAction> for HitlAction {
    fn from(auto: AutoAction) -> Self {
        match auto {
            AutoAction::Approve => Self::Approve,
            AutoAction::Reject => Self::Reject,
            AutoAction::Skip => Self::Skip,
        }
    }
}

/// A human-in-the-loop interaction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlRequest {
    /// Request identifier.
    pub id: RequestId,
    /// Execution this request belongs to.
    pub execution_id: ExecutionId,
    /// User who must respond.
    pub user_id: UserId,
    /// Node that raised the request.
    pub node_id: NodeId,
    /// Why the human is being asked.
    pub request_type: HitlRequestType,
    /// Short title for notification surfaces.
    pub title: String,
    /// The question or description shown to the user.
    pub message: String,
    /// Choices offered to the user.
    pub options: Vec<String>,
    /// Arbitrary context shown alongside the request.
    pub context_data: Map<String, Value>,
    /// Current status.
    pub status: HitlStatus,
    /// The submitted response, once any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// How long to wait before applying `auto_action`, in seconds.
    pub timeout_seconds: u64,
    /// Action applied on timeout.
    pub auto_action: AutoAction,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the response arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

impl HitlRequest {
    /// The timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// A response submitted for a pending request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlResponse {
    /// The chosen action.
    pub action: HitlAction,
    /// Optional answer payload (clarifications).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Optional free-text message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// What a handler passes to the human gate seam.
#[derive(Debug, Clone)]
pub struct HitlGateSpec {
    /// Why the human is being asked.
    pub request_type: HitlRequestType,
    /// Short title.
    pub title: String,
    /// The question.
    pub message: String,
    /// Choices offered.
    pub options: Vec<String>,
    /// Context shown alongside.
    pub context_data: Map<String, Value>,
    /// How long to wait for a response.
    pub timeout: Duration,
    /// Action applied on timeout.
    pub auto_action: AutoAction,
}

/// What came back from the human gate (or its timeout path).
#[derive(Debug, Clone, PartialEq)]
pub struct HitlOutcome {
    /// The effective action.
    pub action: HitlAction,
    /// Optional answer payload.
    pub value: Option<Value>,
    /// Whether the outcome came from the timeout auto action.
    pub timed_out: bool,
}

impl HitlOutcome {
    /// Whether the outcome approves the gated action.
    #[must_use]
    pub fn approved(&self) -> bool {
        matches!(self.action, HitlAction::Approve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_action_maps_to_action() {
        assert_eq!(HitlAction::from(AutoAction::Approve), HitlAction::Approve);
        assert_eq!(HitlAction::from(AutoAction::Reject), HitlAction::Reject);
        assert_eq!(HitlAction::from(AutoAction::Skip), HitlAction::Skip);
    }

    #[test]
    fn default_auto_action_is_reject() {
        assert_eq!(AutoAction::default(), AutoAction::Reject);
    }

    #[test]
    fn status_wire_form() {
        assert_eq!(
            serde_json::to_string(&HitlStatus::Timeout).unwrap(),
            "\"timeout\""
        );
        assert_eq!(
            serde_json::to_string(&HitlRequestType::ErrorRecovery).unwrap(),
            "\"error_recovery\""
        );
    }

    #[test]
    fn outcome_approved() {
        let outcome = HitlOutcome {
            action: HitlAction::Approve,
            value: None,
            timed_out: false,
        };
        assert!(outcome.approved());
    }
}
