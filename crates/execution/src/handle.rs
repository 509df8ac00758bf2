//! The in-memory record controlling one live run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skein_core::{ExecutionId, NodeId, UserId, WorkflowId};

use crate::hitl::HitlRequest;
use crate::status::ExecutionStatus;

/// Process-resident handle for a running (or finished) execution.
///
/// The orchestrator owns the authoritative copy; status endpoints serialize
/// snapshots of it (camelCase on the wire).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHandle {
    /// Execution identifier.
    pub execution_id: ExecutionId,
    /// Workflow being executed.
    pub workflow_id: WorkflowId,
    /// User who started the run.
    pub user_id: UserId,
    /// Current status.
    pub state: ExecutionStatus,
    /// The node currently executing, once any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node: Option<NodeId>,
    /// Rough completion percentage (0–100).
    pub progress: f32,
    /// When the run was started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Terminal error, if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Parent execution when this is a sub-workflow run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<ExecutionId>,
    /// Loop iterations seen per node (tracked on `loop` output handles).
    #[serde(default)]
    pub loop_counters: HashMap<NodeId, u64>,
    /// Pending HITL request, while the run is `WaitingHuman`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_hitl: Option<HitlRequest>,
}

impl ExecutionHandle {
    /// Create a fresh handle in the `Pending` state.
    #[must_use]
    pub fn new(execution_id: ExecutionId, workflow_id: WorkflowId, user_id: UserId) -> Self {
        Self {
            execution_id,
            workflow_id,
            user_id,
            state: ExecutionStatus::Pending,
            current_node: None,
            progress: 0.0,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            parent_execution_id: None,
            loop_counters: HashMap::new(),
            pending_hitl: None,
        }
    }

    /// Link this run to a parent execution.
    #[must_use]
    pub fn with_parent(mut self, parent: ExecutionId) -> Self {
        self.parent_execution_id = Some(parent);
        self
    }

    /// Bump and return the loop counter for a node.
    pub fn increment_loop(&mut self, node_id: &NodeId) -> u64 {
        let counter = self.loop_counters.entry(node_id.clone()).or_insert(0);
        *counter += 1;
        *counter
    }
}
