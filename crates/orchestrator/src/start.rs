//! Start-request parameters.

use std::time::Duration;

use serde_json::Value;
use skein_core::{ExecutionId, UserId, WorkflowId};
use skein_execution::SupervisionLevel;
use skein_storage::{TriggerType, WorkflowRecord};
use skein_workflow::WorkflowGraph;

/// Everything needed to start one execution.
#[derive(Debug, Clone)]
pub struct StartRequest {
    /// The graph to run.
    pub graph: WorkflowGraph,
    /// The workflow it came from.
    pub workflow_id: WorkflowId,
    /// Display name, for events.
    pub workflow_name: String,
    /// The invoking user.
    pub user_id: UserId,
    /// Initial input payload.
    pub input: Value,
    /// How the run was started.
    pub trigger: TriggerType,
    /// Parent execution when this is a sub-workflow run.
    pub parent_execution_id: Option<ExecutionId>,
    /// Nesting depth (0 for root runs).
    pub nesting_depth: u32,
    /// Ancestor workflow ids, outermost first.
    pub workflow_chain: Vec<WorkflowId>,
    /// Wall-clock budget for the whole run.
    pub timeout_budget: Option<Duration>,
    /// Hook dispatch level.
    pub supervision: SupervisionLevel,
}

impl StartRequest {
    /// A root run of a stored workflow.
    #[must_use]
    pub fn for_workflow(workflow: &WorkflowRecord, user_id: UserId, input: Value) -> Self {
        Self {
            graph: workflow.graph.clone(),
            workflow_id: workflow.id,
            workflow_name: workflow.name.clone(),
            user_id,
            input,
            trigger: TriggerType::Manual,
            parent_execution_id: None,
            nesting_depth: 0,
            workflow_chain: Vec::new(),
            timeout_budget: None,
            supervision: SupervisionLevel::Full,
        }
    }

    /// Set the trigger type.
    #[must_use]
    pub fn with_trigger(mut self, trigger: TriggerType) -> Self {
        self.trigger = trigger;
        self
    }

    /// Set the overall budget.
    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.timeout_budget = Some(budget);
        self
    }

    /// Set the supervision level.
    #[must_use]
    pub fn with_supervision(mut self, level: SupervisionLevel) -> Self {
        self.supervision = level;
        self
    }
}
