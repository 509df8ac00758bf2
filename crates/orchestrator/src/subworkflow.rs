//! Sub-workflow execution: child runs with chain, depth and budget checks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use skein_core::{NodeItem, WorkflowId, items_to_value};
use skein_execution::{
    ExecutionContext, ExecutionStatus, NodeExecutionResult, SubworkflowRunner, SupervisionLevel,
};
use skein_storage::TriggerType;
use tracing::info;

use crate::orchestrator::Orchestrator;
use crate::start::StartRequest;

/// Hard ceiling on a sub-workflow's budget.
const SUBWORKFLOW_BUDGET_CAP: Duration = Duration::from_secs(300);

/// Thin wrapper so the runner seam can be implemented on an owned `Arc`
/// without violating the orphan rule (`Arc` and [`SubworkflowRunner`] are
/// both foreign to this crate; this newtype is local).
pub struct OrchestratorRunner(pub(crate) Arc<Orchestrator>);

#[async_trait]
impl SubworkflowRunner for OrchestratorRunner {
    async fn run_subworkflow(
        &self,
        ctx: &ExecutionContext,
        config: &Value,
        input: Vec<NodeItem>,
    ) -> NodeExecutionResult {
        let self_ = &self.0;
        let Some(raw_id) = config.get("workflow_id").and_then(Value::as_str) else {
            return NodeExecutionResult::failure("no workflow selected");
        };
        let Ok(workflow_id) = WorkflowId::parse(raw_id) else {
            return NodeExecutionResult::failure(format!("invalid workflow id: {raw_id}"));
        };

        // Guard rails before anything is spawned.
        if ctx.nesting_depth >= ctx.max_nesting_depth {
            return NodeExecutionResult::failure(format!(
                "max nesting depth ({}) exceeded",
                ctx.max_nesting_depth
            ));
        }
        if workflow_id == ctx.workflow_id || ctx.workflow_chain.contains(&workflow_id) {
            return NodeExecutionResult::failure(format!(
                "circular dependency: workflow {workflow_id} is already executing"
            ));
        }

        let workflow = match self_.workflows.get_workflow(workflow_id, ctx.user_id).await {
            Ok(workflow) => workflow,
            Err(_) => {
                return NodeExecutionResult::failure(format!(
                    "workflow {workflow_id} not found"
                ));
            }
        };

        // Budget: bounded by the parent's remaining time, the node's own
        // configuration, and the system cap.
        let parent_remaining = ctx.remaining_budget().unwrap_or(SUBWORKFLOW_BUDGET_CAP);
        let configured = config
            .get("timeout_budget_ms")
            .and_then(Value::as_u64)
            .map_or(SUBWORKFLOW_BUDGET_CAP, Duration::from_millis);
        let budget = parent_remaining.min(configured).min(SUBWORKFLOW_BUDGET_CAP);

        let mut chain = ctx.workflow_chain.clone();
        chain.push(ctx.workflow_id);

        let request = StartRequest {
            graph: workflow.graph.clone(),
            workflow_id,
            workflow_name: workflow.name.clone(),
            user_id: ctx.user_id,
            input: items_to_value(&input),
            trigger: TriggerType::Orchestrator,
            parent_execution_id: Some(ctx.execution_id),
            nesting_depth: ctx.nesting_depth + 1,
            workflow_chain: chain,
            timeout_budget: Some(budget),
            supervision: SupervisionLevel::Full,
        };

        let child = match self_.start(request).await {
            Ok(handle) => handle,
            Err(err) => {
                return NodeExecutionResult::failure(format!("sub-workflow start failed: {err}"));
            }
        };
        info!(parent = %ctx.execution_id, child = %child.execution_id, "sub-workflow dispatched");

        let wait_for_completion = config
            .get("wait_for_completion")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if !wait_for_completion {
            return NodeExecutionResult::success(json!({
                "execution_id": child.execution_id,
                "status": "started_async",
            }))
            .on_handle("success");
        }

        // The control channel is gone either when compilation failed (the
        // handle is already terminal) or when a fast child finished before
        // we got here; the handle snapshot disambiguates.
        let final_status = match self_.control_of(child.execution_id) {
            Some(control) => {
                let mut completion = control.completion_watch();
                let waited = tokio::time::timeout(budget, async {
                    loop {
                        let status = *completion.borrow();
                        if status.is_terminal() {
                            return status;
                        }
                        if completion.changed().await.is_err() {
                            return *completion.borrow();
                        }
                    }
                })
                .await;
                match waited {
                    Ok(status) => status,
                    Err(_elapsed) => {
                        let _ = self_.stop(child.execution_id, ctx.user_id);
                        return NodeExecutionResult::failure("sub-workflow execution timed out");
                    }
                }
            }
            None => match self_.handle_snapshot(child.execution_id) {
                Some(handle) => handle.state,
                None => return NodeExecutionResult::failure("sub-workflow failed to start"),
            },
        };

        match final_status {
            ExecutionStatus::Completed => {
                let output = self_
                    .executions
                    .get_execution(child.execution_id, ctx.user_id)
                    .await
                    .map(|record| record.output_data)
                    .unwrap_or(Value::Null);
                NodeExecutionResult::success(output).on_handle("success")
            }
            ExecutionStatus::Failed => {
                let reason = self_
                    .handle_snapshot(child.execution_id)
                    .and_then(|handle| handle.error)
                    .unwrap_or_else(|| "sub-workflow failed".to_owned());
                NodeExecutionResult::failure(reason)
            }
            other => NodeExecutionResult::failure(format!(
                "sub-workflow ended with status {other}"
            )),
        }
    }
}
