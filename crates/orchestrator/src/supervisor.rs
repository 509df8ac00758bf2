//! The engine-facing hook implementation.

use async_trait::async_trait;
use serde_json::Value;
use skein_core::{ExecutionId, NodeId, SYSTEM_MAX_LOOPS};
use skein_execution::{
    Decision, ExecutionContext, ExecutionStatus, NodeExecutionResult, Supervisor,
};
use tracing::{error, info};

use crate::orchestrator::Orchestrator;

#[async_trait]
impl Supervisor for Orchestrator {
    /// Cancel check, pause gate, progress reporting.
    ///
    /// The gate blocks *inside* the hook: a paused execution's driver task
    /// sits here until `resume` flips the watch (or `stop` cancels), so the
    /// engine itself never needs a paused state.
    async fn before_node(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
        ctx: &ExecutionContext,
    ) -> Decision {
        let Some(control) = self.control_of(execution_id) else {
            return Decision::Abort("execution handle not found".into());
        };
        if control.cancel.is_cancelled() {
            return Decision::Abort("execution cancelled".into());
        }

        if control.is_paused() {
            info!(execution_id = %execution_id, node_id = %node_id, "paused at gate");
            self.persist_status(execution_id, ExecutionStatus::Paused).await;

            let mut gate = control.pause_watch();
            loop {
                tokio::select! {
                    changed = gate.changed() => {
                        if changed.is_err() || !*gate.borrow() {
                            break;
                        }
                    }
                    () = control.cancel.cancelled() => {
                        return Decision::Abort("execution cancelled during pause".into());
                    }
                }
            }
            if control.cancel.is_cancelled() {
                return Decision::Abort("execution cancelled during pause".into());
            }
            self.update_handle(execution_id, |handle| {
                handle.state = ExecutionStatus::Running;
            });
            self.persist_status(execution_id, ExecutionStatus::Running).await;
            info!(execution_id = %execution_id, "resumed from gate");
        }

        // Progress bookkeeping.
        let total = control.plan.len();
        let current = ctx.executed_nodes().len();
        let percentage = if total > 0 {
            (current as f32 / total as f32) * 100.0
        } else {
            0.0
        };
        self.update_handle(execution_id, |handle| {
            handle.current_node = Some(node_id.clone());
            handle.progress = percentage;
        });
        self.persist_event(self.broadcaster.progress(
            execution_id,
            current,
            total,
            node_id.as_str(),
        ))
        .await;

        Decision::Continue
    }

    /// Loop-cap enforcement on `loop` output handles.
    async fn after_node(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
        result: &NodeExecutionResult,
        _ctx: &ExecutionContext,
    ) -> Decision {
        if result.output_handle != "loop" {
            return Decision::Continue;
        }

        let mut count = 0;
        self.update_handle(execution_id, |handle| {
            count = handle.increment_loop(node_id);
        });

        if count > SYSTEM_MAX_LOOPS {
            return Decision::Abort(format!(
                "system safety limit of {SYSTEM_MAX_LOOPS} loop iterations exceeded for node '{node_id}'"
            ));
        }
        let configured_cap = self.control_of(execution_id).and_then(|control| {
            control
                .plan
                .node(node_id.as_str())
                .and_then(|node| node.config.get("max_loop_count"))
                .and_then(Value::as_u64)
        });
        if let Some(cap) = configured_cap {
            if count > cap {
                return Decision::Abort(format!(
                    "loop limit of {cap} exceeded for node '{node_id}'"
                ));
            }
        }
        Decision::Continue
    }

    /// Error policy: tolerate when the node opts in, otherwise abort. A
    /// `Continue` here makes the failure retry-eligible; the engine applies
    /// the config's `max_retries`.
    async fn on_error(
        &self,
        execution_id: ExecutionId,
        node_id: &NodeId,
        error: &str,
        _ctx: &ExecutionContext,
    ) -> Decision {
        error!(execution_id = %execution_id, node_id = %node_id, "node error: {error}");

        let config_allows = self.control_of(execution_id).is_some_and(|control| {
            control.plan.node(node_id.as_str()).is_some_and(|node| {
                let continue_on_error = node
                    .config
                    .get("continue_on_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let retries = node
                    .config
                    .get("max_retries")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                continue_on_error || retries > 0
            })
        });

        if config_allows {
            Decision::Continue
        } else {
            Decision::Abort(format!("node '{node_id}' failed: {error}"))
        }
    }
}
