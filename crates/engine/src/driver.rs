//! The sequential node driver.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use skein_compiler::{ExecutionPlan, NodePlan};
use skein_core::{NodeId, NodeItem, items_to_value};
use skein_eventbus::Broadcaster;
use skein_execution::{
    Decision, ExecutionContext, ExecutionStatus, NodeExecutionResult, NodeRunStatus,
    SupervisionLevel, Supervisor,
};
use skein_expression::resolve_config;
use skein_handlers::HandlerRegistry;
use skein_storage::{EventStore, ExecutionStore, NodeExecutionRecord};
use skein_workflow::{EdgeDefinition, WorkflowGraph};
use tracing::{debug, error, info, instrument, warn};

use crate::outcome::ExecutionOutcome;
use crate::routing::{is_branching, recompute_skips};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Everything one run needs besides the context.
pub struct RunParams {
    /// The compiled plan.
    pub plan: ExecutionPlan,
    /// The source graph (labels and edges drive events and routing).
    pub graph: WorkflowGraph,
    /// The run's initial input payload.
    pub input: Value,
}

/// Drives executions. One `Driver` is shared across runs; each run owns its
/// own [`ExecutionContext`] and the driver keeps no per-run state.
pub struct Driver {
    registry: Arc<HandlerRegistry>,
    broadcaster: Arc<Broadcaster>,
    executions: Arc<dyn ExecutionStore>,
    events: Arc<dyn EventStore>,
    supervisor: Option<Arc<dyn Supervisor>>,
    supervision: SupervisionLevel,
}

impl Driver {
    /// Create a driver.
    #[must_use]
    pub fn new(
        registry: Arc<HandlerRegistry>,
        broadcaster: Arc<Broadcaster>,
        executions: Arc<dyn ExecutionStore>,
        events: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            executions,
            events,
            supervisor: None,
            supervision: SupervisionLevel::None,
        }
    }

    /// Attach a supervisor at the given supervision level.
    #[must_use]
    pub fn with_supervisor(
        mut self,
        supervisor: Arc<dyn Supervisor>,
        level: SupervisionLevel,
    ) -> Self {
        self.supervisor = Some(supervisor);
        self.supervision = level;
        self
    }

    /// Run the plan to a terminal outcome.
    #[instrument(skip_all, fields(execution_id = %ctx.execution_id))]
    pub async fn run(&self, params: RunParams, ctx: &ExecutionContext) -> ExecutionOutcome {
        let RunParams { plan, graph, input } = params;
        let initial_items = skein_core::items_from_value(input);
        let entry_points: HashSet<&NodeId> = plan.entry_points.iter().collect();

        let mut incoming: HashMap<&str, Vec<&EdgeDefinition>> = HashMap::new();
        let mut outgoing: HashMap<&str, Vec<&EdgeDefinition>> = HashMap::new();
        for edge in &graph.edges {
            incoming.entry(edge.target.as_str()).or_default().push(edge);
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
        }

        let mut skip_set: HashSet<NodeId> = HashSet::new();
        let mut last_output = Value::Null;

        info!(nodes = plan.len(), "driver starting");

        for (position, node_id) in plan.execution_order.iter().enumerate() {
            if ctx.cancellation.is_cancelled() {
                return ExecutionOutcome::cancelled("execution cancelled");
            }
            if ctx.budget_exhausted() {
                warn!(node_id = %node_id, "execution budget exhausted");
                return ExecutionOutcome::cancelled("timeout");
            }

            if skip_set.contains(node_id) {
                self.mark_skipped(ctx, node_id, position, &plan).await;
                continue;
            }
            let Some(node_plan) = plan.node(node_id.as_str()) else {
                continue;
            };

            // Input: concatenate each predecessor's stored output; entry
            // points additionally receive the run's initial input.
            let mut input_items: Vec<NodeItem> = Vec::new();
            if entry_points.contains(node_id) {
                input_items.extend(initial_items.iter().cloned());
            }
            for edge in incoming.get(node_id.as_str()).map_or(&[][..], Vec::as_slice) {
                if let Some(items) = ctx.node_output(edge.source.as_str()) {
                    input_items.extend(items);
                }
            }

            let warning_mark = ctx.warning_mark();
            ctx.begin_node(node_id, input_items.clone());
            let node_label = graph
                .node(node_id.as_str())
                .map_or("", |n| n.data.label.as_str());
            self.persist_event(self.broadcaster.node_started(
                ctx.execution_id,
                node_id,
                &node_plan.node_type,
                node_label,
            ))
            .await;
            self.open_node_record(ctx, node_id, node_plan, position, &input_items)
                .await;

            // Hook: before_node. The orchestrator blocks here while paused
            // and reports cancellation as Abort; an explicit Pause decision
            // (custom supervisors) suspends the whole run.
            if self.supervision.lifecycle_hooks() {
                if let Some(supervisor) = &self.supervisor {
                    match supervisor.before_node(ctx.execution_id, node_id, ctx).await {
                        Decision::Continue => {}
                        Decision::Pause => {
                            return ExecutionOutcome {
                                status: ExecutionStatus::Paused,
                                output: last_output,
                                error: None,
                                failed_node: None,
                                traceback: None,
                            };
                        }
                        Decision::Abort(reason) => {
                            self.close_node_record(
                                ctx,
                                node_id,
                                NodeRunStatus::Failed,
                                Value::Null,
                                Some(reason.clone()),
                                0,
                            )
                            .await;
                            return self.abort_outcome(node_id, reason);
                        }
                    }
                }
            }

            let started = std::time::Instant::now();
            let has_error_edge = outgoing
                .get(node_id.as_str())
                .is_some_and(|edges| edges.iter().any(|e| e.source_handle == "error"));
            let executed = self
                .execute_with_retry(ctx, node_id, node_plan, input_items, has_error_edge)
                .await;

            let (result, retries) = match executed {
                NodeRun::Completed(result, retries) => (result, retries),
                NodeRun::Paused => {
                    return ExecutionOutcome {
                        status: ExecutionStatus::Paused,
                        output: last_output,
                        error: None,
                        failed_node: None,
                        traceback: None,
                    };
                }
                NodeRun::Cancelled => {
                    self.close_node_record(
                        ctx,
                        node_id,
                        NodeRunStatus::Failed,
                        Value::Null,
                        Some("execution cancelled".into()),
                        0,
                    )
                    .await;
                    return ExecutionOutcome::cancelled("execution cancelled");
                }
                NodeRun::Fatal { error, traceback, retries } => {
                    self.close_node_record(
                        ctx,
                        node_id,
                        NodeRunStatus::Failed,
                        Value::Null,
                        Some(error.clone()),
                        retries,
                    )
                    .await;
                    self.persist_event(self.broadcaster.node_completed(
                        ctx.execution_id,
                        node_id,
                        "failed",
                        Value::Null,
                        Some(&error),
                        serde_json::to_value(ctx.warnings_since(warning_mark))
                            .unwrap_or(Value::Null),
                        started.elapsed().as_millis() as u64,
                    ))
                    .await;
                    return ExecutionOutcome::failed(Some(node_id.clone()), error, traceback);
                }
            };

            // A failed result that reached here is being routed through an
            // error handle (or tolerated via continue_on_error).
            let node_status = if result.success {
                NodeRunStatus::Completed
            } else {
                NodeRunStatus::Failed
            };
            let output_value = items_to_value(&result.items);
            ctx.set_node_output(node_id.clone(), result.items.clone(), &result.output_handle);
            if matches!(node_plan.node_type.as_str(), "loop" | "split_in_batches") {
                ctx.increment_loop(node_id);
            }
            if !output_value.is_null() && !result.items.is_empty() {
                last_output = output_value.clone();
            }

            if result.success && self.supervision.lifecycle_hooks() {
                if let Some(supervisor) = &self.supervisor {
                    if let Decision::Abort(reason) = supervisor
                        .after_node(ctx.execution_id, node_id, &result, ctx)
                        .await
                    {
                        self.close_node_record(
                            ctx,
                            node_id,
                            NodeRunStatus::Failed,
                            output_value.clone(),
                            Some(reason.clone()),
                            retries,
                        )
                        .await;
                        return self.abort_outcome(node_id, reason);
                    }
                }
            }

            self.close_node_record(
                ctx,
                node_id,
                node_status,
                output_value.clone(),
                result.error.clone(),
                retries,
            )
            .await;
            self.persist_event(self.broadcaster.node_completed(
                ctx.execution_id,
                node_id,
                &node_status.to_string(),
                output_value,
                result.error.as_deref(),
                serde_json::to_value(ctx.warnings_since(warning_mark)).unwrap_or(Value::Null),
                started.elapsed().as_millis() as u64,
            ))
            .await;

            // Branch routing.
            let node_edges = outgoing.get(node_id.as_str()).map_or(&[][..], Vec::as_slice);
            if is_branching(node_edges) {
                let newly_skipped = recompute_skips(
                    &plan.execution_order,
                    &plan.entry_points,
                    &graph.edges,
                    ctx,
                    &mut skip_set,
                );
                debug!(node_id = %node_id, taken = %result.output_handle,
                    skipped = newly_skipped.len(), "branch routed");
            }
        }

        info!("driver finished");
        ExecutionOutcome::completed(last_output)
    }

    /// Retry loop around one handler invocation.
    async fn execute_with_retry(
        &self,
        ctx: &ExecutionContext,
        node_id: &NodeId,
        node_plan: &NodePlan,
        input: Vec<NodeItem>,
        has_error_edge: bool,
    ) -> NodeRun {
        // Resolve expressions once per attempt set; warnings go to the ctx.
        let config = if node_plan.expression_paths.is_empty() {
            node_plan.config.clone()
        } else {
            let resolved = resolve_config(&node_plan.config, &node_plan.expression_paths, ctx);
            for warning in resolved.warnings {
                ctx.push_warning(warning.message);
            }
            resolved.value
        };

        let Some(handler) = self.registry.get(&node_plan.node_type) else {
            // Infrastructure error: not retryable.
            return NodeRun::Fatal {
                error: format!("no handler registered for node type '{}'", node_plan.node_type),
                traceback: None,
                retries: 0,
            };
        };

        let max_retries = node_plan
            .config
            .get("max_retries")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let retry_delay = node_plan
            .config
            .get("retry_delay")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_RETRY_DELAY, Duration::from_secs);

        let mut attempt: u32 = 0;
        loop {
            let run = tokio::select! {
                outcome = tokio::time::timeout(
                    node_plan.timeout(),
                    handler.execute(input.clone(), &config, ctx),
                ) => outcome,
                () = ctx.cancellation.cancelled() => return NodeRun::Cancelled,
            };

            let result = match run {
                Ok(result) => result,
                Err(_elapsed) => NodeExecutionResult::failure(format!(
                    "node '{node_id}' timed out after {}s",
                    node_plan.timeout_seconds
                )),
            };

            if result.success {
                return NodeRun::Completed(result, attempt);
            }

            let message = result
                .error
                .clone()
                .unwrap_or_else(|| "node failed".to_owned());
            error!(node_id = %node_id, attempt, "node failed: {message}");

            // Without an error hook the engine's own default is Continue,
            // which lets the config-declared retry policy apply; fatality
            // is decided below once retries are exhausted.
            let decision = match (&self.supervisor, self.supervision.error_hook()) {
                (Some(supervisor), true) => {
                    supervisor
                        .on_error(ctx.execution_id, node_id, &message, ctx)
                        .await
                }
                _ => Decision::Continue,
            };

            match decision {
                Decision::Continue if attempt < max_retries => {
                    attempt += 1;
                    warn!(node_id = %node_id, attempt, max_retries, "retrying after {retry_delay:?}");
                    tokio::select! {
                        () = tokio::time::sleep(retry_delay) => {}
                        () = ctx.cancellation.cancelled() => return NodeRun::Cancelled,
                    }
                    continue;
                }
                Decision::Pause => {
                    return NodeRun::Paused;
                }
                Decision::Continue | Decision::Abort(_) => {}
            }

            // Retries exhausted (or declined). An `error`-handle edge
            // downstream turns the failure into normal conditional routing;
            // `continue_on_error` tolerates it in place; anything else is
            // fatal.
            let continue_on_error = node_plan
                .config
                .get("continue_on_error")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if has_error_edge || continue_on_error {
                return NodeRun::Completed(result, attempt);
            }
            let reason = match decision {
                Decision::Abort(reason) => reason,
                _ => message,
            };
            return NodeRun::Fatal {
                error: reason,
                traceback: result.error,
                retries: attempt,
            };
        }
    }

    async fn mark_skipped(
        &self,
        ctx: &ExecutionContext,
        node_id: &NodeId,
        position: usize,
        plan: &ExecutionPlan,
    ) {
        let node_type = plan
            .node(node_id.as_str())
            .map_or(String::new(), |n| n.node_type.clone());
        self.persist_event(self.broadcaster.node_skipped(
            ctx.execution_id,
            node_id,
            "branch not taken",
        ))
        .await;
        let record = NodeExecutionRecord {
            execution_id: ctx.execution_id,
            node_id: node_id.clone(),
            node_type,
            execution_order: position,
            status: NodeRunStatus::Skipped,
            input: Value::Null,
            output: Value::Null,
            error: None,
            retry_count: 0,
            started_at: None,
            completed_at: Some(Utc::now()),
            duration_ms: None,
        };
        if let Err(err) = self.executions.upsert_node_execution(record).await {
            warn!(node_id = %node_id, "node record write failed: {err}");
        }
    }

    async fn open_node_record(
        &self,
        ctx: &ExecutionContext,
        node_id: &NodeId,
        node_plan: &NodePlan,
        position: usize,
        input: &[NodeItem],
    ) {
        let record = NodeExecutionRecord {
            execution_id: ctx.execution_id,
            node_id: node_id.clone(),
            node_type: node_plan.node_type.clone(),
            execution_order: position,
            status: NodeRunStatus::Running,
            input: items_to_value(input),
            output: Value::Null,
            error: None,
            retry_count: 0,
            started_at: Some(Utc::now()),
            completed_at: None,
            duration_ms: None,
        };
        if let Err(err) = self.executions.upsert_node_execution(record).await {
            warn!(node_id = %node_id, "node record write failed: {err}");
        }
    }

    async fn close_node_record(
        &self,
        ctx: &ExecutionContext,
        node_id: &NodeId,
        status: NodeRunStatus,
        output: Value,
        error: Option<String>,
        retries: u32,
    ) {
        if let Err(err) = self
            .executions
            .complete_node_execution(
                ctx.execution_id,
                node_id,
                status,
                output,
                error,
                retries,
                Utc::now(),
            )
            .await
        {
            warn!(node_id = %node_id, "node record update failed: {err}");
        }
    }

    async fn persist_event(&self, event: skein_eventbus::StreamEvent) {
        if let Err(err) = self.events.append_event(event).await {
            warn!("event persistence failed: {err}");
        }
    }

    fn abort_outcome(&self, node_id: &NodeId, reason: String) -> ExecutionOutcome {
        if reason.contains("cancelled") {
            ExecutionOutcome::cancelled(reason)
        } else {
            ExecutionOutcome::failed(Some(node_id.clone()), reason, None)
        }
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("supervision", &self.supervision)
            .finish_non_exhaustive()
    }
}

enum NodeRun {
    Completed(NodeExecutionResult, u32),
    Cancelled,
    Paused,
    Fatal {
        error: String,
        traceback: Option<String>,
        retries: u32,
    },
}
