//! The orchestrator proper: execution map, control channels, lifecycle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use skein_compiler::Compiler;
use skein_core::{ExecutionId, RequestId, UserId};
use skein_credential::CredentialManager;
use skein_engine::{Driver, ExecutionOutcome, RunParams};
use skein_eventbus::Broadcaster;
use skein_execution::{
    ContextConfig, ExecutionContext, ExecutionError, ExecutionHandle, ExecutionStatus,
    HitlAction, HitlRequest, HitlResponse, HitlStatus, SupervisionLevel,
    execution_transition_allowed,
};
use skein_handlers::HandlerRegistry;
use skein_storage::{
    EventStore, ExecutionRecord, ExecutionStore, HitlStore, WorkflowStore,
};
use skein_workflow::WorkflowGraph;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::control::ControlState;
use crate::start::StartRequest;

/// Supervises all live executions in the process.
pub struct Orchestrator {
    pub(crate) registry: Arc<HandlerRegistry>,
    pub(crate) broadcaster: Arc<Broadcaster>,
    pub(crate) workflows: Arc<dyn WorkflowStore>,
    pub(crate) executions: Arc<dyn ExecutionStore>,
    pub(crate) hitl: Arc<dyn HitlStore>,
    pub(crate) events: Arc<dyn EventStore>,
    pub(crate) credentials: Arc<CredentialManager>,
    pub(crate) handles: Mutex<HashMap<ExecutionId, ExecutionHandle>>,
    pub(crate) controls: Mutex<HashMap<ExecutionId, Arc<ControlState>>>,
    pub(crate) responders: Mutex<HashMap<RequestId, oneshot::Sender<HitlResponse>>>,
}

/// The stores the orchestrator needs, bundled for construction.
pub struct OrchestratorStores {
    /// Workflow records and versions.
    pub workflows: Arc<dyn WorkflowStore>,
    /// Execution and node-execution logs.
    pub executions: Arc<dyn ExecutionStore>,
    /// HITL requests.
    pub hitl: Arc<dyn HitlStore>,
    /// Stream-event history.
    pub events: Arc<dyn EventStore>,
}

impl Orchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        registry: Arc<HandlerRegistry>,
        broadcaster: Arc<Broadcaster>,
        stores: OrchestratorStores,
        credentials: Arc<CredentialManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            broadcaster,
            workflows: stores.workflows,
            executions: stores.executions,
            hitl: stores.hitl,
            events: stores.events,
            credentials,
            handles: Mutex::new(HashMap::new()),
            controls: Mutex::new(HashMap::new()),
            responders: Mutex::new(HashMap::new()),
        })
    }

    /// Start a new execution: compile, persist the log, spawn the driver,
    /// return the handle immediately.
    pub async fn start(
        self: &Arc<Self>,
        request: StartRequest,
    ) -> Result<ExecutionHandle, ExecutionError> {
        let execution_id = ExecutionId::v4();
        let mut record = ExecutionRecord::new(
            execution_id,
            request.workflow_id,
            request.user_id,
            request.trigger,
            request.input.clone(),
        );
        record.parent_execution_id = request.parent_execution_id;
        record.nesting_depth = request.nesting_depth;
        record.timeout_budget_ms = request
            .timeout_budget
            .map(|budget| budget.as_millis() as u64);

        let mut handle =
            ExecutionHandle::new(execution_id, request.workflow_id, request.user_id);
        handle.parent_execution_id = request.parent_execution_id;

        // Compile before anything is spawned. A compile failure still
        // leaves a (failed) execution log behind.
        let owned_credentials = self
            .credentials
            .credential_ids(request.user_id)
            .await
            .unwrap_or_default();
        let compiled = Compiler::new(
            request.graph.clone(),
            owned_credentials,
            self.registry.clone(),
        )
        .compile();

        if !compiled.success {
            let reason = compiled
                .errors
                .iter()
                .map(|issue| issue.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            record.status = ExecutionStatus::Failed;
            record.error_message = Some(reason.clone());
            self.executions
                .create_execution(record)
                .await
                .map_err(|err| ExecutionError::Credential(err.to_string()))?;
            handle.state = ExecutionStatus::Failed;
            handle.error = Some(reason);
            handle.completed_at = Some(Utc::now());
            self.handles.lock().insert(execution_id, handle.clone());
            return Ok(handle);
        }
        let plan = Arc::new(
            compiled
                .execution_plan
                .ok_or_else(|| ExecutionError::Credential("plan missing".into()))?,
        );

        self.executions
            .create_execution(record)
            .await
            .map_err(|err| ExecutionError::Credential(err.to_string()))?;

        let control = Arc::new(ControlState::new(plan.clone()));
        self.controls.lock().insert(execution_id, control.clone());
        self.handles.lock().insert(execution_id, handle.clone());

        // Build the context with seams and credentials.
        let ctx = ExecutionContext::new(ContextConfig {
            execution_id,
            user_id: request.user_id,
            workflow_id: request.workflow_id,
            nesting_depth: request.nesting_depth,
            max_nesting_depth: request
                .graph
                .settings
                .max_nesting_depth
                .unwrap_or(skein_core::DEFAULT_MAX_NESTING_DEPTH),
            workflow_chain: request.workflow_chain.clone(),
            parent_execution_id: request.parent_execution_id,
            timeout_budget: request.timeout_budget,
        })
        .with_labels(request.graph.label_to_id())
        .with_cancellation(control.cancel.clone())
        // The runner seam is implemented on `Orchestrator` (it spawns
        // child runs via the shared `Arc`).
        .with_seams(self.clone(), self.clone());

        let referenced = referenced_credentials(&request.graph);
        if !referenced.is_empty() {
            ctx.set_credentials(
                self.credentials
                    .load_many(request.user_id, &referenced)
                    .await,
            );
        }

        let orchestrator = self.clone();
        let workflow_name = request.workflow_name.clone();
        let graph = request.graph;
        let input = request.input;
        let supervision = request.supervision;
        let plan_for_run = (*plan).clone();

        tokio::spawn(async move {
            orchestrator
                .run_driver(
                    execution_id,
                    workflow_name,
                    plan_for_run,
                    graph,
                    input,
                    supervision,
                    ctx,
                )
                .await;
        });

        info!(execution_id = %execution_id, workflow_id = %request.workflow_id, "execution dispatched");
        Ok(handle)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_driver(
        self: Arc<Self>,
        execution_id: ExecutionId,
        workflow_name: String,
        plan: skein_compiler::ExecutionPlan,
        graph: WorkflowGraph,
        input: Value,
        supervision: SupervisionLevel,
        ctx: ExecutionContext,
    ) {
        self.update_handle(execution_id, |handle| {
            handle.state = ExecutionStatus::Running;
        });
        if let Err(err) = self.executions.mark_started(execution_id).await {
            warn!(execution_id = %execution_id, "mark started failed: {err}");
        }
        self.persist_event(
            self.broadcaster
                .workflow_started(execution_id, ctx.workflow_id, &workflow_name),
        )
        .await;

        let driver = Driver::new(
            self.registry.clone(),
            self.broadcaster.clone(),
            self.executions.clone(),
            self.events.clone(),
        )
        .with_supervisor(self.clone(), supervision);

        let started = std::time::Instant::now();
        let outcome = driver.run(RunParams { plan, graph, input }, &ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.finish(execution_id, outcome, duration_ms, &ctx).await;
    }

    async fn finish(
        &self,
        execution_id: ExecutionId,
        outcome: ExecutionOutcome,
        duration_ms: u64,
        ctx: &ExecutionContext,
    ) {
        let workflow_id = ctx.workflow_id;
        let status = outcome.status;

        self.update_handle(execution_id, |handle| {
            handle.state = status;
            handle.error = outcome.error.clone();
            if status.is_terminal() {
                handle.completed_at = Some(Utc::now());
            }
            if status == ExecutionStatus::Completed {
                handle.progress = 100.0;
            }
            handle.pending_hitl = None;
        });

        if let Err(err) = self
            .executions
            .update_status(
                execution_id,
                status,
                Some(outcome.output.clone()),
                outcome.error.clone(),
                outcome.failed_node.clone(),
                outcome.traceback.clone(),
            )
            .await
        {
            error!(execution_id = %execution_id, "final status write failed: {err}");
        }

        match status {
            ExecutionStatus::Completed => {
                self.persist_event(self.broadcaster.workflow_completed(
                    execution_id,
                    outcome.output,
                    duration_ms,
                ))
                .await;
            }
            ExecutionStatus::Failed | ExecutionStatus::Cancelled => {
                self.persist_event(self.broadcaster.workflow_errored(
                    execution_id,
                    outcome.error.as_deref().unwrap_or("execution ended"),
                    outcome.failed_node.as_ref(),
                ))
                .await;
            }
            _ => {} // paused by a custom supervisor: not terminal
        }

        if status.is_terminal() {
            if let Err(err) = self
                .workflows
                .record_run(workflow_id, status == ExecutionStatus::Completed, duration_ms)
                .await
            {
                warn!(workflow_id = %workflow_id, "run counters failed: {err}");
            }
            let control = self.controls.lock().remove(&execution_id);
            if let Some(control) = control {
                control.complete(status);
            }
            // Terminal events are already queued on every subscriber;
            // dropping the channel ends their streams cleanly.
            self.broadcaster.remove_execution(execution_id);
        }
        info!(execution_id = %execution_id, %status, "execution finished");
    }

    /// Pause a running execution (legal only from `Running`).
    pub fn pause(&self, execution_id: ExecutionId, user: UserId) -> Result<(), ExecutionError> {
        self.authorized(execution_id, user)?;
        let mut handles = self.handles.lock();
        let handle = handles.get_mut(&execution_id).ok_or(ExecutionError::NotFound)?;
        if !execution_transition_allowed(handle.state, ExecutionStatus::Paused) {
            return Err(ExecutionError::InvalidTransition {
                from: handle.state.to_string(),
                to: ExecutionStatus::Paused.to_string(),
            });
        }
        handle.state = ExecutionStatus::Paused;
        drop(handles);

        if let Some(control) = self.control_of(execution_id) {
            control.set_paused(true);
        }
        info!(execution_id = %execution_id, "pause requested");
        Ok(())
    }

    /// Resume a paused execution.
    pub fn resume(&self, execution_id: ExecutionId, user: UserId) -> Result<(), ExecutionError> {
        self.authorized(execution_id, user)?;
        let mut handles = self.handles.lock();
        let handle = handles.get_mut(&execution_id).ok_or(ExecutionError::NotFound)?;
        if handle.state != ExecutionStatus::Paused {
            return Err(ExecutionError::InvalidTransition {
                from: handle.state.to_string(),
                to: ExecutionStatus::Running.to_string(),
            });
        }
        handle.state = ExecutionStatus::Running;
        drop(handles);

        if let Some(control) = self.control_of(execution_id) {
            control.set_paused(false);
        }
        info!(execution_id = %execution_id, "resumed");
        Ok(())
    }

    /// Cancel an execution. The driver notices at its next suspension
    /// point and persists the final `cancelled` record itself.
    pub fn stop(&self, execution_id: ExecutionId, user: UserId) -> Result<(), ExecutionError> {
        self.authorized(execution_id, user)?;
        let mut handles = self.handles.lock();
        let handle = handles.get_mut(&execution_id).ok_or(ExecutionError::NotFound)?;
        if handle.state.is_terminal() {
            return Err(ExecutionError::InvalidTransition {
                from: handle.state.to_string(),
                to: ExecutionStatus::Cancelled.to_string(),
            });
        }
        handle.state = ExecutionStatus::Cancelled;
        let pending = handle.pending_hitl.take();
        drop(handles);

        if let Some(control) = self.control_of(execution_id) {
            control.cancel.cancel();
            // Release the pause gate so the driver can observe the cancel.
            control.set_paused(false);
        }
        if let Some(request) = pending {
            self.responders.lock().remove(&request.id);
        }
        info!(execution_id = %execution_id, "stop requested");
        Ok(())
    }

    /// Snapshot of an execution's handle, owner-filtered.
    #[must_use]
    pub fn get_status(&self, execution_id: ExecutionId, user: UserId) -> Option<ExecutionHandle> {
        self.handles
            .lock()
            .get(&execution_id)
            .filter(|handle| handle.user_id == user)
            .cloned()
    }

    /// Deliver a response to a pending HITL request.
    pub async fn respond_to_hitl(
        &self,
        request_id: RequestId,
        user: UserId,
        response: HitlResponse,
    ) -> Result<(), ExecutionError> {
        let request = self
            .hitl
            .get_request(request_id, user)
            .await
            .map_err(|_| ExecutionError::NotFound)?;
        if request.status != HitlStatus::Pending {
            return Err(ExecutionError::InvalidTransition {
                from: format!("{:?}", request.status).to_lowercase(),
                to: "responded".to_owned(),
            });
        }
        let sender = self.responders.lock().remove(&request_id);
        match sender {
            Some(sender) => sender
                .send(response)
                .map_err(|_| ExecutionError::NotFound),
            None => Err(ExecutionError::NotFound),
        }
    }

    /// Pending HITL requests for a user.
    pub async fn list_pending_hitl(
        &self,
        user: UserId,
    ) -> Result<Vec<HitlRequest>, ExecutionError> {
        self.hitl
            .list_pending(user)
            .await
            .map_err(|err| ExecutionError::Credential(err.to_string()))
    }

    // ── internals shared with the hook/gate/subworkflow modules ──────────

    pub(crate) fn control_of(&self, execution_id: ExecutionId) -> Option<Arc<ControlState>> {
        self.controls.lock().get(&execution_id).cloned()
    }

    pub(crate) fn update_handle(
        &self,
        execution_id: ExecutionId,
        update: impl FnOnce(&mut ExecutionHandle),
    ) {
        if let Some(handle) = self.handles.lock().get_mut(&execution_id) {
            update(handle);
        }
    }

    pub(crate) fn handle_snapshot(&self, execution_id: ExecutionId) -> Option<ExecutionHandle> {
        self.handles.lock().get(&execution_id).cloned()
    }

    pub(crate) async fn persist_event(&self, event: skein_eventbus::StreamEvent) {
        if let Err(err) = self.events.append_event(event).await {
            warn!("event persistence failed: {err}");
        }
    }

    pub(crate) async fn persist_status(&self, execution_id: ExecutionId, status: ExecutionStatus) {
        if let Err(err) = self
            .executions
            .update_status(execution_id, status, None, None, None, None)
            .await
        {
            warn!(execution_id = %execution_id, "status write failed: {err}");
        }
    }

    fn authorized(&self, execution_id: ExecutionId, user: UserId) -> Result<(), ExecutionError> {
        let handles = self.handles.lock();
        let handle = handles.get(&execution_id).ok_or(ExecutionError::NotFound)?;
        if handle.user_id == user {
            Ok(())
        } else {
            Err(ExecutionError::AccessDenied)
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("live_executions", &self.controls.lock().len())
            .finish_non_exhaustive()
    }
}

/// Map the `HitlAction` of a response onto the stored request status.
#[must_use]
pub(crate) fn status_for_action(action: HitlAction) -> HitlStatus {
    match action {
        HitlAction::Approve => HitlStatus::Approved,
        HitlAction::Reject => HitlStatus::Rejected,
        HitlAction::Answer | HitlAction::Skip | HitlAction::Retry => HitlStatus::Answered,
    }
}

/// Credential ids referenced anywhere in a graph's node configs.
fn referenced_credentials(graph: &WorkflowGraph) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for node in &graph.nodes {
        if let Some(credential) = node.data.config.get("credential").and_then(Value::as_str) {
            if !credential.is_empty() && seen.insert(credential.to_owned()) {
                ids.push(credential.to_owned());
            }
        }
    }
    ids
}

