//! Full-stack lifecycle scenarios: orchestrator + engine + stores + events.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use skein_core::{ExecutionId, NodeItem, UserId};
use skein_credential::{CredentialManager, EncryptionKey};
use skein_eventbus::{Broadcaster, EventType};
use skein_execution::{
    ExecutionContext, ExecutionStatus, HitlAction, HitlResponse, HitlStatus, NodeExecutionResult,
    NodeRunStatus,
};
use skein_handlers::builtin::{
    ApprovalNode, HttpRequestNode, IfNode, LlmNode, LoopNode, ManualTriggerNode,
    ScheduleTriggerNode, SetNode, SplitInBatchesNode, SubworkflowNode, SwitchNode,
    WebhookTriggerNode,
};
use skein_handlers::{
    DataType, HandleSpec, HandlerRegistry, NodeCategory, NodeHandler, NodeMetadata,
    RegistryBuilder,
};
use skein_orchestrator::{Orchestrator, OrchestratorStores, StartRequest};
use skein_storage::{
    ExecutionStore, HitlStore, MemoryStore, WorkflowRecord, WorkflowStore,
};
use skein_workflow::{EdgeDefinition, NodeDefinition, WorkflowGraph, WorkflowSettings};

/// A node that sleeps far longer than any test budget.
struct SleepyNode;

#[async_trait]
impl NodeHandler for SleepyNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            node_type: "sleepy".to_owned(),
            display_name: "Sleepy".to_owned(),
            category: NodeCategory::Action,
            fields: Vec::new(),
            input_handles: vec![HandleSpec::new("input", "Input", DataType::Json)],
            output_handles: vec![HandleSpec::new("output", "Output", DataType::Any)],
            accepts: vec![DataType::Any],
        }
    }

    fn validate_config(&self, _config: &Value) -> Vec<String> {
        Vec::new()
    }

    async fn execute(
        &self,
        input: Vec<NodeItem>,
        _config: &Value,
        _ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        tokio::time::sleep(Duration::from_secs(5)).await;
        NodeExecutionResult::from_items(input)
    }
}

struct Stack {
    orchestrator: Arc<Orchestrator>,
    store: Arc<MemoryStore>,
    broadcaster: Arc<Broadcaster>,
}

fn stack() -> Stack {
    let registry = RegistryBuilder::new()
        .register(ManualTriggerNode)
        .register(WebhookTriggerNode)
        .register(ScheduleTriggerNode)
        .register(SetNode)
        .register(HttpRequestNode)
        .register(IfNode)
        .register(SwitchNode)
        .register(LoopNode)
        .register(SplitInBatchesNode)
        .register(SubworkflowNode)
        .register(ApprovalNode)
        .register(LlmNode)
        .register(SleepyNode)
        .build();
    stack_with(registry)
}

fn stack_with(registry: Arc<HandlerRegistry>) -> Stack {
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Arc::new(Broadcaster::new());
    let credentials = Arc::new(CredentialManager::new(
        store.clone(),
        store.clone(),
        EncryptionKey::derive("lifecycle tests"),
    ));
    let orchestrator = Orchestrator::new(
        registry,
        broadcaster.clone(),
        OrchestratorStores {
            workflows: store.clone(),
            executions: store.clone(),
            hitl: store.clone(),
            events: store.clone(),
        },
        credentials,
    );
    Stack {
        orchestrator,
        store,
        broadcaster,
    }
}

async fn stored_workflow(stack: &Stack, user: UserId, graph: WorkflowGraph) -> WorkflowRecord {
    let record = WorkflowRecord::new(user, format!("wf-{}", ExecutionId::v4()), graph);
    stack.store.create_workflow(record.clone()).await.unwrap();
    record
}

/// Poll the handle until it reaches a terminal state.
async fn wait_terminal(stack: &Stack, execution_id: ExecutionId, user: UserId) -> ExecutionStatus {
    for _ in 0..600 {
        if let Some(handle) = stack.orchestrator.get_status(execution_id, user) {
            if handle.state.is_terminal() {
                return handle.state;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution never reached a terminal state");
}

async fn wait_state(
    stack: &Stack,
    execution_id: ExecutionId,
    user: UserId,
    wanted: ExecutionStatus,
) {
    for _ in 0..600 {
        if let Some(handle) = stack.orchestrator.get_status(execution_id, user) {
            if handle.state == wanted {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution never reached {wanted}");
}

fn linear_graph() -> WorkflowGraph {
    WorkflowGraph {
        nodes: vec![
            NodeDefinition::new("A", "manual_trigger"),
            NodeDefinition::new("B", "set").with_config(json!({"values": {"x": 1}})),
            NodeDefinition::new("C", "set").with_config(json!({"values": {"y": 2}})),
        ],
        edges: vec![
            EdgeDefinition::new("A", "B"),
            EdgeDefinition::new("B", "C"),
        ],
        settings: WorkflowSettings::default(),
    }
}

#[tokio::test]
async fn completed_run_updates_everything() {
    let stack = stack();
    let user = UserId::v4();
    let workflow = stored_workflow(&stack, user, linear_graph()).await;

    let handle = stack
        .orchestrator
        .start(StartRequest::for_workflow(&workflow, user, json!({})))
        .await
        .unwrap();
    let _events = stack.broadcaster.subscribe(handle.execution_id);

    let status = wait_terminal(&stack, handle.execution_id, user).await;
    assert_eq!(status, ExecutionStatus::Completed);

    let record = stack
        .store
        .get_execution(handle.execution_id, user)
        .await
        .unwrap();
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert!(record.completed_at.is_some());
    assert_eq!(record.output_data[0]["json"], json!({"x": 1, "y": 2}));

    let refreshed = stack.store.get_workflow(workflow.id, user).await.unwrap();
    assert_eq!(refreshed.total_executions, 1);
    assert_eq!(refreshed.successful_executions, 1);

    // Event history is replayable with strictly increasing sequences.
    let history = stack
        .store
        .events_after(handle.execution_id, 0, 100)
        .await
        .unwrap();
    assert!(history.first().is_some_and(|e| e.event_type == EventType::WorkflowStart));
    assert!(history.last().is_some_and(|e| e.event_type == EventType::WorkflowComplete));
    assert!(history.windows(2).all(|w| w[0].sequence < w[1].sequence));
}

#[tokio::test]
async fn cancel_mid_run_leaves_cancelled_log() {
    let stack = stack();
    let user = UserId::v4();
    let graph = WorkflowGraph {
        nodes: vec![
            NodeDefinition::new("A", "manual_trigger"),
            NodeDefinition::new("B", "sleepy"),
            NodeDefinition::new("C", "set"),
        ],
        edges: vec![
            EdgeDefinition::new("A", "B"),
            EdgeDefinition::new("B", "C"),
        ],
        settings: WorkflowSettings::default(),
    };
    let workflow = stored_workflow(&stack, user, graph).await;

    let handle = stack
        .orchestrator
        .start(StartRequest::for_workflow(&workflow, user, json!({})))
        .await
        .unwrap();

    // Let the driver get into the sleepy node, then stop.
    tokio::time::sleep(Duration::from_millis(100)).await;
    stack.orchestrator.stop(handle.execution_id, user).unwrap();

    let status = wait_terminal(&stack, handle.execution_id, user).await;
    assert_eq!(status, ExecutionStatus::Cancelled);

    let record = stack
        .store
        .get_execution(handle.execution_id, user)
        .await
        .unwrap();
    assert_eq!(record.status, ExecutionStatus::Cancelled);

    // C never executed.
    let rows = stack
        .store
        .list_node_executions(handle.execution_id)
        .await
        .unwrap();
    let c_row = rows.iter().find(|r| r.node_id.as_str() == "C");
    assert!(c_row.is_none_or(|r| r.status == NodeRunStatus::Pending));
    // B did not complete successfully.
    let b_row = rows.iter().find(|r| r.node_id.as_str() == "B").unwrap();
    assert_eq!(b_row.status, NodeRunStatus::Failed);
}

#[tokio::test]
async fn pause_then_resume_executes_same_nodes_as_uninterrupted() {
    let user = UserId::v4();

    // Reference run, uninterrupted.
    let stack_a = stack();
    let workflow_a = stored_workflow(&stack_a, user, linear_graph()).await;
    let handle_a = stack_a
        .orchestrator
        .start(StartRequest::for_workflow(&workflow_a, user, json!({})))
        .await
        .unwrap();
    assert_eq!(
        wait_terminal(&stack_a, handle_a.execution_id, user).await,
        ExecutionStatus::Completed
    );

    // Interrupted run: pause while the sleepy head node runs, then resume.
    let stack_b = stack();
    let graph = WorkflowGraph {
        nodes: vec![
            NodeDefinition::new("A", "manual_trigger"),
            NodeDefinition::new("S", "sleepy").with_config(json!({"timeout": 600})),
            NodeDefinition::new("B", "set").with_config(json!({"values": {"x": 1}})),
            NodeDefinition::new("C", "set").with_config(json!({"values": {"y": 2}})),
        ],
        edges: vec![
            EdgeDefinition::new("A", "S"),
            EdgeDefinition::new("S", "B"),
            EdgeDefinition::new("B", "C"),
        ],
        settings: WorkflowSettings::default(),
    };
    let workflow_b = stored_workflow(&stack_b, user, graph).await;
    let handle_b = stack_b
        .orchestrator
        .start(StartRequest::for_workflow(&workflow_b, user, json!({})))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    stack_b.orchestrator.pause(handle_b.execution_id, user).unwrap();
    wait_state(&stack_b, handle_b.execution_id, user, ExecutionStatus::Paused).await;

    // Illegal while paused: pausing again.
    assert!(stack_b.orchestrator.pause(handle_b.execution_id, user).is_err());

    // Let the sleepy node finish so the driver is genuinely held at the
    // pause gate before resuming.
    for _ in 0..600 {
        let rows = stack_b
            .store
            .list_node_executions(handle_b.execution_id)
            .await
            .unwrap();
        if rows
            .iter()
            .any(|r| r.node_id.as_str() == "S" && r.status == NodeRunStatus::Completed)
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(
        stack_b
            .orchestrator
            .get_status(handle_b.execution_id, user)
            .unwrap()
            .state,
        ExecutionStatus::Paused
    );

    stack_b.orchestrator.resume(handle_b.execution_id, user).unwrap();
    assert_eq!(
        wait_terminal(&stack_b, handle_b.execution_id, user).await,
        ExecutionStatus::Completed
    );

    // The interrupted run executed exactly its plan: every node completed.
    let rows = stack_b
        .store
        .list_node_executions(handle_b.execution_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.status == NodeRunStatus::Completed));
}

#[tokio::test(start_paused = true)]
async fn hitl_timeout_applies_auto_action() {
    let stack = stack();
    let user = UserId::v4();
    let graph = WorkflowGraph {
        nodes: vec![
            NodeDefinition::new("A", "manual_trigger"),
            NodeDefinition::new("G", "approval").with_config(json!({
                "message": "approve?",
                "options": ["approve", "reject"],
                "timeout_seconds": 1,
                "auto_action": "reject"
            })),
            NodeDefinition::new("yes", "set").with_config(json!({"values": {"path": "approved"}})),
            NodeDefinition::new("no", "set").with_config(json!({"values": {"path": "rejected"}})),
        ],
        edges: vec![
            EdgeDefinition::new("A", "G"),
            EdgeDefinition::on_handle("G", "yes", "approved"),
            EdgeDefinition::on_handle("G", "no", "rejected"),
        ],
        settings: WorkflowSettings::default(),
    };
    let workflow = stored_workflow(&stack, user, graph).await;

    let handle = stack
        .orchestrator
        .start(StartRequest::for_workflow(&workflow, user, json!({})))
        .await
        .unwrap();

    let status = wait_terminal(&stack, handle.execution_id, user).await;
    assert_eq!(status, ExecutionStatus::Completed);

    // The request was persisted and timed out.
    let record = stack
        .store
        .get_execution(handle.execution_id, user)
        .await
        .unwrap();
    assert_eq!(record.output_data[0]["json"]["path"], json!("rejected"));

    let rows = stack
        .store
        .list_node_executions(handle.execution_id)
        .await
        .unwrap();
    let yes_row = rows.iter().find(|r| r.node_id.as_str() == "yes").unwrap();
    assert_eq!(yes_row.status, NodeRunStatus::Skipped);

    // No pending requests remain; the stored request shows the timeout.
    assert!(stack.store.list_pending(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn hitl_response_resolves_gate() {
    let stack = stack();
    let user = UserId::v4();
    let graph = WorkflowGraph {
        nodes: vec![
            NodeDefinition::new("A", "manual_trigger"),
            NodeDefinition::new("G", "approval").with_config(json!({
                "message": "approve?",
                "timeout_seconds": 45,
                "auto_action": "reject"
            })),
            NodeDefinition::new("yes", "set").with_config(json!({"values": {"path": "approved"}})),
            NodeDefinition::new("no", "set").with_config(json!({"values": {"path": "rejected"}})),
        ],
        edges: vec![
            EdgeDefinition::new("A", "G"),
            EdgeDefinition::on_handle("G", "yes", "approved"),
            EdgeDefinition::on_handle("G", "no", "rejected"),
        ],
        settings: WorkflowSettings::default(),
    };
    let workflow = stored_workflow(&stack, user, graph).await;

    let handle = stack
        .orchestrator
        .start(StartRequest::for_workflow(&workflow, user, json!({})))
        .await
        .unwrap();

    wait_state(&stack, handle.execution_id, user, ExecutionStatus::WaitingHuman).await;

    let pending = stack.orchestrator.list_pending_hitl(user).await.unwrap();
    assert_eq!(pending.len(), 1);
    let snapshot = stack
        .orchestrator
        .get_status(handle.execution_id, user)
        .unwrap();
    assert!(snapshot.pending_hitl.is_some());

    stack
        .orchestrator
        .respond_to_hitl(
            pending[0].id,
            user,
            HitlResponse {
                action: HitlAction::Approve,
                value: None,
                message: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(
        wait_terminal(&stack, handle.execution_id, user).await,
        ExecutionStatus::Completed
    );
    let record = stack
        .store
        .get_execution(handle.execution_id, user)
        .await
        .unwrap();
    assert_eq!(record.output_data[0]["json"]["path"], json!("approved"));

    let stored = stack.store.get_request(pending[0].id, user).await.unwrap();
    assert_eq!(stored.status, HitlStatus::Approved);
    assert!(stored.responded_at.is_some());
}

#[tokio::test]
async fn subworkflow_runs_child_and_returns_output() {
    let stack = stack();
    let user = UserId::v4();

    let child_graph = WorkflowGraph {
        nodes: vec![
            NodeDefinition::new("t", "manual_trigger"),
            NodeDefinition::new("s", "set").with_config(json!({"values": {"from_child": true}})),
        ],
        edges: vec![EdgeDefinition::new("t", "s")],
        settings: WorkflowSettings::default(),
    };
    let child = stored_workflow(&stack, user, child_graph).await;

    let parent_graph = WorkflowGraph {
        nodes: vec![
            NodeDefinition::new("A", "manual_trigger"),
            NodeDefinition::new("sub", "subworkflow")
                .with_config(json!({"workflow_id": child.id.to_string()})),
        ],
        edges: vec![EdgeDefinition::new("A", "sub")],
        settings: WorkflowSettings::default(),
    };
    let parent = stored_workflow(&stack, user, parent_graph).await;

    let handle = stack
        .orchestrator
        .start(StartRequest::for_workflow(&parent, user, json!({})))
        .await
        .unwrap();

    assert_eq!(
        wait_terminal(&stack, handle.execution_id, user).await,
        ExecutionStatus::Completed
    );

    let record = stack
        .store
        .get_execution(handle.execution_id, user)
        .await
        .unwrap();
    // The parent's final output carries the child's items through.
    assert_eq!(record.output_data[0]["json"]["from_child"], json!(true));

    // The child execution is linked to its parent.
    let executions = stack.store.list_executions(user, 10).await.unwrap();
    let child_run = executions
        .iter()
        .find(|e| e.parent_execution_id == Some(handle.execution_id))
        .unwrap();
    assert_eq!(child_run.nesting_depth, 1);
    assert_eq!(child_run.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn access_control_blocks_other_users() {
    let stack = stack();
    let owner = UserId::v4();
    let stranger = UserId::v4();
    let workflow = stored_workflow(&stack, owner, linear_graph()).await;

    let handle = stack
        .orchestrator
        .start(StartRequest::for_workflow(&workflow, owner, json!({})))
        .await
        .unwrap();

    assert!(stack.orchestrator.get_status(handle.execution_id, stranger).is_none());
    assert!(stack.orchestrator.stop(handle.execution_id, stranger).is_err());

    let _ = wait_terminal(&stack, handle.execution_id, owner).await;
}

#[tokio::test]
async fn compile_failure_yields_failed_handle() {
    let stack = stack();
    let user = UserId::v4();
    let graph = WorkflowGraph {
        nodes: vec![
            NodeDefinition::new("n1", "set"),
            NodeDefinition::new("n2", "set"),
        ],
        edges: vec![
            EdgeDefinition::new("n1", "n2"),
            EdgeDefinition::new("n2", "n1"),
        ],
        settings: WorkflowSettings::default(),
    };
    let workflow = stored_workflow(&stack, user, graph).await;

    let handle = stack
        .orchestrator
        .start(StartRequest::for_workflow(&workflow, user, json!({})))
        .await
        .unwrap();

    assert_eq!(handle.state, ExecutionStatus::Failed);
    assert!(handle.error.unwrap().contains("cycle"));

    let record = stack
        .store
        .get_execution(handle.execution_id, user)
        .await
        .unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
}
