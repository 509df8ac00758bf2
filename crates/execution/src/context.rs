//! Runtime execution context (non-serializable).
//!
//! One context exists per execution, owned by the driver task. Handlers it
//! invokes see `&ExecutionContext`; the fields they may write (outputs,
//! variables, warnings) sit behind short `parking_lot` locks. There is no
//! shared-writer concurrency — the driver runs nodes sequentially — the
//! locks only make the sharing pattern safe to express.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::{Map, Value};
use skein_core::{
    DEFAULT_MAX_NESTING_DEPTH, ExecutionId, NodeId, NodeItem, UserId, WorkflowId, items_to_value,
};
use skein_expression::ExpressionScope;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutionError;
use crate::seams::{HumanGate, SubworkflowRunner};

/// A non-fatal problem recorded during execution (missing expression paths,
/// dropped events, …). Surfaced in `node_complete` events and the final log.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionWarning {
    /// Node the warning is attributed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Human-readable description.
    pub message: String,
}

/// Construction parameters for an [`ExecutionContext`].
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Execution identifier.
    pub execution_id: ExecutionId,
    /// User running the workflow.
    pub user_id: UserId,
    /// Workflow being executed.
    pub workflow_id: WorkflowId,
    /// Sub-workflow nesting depth of this run (0 for a root run).
    pub nesting_depth: u32,
    /// Maximum allowed nesting depth.
    pub max_nesting_depth: u32,
    /// Ancestor workflow ids, outermost first.
    pub workflow_chain: Vec<WorkflowId>,
    /// Parent execution when this is a child run.
    pub parent_execution_id: Option<ExecutionId>,
    /// Wall-clock budget for the whole run.
    pub timeout_budget: Option<Duration>,
}

impl ContextConfig {
    /// Config for a root execution with defaults.
    #[must_use]
    pub fn root(execution_id: ExecutionId, user_id: UserId, workflow_id: WorkflowId) -> Self {
        Self {
            execution_id,
            user_id,
            workflow_id,
            nesting_depth: 0,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            workflow_chain: Vec::new(),
            parent_execution_id: None,
            timeout_budget: None,
        }
    }
}

/// Per-run state shared between the driver and the handlers it invokes.
pub struct ExecutionContext {
    /// Execution identifier.
    pub execution_id: ExecutionId,
    /// User running the workflow.
    pub user_id: UserId,
    /// Workflow being executed.
    pub workflow_id: WorkflowId,
    /// Sub-workflow nesting depth of this run.
    pub nesting_depth: u32,
    /// Maximum allowed nesting depth.
    pub max_nesting_depth: u32,
    /// Ancestor workflow ids, outermost first.
    pub workflow_chain: Vec<WorkflowId>,
    /// Parent execution when this is a child run.
    pub parent_execution_id: Option<ExecutionId>,
    /// Token for cooperative cancellation.
    pub cancellation: CancellationToken,

    timeout_budget: Option<Duration>,
    started: Instant,

    node_outputs: RwLock<HashMap<NodeId, Vec<NodeItem>>>,
    output_handles: RwLock<HashMap<NodeId, String>>,
    executed_nodes: RwLock<Vec<NodeId>>,
    credentials: RwLock<HashMap<String, Value>>,
    variables: RwLock<Map<String, Value>>,
    loop_stats: RwLock<HashMap<NodeId, u64>>,
    current_node: RwLock<Option<NodeId>>,
    current_input: RwLock<Vec<NodeItem>>,
    warnings: RwLock<Vec<ExecutionWarning>>,
    node_label_to_id: HashMap<String, NodeId>,

    subworkflow_runner: Option<Arc<dyn SubworkflowRunner>>,
    human_gate: Option<Arc<dyn HumanGate>>,
}

impl ExecutionContext {
    /// Create a context from its configuration.
    #[must_use]
    pub fn new(config: ContextConfig) -> Self {
        Self {
            execution_id: config.execution_id,
            user_id: config.user_id,
            workflow_id: config.workflow_id,
            nesting_depth: config.nesting_depth,
            max_nesting_depth: config.max_nesting_depth,
            workflow_chain: config.workflow_chain,
            parent_execution_id: config.parent_execution_id,
            cancellation: CancellationToken::new(),
            timeout_budget: config.timeout_budget,
            started: Instant::now(),
            node_outputs: RwLock::new(HashMap::new()),
            output_handles: RwLock::new(HashMap::new()),
            executed_nodes: RwLock::new(Vec::new()),
            credentials: RwLock::new(HashMap::new()),
            variables: RwLock::new(Map::new()),
            loop_stats: RwLock::new(HashMap::new()),
            current_node: RwLock::new(None),
            current_input: RwLock::new(Vec::new()),
            warnings: RwLock::new(Vec::new()),
            node_label_to_id: HashMap::new(),
            subworkflow_runner: None,
            human_gate: None,
        }
    }

    /// Install the label → id map used by expression resolution.
    #[must_use]
    pub fn with_labels(mut self, labels: HashMap<String, NodeId>) -> Self {
        self.node_label_to_id = labels;
        self
    }

    /// Replace the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Install the orchestrator capability seams.
    #[must_use]
    pub fn with_seams(
        mut self,
        subworkflows: Arc<dyn SubworkflowRunner>,
        human_gate: Arc<dyn HumanGate>,
    ) -> Self {
        self.subworkflow_runner = Some(subworkflows);
        self.human_gate = Some(human_gate);
        self
    }

    /// Pre-load decrypted credentials, keyed by credential id.
    pub fn set_credentials(&self, credentials: HashMap<String, Value>) {
        *self.credentials.write() = credentials;
    }

    /// A decrypted credential by id.
    #[must_use]
    pub fn credential(&self, credential_id: &str) -> Option<Value> {
        self.credentials.read().get(credential_id).cloned()
    }

    /// Store a node's output and the handle it left through, and record the
    /// node as executed.
    pub fn set_node_output(&self, node_id: NodeId, items: Vec<NodeItem>, handle: &str) {
        self.node_outputs.write().insert(node_id.clone(), items);
        self.output_handles
            .write()
            .insert(node_id.clone(), handle.to_owned());
        let mut executed = self.executed_nodes.write();
        if !executed.contains(&node_id) {
            executed.push(node_id);
        }
    }

    /// A node's stored output items.
    #[must_use]
    pub fn node_output(&self, node_id: &str) -> Option<Vec<NodeItem>> {
        self.node_outputs.read().get(node_id).cloned()
    }

    /// The output handle a node left through.
    #[must_use]
    pub fn output_handle_of(&self, node_id: &str) -> Option<String> {
        self.output_handles.read().get(node_id).cloned()
    }

    /// Node ids in the order they finished.
    #[must_use]
    pub fn executed_nodes(&self) -> Vec<NodeId> {
        self.executed_nodes.read().clone()
    }

    /// Set an execution variable.
    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        self.variables.write().insert(name.into(), value);
    }

    /// Read an execution variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.read().get(name).cloned()
    }

    /// Current loop iteration count for a node.
    #[must_use]
    pub fn loop_count(&self, node_id: &str) -> u64 {
        self.loop_stats.read().get(node_id).copied().unwrap_or(0)
    }

    /// Bump and return a node's loop iteration count.
    pub fn increment_loop(&self, node_id: &NodeId) -> u64 {
        let mut stats = self.loop_stats.write();
        let counter = stats.entry(node_id.clone()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// The node currently executing.
    #[must_use]
    pub fn current_node(&self) -> Option<NodeId> {
        self.current_node.read().clone()
    }

    /// Record the node about to execute and its gathered input.
    pub fn begin_node(&self, node_id: &NodeId, input: Vec<NodeItem>) {
        *self.current_node.write() = Some(node_id.clone());
        *self.current_input.write() = input;
    }

    /// The current node's input items.
    #[must_use]
    pub fn current_input_items(&self) -> Vec<NodeItem> {
        self.current_input.read().clone()
    }

    /// Append a warning attributed to the current node.
    pub fn push_warning(&self, message: impl Into<String>) {
        let node_id = self.current_node.read().clone();
        self.warnings.write().push(ExecutionWarning {
            node_id,
            message: message.into(),
        });
    }

    /// Snapshot of all warnings so far.
    #[must_use]
    pub fn warnings(&self) -> Vec<ExecutionWarning> {
        self.warnings.read().clone()
    }

    /// Warnings recorded since the given count (used per node).
    #[must_use]
    pub fn warnings_since(&self, mark: usize) -> Vec<ExecutionWarning> {
        self.warnings.read()[mark..].to_vec()
    }

    /// Number of warnings recorded so far.
    #[must_use]
    pub fn warning_mark(&self) -> usize {
        self.warnings.read().len()
    }

    /// Fail fast when cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<(), ExecutionError> {
        if self.cancellation.is_cancelled() {
            Err(ExecutionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Remaining wall-clock budget, if the run has one. `Some(ZERO)` means
    /// the budget is exhausted.
    #[must_use]
    pub fn remaining_budget(&self) -> Option<Duration> {
        self.timeout_budget
            .map(|budget| budget.saturating_sub(self.started.elapsed()))
    }

    /// Whether the run's budget is exhausted.
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        self.remaining_budget() == Some(Duration::ZERO)
    }

    /// The orchestrator's sub-workflow seam, when installed.
    #[must_use]
    pub fn subworkflow_runner(&self) -> Option<Arc<dyn SubworkflowRunner>> {
        self.subworkflow_runner.clone()
    }

    /// The orchestrator's human gate seam, when installed.
    #[must_use]
    pub fn human_gate(&self) -> Option<Arc<dyn HumanGate>> {
        self.human_gate.clone()
    }
}

// Credentials and seams are deliberately absent from the Debug output.
impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("workflow_id", &self.workflow_id)
            .field("nesting_depth", &self.nesting_depth)
            .field("executed_nodes", &self.executed_nodes.read().len())
            .finish_non_exhaustive()
    }
}

impl ExpressionScope for ExecutionContext {
    fn output_of(&self, node_id: &str) -> Option<Value> {
        self.node_outputs
            .read()
            .get(node_id)
            .map(|items| items_to_value(items))
    }

    fn id_for_label(&self, label: &str) -> Option<String> {
        self.node_label_to_id
            .get(label)
            .map(|id| id.as_str().to_owned())
    }

    fn id_for_label_ci(&self, label: &str) -> Option<String> {
        let lowered = label.to_lowercase();
        self.node_label_to_id
            .iter()
            .find(|(l, _)| l.to_lowercase() == lowered)
            .map(|(_, id)| id.as_str().to_owned())
    }

    fn variable(&self, name: &str) -> Option<Value> {
        self.variables.read().get(name).cloned()
    }

    fn current_input(&self) -> Value {
        items_to_value(&self.current_input.read())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use skein_core::items_from_value;
    use skein_expression::resolve_str;

    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ContextConfig::root(
            ExecutionId::v4(),
            UserId::v4(),
            WorkflowId::v4(),
        ))
    }

    #[test]
    fn output_round_trip_records_execution_order() {
        let ctx = ctx();
        ctx.set_node_output(
            NodeId::new("a"),
            items_from_value(json!({"x": 1})),
            "output",
        );
        ctx.set_node_output(NodeId::new("b"), vec![], "true");

        assert_eq!(ctx.node_output("a").unwrap()[0].json, json!({"x": 1}));
        assert_eq!(ctx.output_handle_of("b").as_deref(), Some("true"));
        assert_eq!(
            ctx.executed_nodes(),
            vec![NodeId::new("a"), NodeId::new("b")]
        );
    }

    #[test]
    fn re_execution_does_not_duplicate_order_entry() {
        let ctx = ctx();
        let node = NodeId::new("loop");
        ctx.set_node_output(node.clone(), vec![], "loop");
        ctx.set_node_output(node.clone(), vec![], "done");
        assert_eq!(ctx.executed_nodes(), vec![node]);
    }

    #[test]
    fn loop_counters() {
        let ctx = ctx();
        let node = NodeId::new("l");
        assert_eq!(ctx.loop_count("l"), 0);
        assert_eq!(ctx.increment_loop(&node), 1);
        assert_eq!(ctx.increment_loop(&node), 2);
        assert_eq!(ctx.loop_count("l"), 2);
    }

    #[test]
    fn warnings_attributed_to_current_node() {
        let ctx = ctx();
        ctx.begin_node(&NodeId::new("n1"), vec![]);
        let mark = ctx.warning_mark();
        ctx.push_warning("missing path");
        let since = ctx.warnings_since(mark);
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].node_id, Some(NodeId::new("n1")));
    }

    #[test]
    fn cancellation_check() {
        let ctx = ctx();
        assert!(ctx.check_cancelled().is_ok());
        ctx.cancellation.cancel();
        assert!(matches!(
            ctx.check_cancelled(),
            Err(ExecutionError::Cancelled)
        ));
    }

    #[test]
    fn budget_none_never_exhausts() {
        let ctx = ctx();
        assert_eq!(ctx.remaining_budget(), None);
        assert!(!ctx.budget_exhausted());
    }

    #[test]
    fn zero_budget_is_exhausted() {
        let mut config = ContextConfig::root(ExecutionId::v4(), UserId::v4(), WorkflowId::v4());
        config.timeout_budget = Some(Duration::ZERO);
        let ctx = ExecutionContext::new(config);
        assert!(ctx.budget_exhausted());
    }

    #[test]
    fn context_is_an_expression_scope() {
        let mut labels = HashMap::new();
        labels.insert("First".to_owned(), NodeId::new("n1"));
        let ctx = ctx().with_labels(labels);
        ctx.set_node_output(
            NodeId::new("n1"),
            items_from_value(json!({"message": "hi", "data": {"score": 95}})),
            "output",
        );

        let resolved = resolve_str("{{ $node['First'].json.data.score }}", &ctx);
        assert_eq!(resolved.value, json!(95));
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn credentials_hidden_from_debug() {
        let ctx = ctx();
        ctx.set_credentials(HashMap::from([("c1".to_owned(), json!({"key": "s3cret"}))]));
        let debug = format!("{ctx:?}");
        assert!(!debug.contains("s3cret"));
    }
}
