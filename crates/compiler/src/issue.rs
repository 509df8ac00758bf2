//! Structured compile issues and the compile result envelope.

use serde::{Deserialize, Serialize};
use skein_core::NodeId;

use crate::plan::ExecutionPlan;

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks compilation.
    Error,
    /// Reported but non-blocking.
    Warning,
}

/// Machine-readable issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// The graph contains a cycle.
    DagCycle,
    /// The graph has no nodes.
    EmptyWorkflow,
    /// An edge references a node that does not exist.
    InvalidEdge,
    /// No entry-point (in-degree 0) node exists.
    NoTrigger,
    /// A node is unreachable from every trigger.
    OrphanNode,
    /// No handler is registered for a node's type.
    UnknownNodeType,
    /// A handler rejected a node's configuration.
    InvalidConfig,
    /// A node references a credential the user does not own.
    MissingCredential,
    /// An edge connects incompatible output/input types.
    TypeMismatch,
}

/// One compilation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileIssue {
    /// Machine-readable code.
    pub code: IssueCode,
    /// Node the issue is attributed to, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Config field the issue is about, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Error or warning.
    pub severity: Severity,
}

impl CompileIssue {
    /// A workflow-level error.
    #[must_use]
    pub fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            node_id: None,
            field: None,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// An error attributed to a node.
    #[must_use]
    pub fn node_error(code: IssueCode, node_id: impl Into<NodeId>, message: impl Into<String>) -> Self {
        Self {
            code,
            node_id: Some(node_id.into()),
            field: None,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// Attach the config field the issue refers to.
    #[must_use]
    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// The result of compiling a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    /// Whether the workflow compiled.
    pub success: bool,
    /// Blocking issues (empty on success).
    pub errors: Vec<CompileIssue>,
    /// Non-blocking issues.
    pub warnings: Vec<CompileIssue>,
    /// The plan, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_plan: Option<ExecutionPlan>,
    /// Number of nodes in the input graph.
    pub node_count: usize,
    /// Number of edges in the input graph.
    pub edge_count: usize,
}

impl CompileResult {
    /// A failed result carrying the collected issues.
    #[must_use]
    pub fn failed(errors: Vec<CompileIssue>, warnings: Vec<CompileIssue>, nodes: usize, edges: usize) -> Self {
        Self {
            success: false,
            errors,
            warnings,
            execution_plan: None,
            node_count: nodes,
            edge_count: edges,
        }
    }
}
