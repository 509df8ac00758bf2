//! The execution plan: what the engine actually runs.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_core::{DEFAULT_NODE_TIMEOUT_SECS, NodeId};
use skein_expression::{PathSegment, find_template_paths};
use skein_workflow::WorkflowGraph;

/// Per-node slice of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePlan {
    /// Handler registry key.
    pub node_type: String,
    /// The node's configuration (expressions unresolved).
    pub config: Value,
    /// Upstream node ids this node waits on.
    pub dependencies: Vec<NodeId>,
    /// Per-node timeout in seconds.
    pub timeout_seconds: u64,
    /// Config paths containing `{{ … }}` templates, pre-analysed so the
    /// engine only rewrites configs that need it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expression_paths: Vec<Vec<PathSegment>>,
}

impl NodePlan {
    /// The node timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// The compiled, topologically ordered plan for one workflow.
///
/// Ephemeral and deterministic: compiling the same graph twice yields
/// byte-identical plans (node ordering included — `nodes` preserves the
/// execution order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Node ids in execution order.
    pub execution_order: Vec<NodeId>,
    /// Per-node plans, keyed by id, iterated in execution order.
    pub nodes: IndexMap<NodeId, NodePlan>,
    /// Nodes with no incoming edges.
    pub entry_points: Vec<NodeId>,
}

impl ExecutionPlan {
    /// Build the plan for a validated graph, given its topological order.
    ///
    /// The per-node timeout falls back `config.timeout` →
    /// `settings.node_timeout` → 60 s.
    #[must_use]
    pub fn build(graph: &WorkflowGraph, execution_order: Vec<NodeId>) -> Self {
        let adjacency = graph.adjacency();
        let default_timeout = graph
            .settings
            .node_timeout
            .unwrap_or(DEFAULT_NODE_TIMEOUT_SECS);

        let mut nodes = IndexMap::with_capacity(execution_order.len());
        for node_id in &execution_order {
            let Some(node) = graph.node(node_id.as_str()) else {
                continue;
            };
            let config = node.data.config.clone();
            let timeout_seconds = config
                .get("timeout")
                .and_then(Value::as_u64)
                .unwrap_or(default_timeout);

            nodes.insert(
                node_id.clone(),
                NodePlan {
                    node_type: node.node_type.clone(),
                    expression_paths: find_template_paths(&config),
                    config,
                    dependencies: adjacency.upstream_of(node_id.as_str()).to_vec(),
                    timeout_seconds,
                },
            );
        }

        let entry_points = execution_order
            .iter()
            .filter(|id| adjacency.in_degree(id.as_str()) == 0)
            .cloned()
            .collect();

        Self {
            execution_order,
            nodes,
            entry_points,
        }
    }

    /// The plan entry for a node.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodePlan> {
        self.nodes.get(id)
    }

    /// Number of nodes in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.execution_order.len()
    }

    /// Whether the plan is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.execution_order.is_empty()
    }
}
