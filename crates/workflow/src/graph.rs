//! Workflow graph definition: nodes, edges, settings, adjacency.
//!
//! The graph arrives as client JSON (camelCase keys on edges, `type` on
//! nodes) and is kept structurally close to that wire form. Uniqueness,
//! reachability, and cycle rules are enforced by the compiler, not here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use skein_core::NodeId;

/// The default output handle name for non-branching nodes.
pub const DEFAULT_OUTPUT_HANDLE: &str = "output";

fn default_source_handle() -> String {
    DEFAULT_OUTPUT_HANDLE.to_owned()
}

fn default_config() -> Value {
    Value::Object(Map::new())
}

/// Display and configuration payload embedded in a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Human-facing label shown in the editor; also addressable from
    /// expressions via `$node["<label>"]`.
    #[serde(default)]
    pub label: String,
    /// Opaque configuration object passed to the node handler.
    #[serde(default = "default_config")]
    pub config: Value,
}

/// A single node of the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Identifier, unique within the workflow.
    pub id: NodeId,
    /// Registry key selecting the handler (`"http_request"`, `"if"`, …).
    #[serde(rename = "type")]
    pub node_type: String,
    /// Label and handler configuration.
    #[serde(default)]
    pub data: NodeData,
}

impl NodeDefinition {
    /// Create a node with an empty config.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: NodeData {
                label: String::new(),
                config: default_config(),
            },
        }
    }

    /// Set the display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = label.into();
        self
    }

    /// Set the handler configuration.
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.data.config = config;
        self
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDefinition {
    /// Source node identifier.
    pub source: NodeId,
    /// Target node identifier.
    pub target: NodeId,
    /// Which output handle of the source this edge leaves from. Multiple
    /// edges from one source with distinct handles realise branching.
    #[serde(default = "default_source_handle")]
    pub source_handle: String,
    /// Which input handle of the target this edge enters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl EdgeDefinition {
    /// Create an edge on the default output handle.
    #[must_use]
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: default_source_handle(),
            target_handle: None,
        }
    }

    /// Create an edge leaving a specific output handle.
    #[must_use]
    pub fn on_handle(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        handle: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: handle.into(),
            target_handle: None,
        }
    }
}

/// Workflow-level execution settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Fallback per-node timeout in seconds when a node config has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_timeout: Option<u64>,
    /// Maximum sub-workflow nesting depth override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nesting_depth: Option<u32>,
    /// Unrecognised settings are carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The full workflow graph as authored by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// Nodes, in the order the client supplied them. Order is meaningful:
    /// the compiler's topological tie-break follows it.
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    /// Directed edges.
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    /// Workflow-level settings.
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl WorkflowGraph {
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    /// Build the label → id map used by the expression resolver. Nodes with
    /// an empty label are skipped; on duplicate labels the first node wins.
    #[must_use]
    pub fn label_to_id(&self) -> HashMap<String, NodeId> {
        let mut map = HashMap::new();
        for node in &self.nodes {
            if !node.data.label.is_empty() {
                map.entry(node.data.label.clone())
                    .or_insert_with(|| node.id.clone());
            }
        }
        map
    }

    /// Build adjacency maps from the edge list. Edges referencing unknown
    /// nodes are skipped here; the compiler reports them separately.
    #[must_use]
    pub fn adjacency(&self) -> Adjacency {
        let ids: std::collections::HashSet<&str> =
            self.nodes.iter().map(|n| n.id.as_str()).collect();

        let mut downstream: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut upstream: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for edge in &self.edges {
            if !ids.contains(edge.source.as_str()) || !ids.contains(edge.target.as_str()) {
                continue;
            }
            downstream
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
            upstream
                .entry(edge.target.clone())
                .or_default()
                .push(edge.source.clone());
        }
        Adjacency {
            downstream,
            upstream,
        }
    }
}

/// Downstream/upstream adjacency derived from the edge list.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    /// node → nodes it feeds.
    pub downstream: HashMap<NodeId, Vec<NodeId>>,
    /// node → nodes feeding it.
    pub upstream: HashMap<NodeId, Vec<NodeId>>,
}

impl Adjacency {
    /// Nodes downstream of `id` (empty slice when none).
    #[must_use]
    pub fn downstream_of(&self, id: &str) -> &[NodeId] {
        self.downstream.get(id).map_or(&[], Vec::as_slice)
    }

    /// Nodes upstream of `id` (empty slice when none).
    #[must_use]
    pub fn upstream_of(&self, id: &str) -> &[NodeId] {
        self.upstream.get(id).map_or(&[], Vec::as_slice)
    }

    /// In-degree of `id`.
    #[must_use]
    pub fn in_degree(&self, id: &str) -> usize {
        self.upstream_of(id).len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn two_node_graph() -> WorkflowGraph {
        WorkflowGraph {
            nodes: vec![
                NodeDefinition::new("a", "manual_trigger").with_label("Start"),
                NodeDefinition::new("b", "set").with_label("Assign"),
            ],
            edges: vec![EdgeDefinition::new("a", "b")],
            settings: WorkflowSettings::default(),
        }
    }

    #[test]
    fn edge_source_handle_defaults_to_output() {
        let edge: EdgeDefinition =
            serde_json::from_value(json!({"source": "a", "target": "b"})).unwrap();
        assert_eq!(edge.source_handle, "output");
        assert_eq!(edge.target_handle, None);
    }

    #[test]
    fn edge_camel_case_wire_form() {
        let edge: EdgeDefinition = serde_json::from_value(
            json!({"source": "a", "target": "b", "sourceHandle": "true"}),
        )
        .unwrap();
        assert_eq!(edge.source_handle, "true");
    }

    #[test]
    fn node_type_uses_type_key() {
        let node: NodeDefinition = serde_json::from_value(
            json!({"id": "n1", "type": "http_request", "data": {"label": "Fetch"}}),
        )
        .unwrap();
        assert_eq!(node.node_type, "http_request");
        assert_eq!(node.data.label, "Fetch");
        assert_eq!(node.data.config, json!({}));
    }

    #[test]
    fn adjacency_maps_both_directions() {
        let graph = two_node_graph();
        let adj = graph.adjacency();
        assert_eq!(adj.downstream_of("a"), &[NodeId::new("b")]);
        assert_eq!(adj.upstream_of("b"), &[NodeId::new("a")]);
        assert_eq!(adj.in_degree("a"), 0);
        assert_eq!(adj.in_degree("b"), 1);
    }

    #[test]
    fn adjacency_skips_dangling_edges() {
        let mut graph = two_node_graph();
        graph.edges.push(EdgeDefinition::new("b", "ghost"));
        let adj = graph.adjacency();
        assert!(adj.downstream_of("b").is_empty());
    }

    #[test]
    fn label_map_first_wins_on_duplicates() {
        let mut graph = two_node_graph();
        graph
            .nodes
            .push(NodeDefinition::new("c", "set").with_label("Assign"));
        let labels = graph.label_to_id();
        assert_eq!(labels.get("Assign"), Some(&NodeId::new("b")));
        assert_eq!(labels.get("Start"), Some(&NodeId::new("a")));
    }

    #[test]
    fn settings_flatten_keeps_unknown_keys() {
        let graph: WorkflowGraph = serde_json::from_value(json!({
            "nodes": [],
            "edges": [],
            "settings": {"node_timeout": 30, "color": "teal"}
        }))
        .unwrap();
        assert_eq!(graph.settings.node_timeout, Some(30));
        assert_eq!(graph.settings.extra.get("color"), Some(&json!("teal")));
    }
}
