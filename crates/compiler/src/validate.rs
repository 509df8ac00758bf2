//! Validation phases: DAG shape, credentials, node configs, edge typing.

use std::collections::{HashMap, HashSet};

use skein_core::NodeId;
use skein_handlers::{DataType, HandlerRegistry};
use skein_workflow::WorkflowGraph;

use crate::issue::{CompileIssue, IssueCode};

/// Phase 1 — the graph must be a connected DAG with at least one trigger.
///
/// Checks, in order: non-empty node list, edge references, cycles (DFS with
/// a recursion stack; the first back-edge is reported and the phase stops),
/// trigger presence (a trigger is any in-degree-0 node), reachability of
/// every node from some trigger.
#[must_use]
pub fn validate_dag(graph: &WorkflowGraph) -> Vec<CompileIssue> {
    let mut issues = Vec::new();

    if graph.nodes.is_empty() {
        issues.push(CompileIssue::error(
            IssueCode::EmptyWorkflow,
            "workflow has no nodes",
        ));
        return issues;
    }

    let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &graph.edges {
        if !ids.contains(edge.source.as_str()) {
            issues.push(CompileIssue::node_error(
                IssueCode::InvalidEdge,
                edge.source.clone(),
                format!("edge source '{}' does not exist", edge.source),
            ));
        } else if !ids.contains(edge.target.as_str()) {
            issues.push(CompileIssue::node_error(
                IssueCode::InvalidEdge,
                edge.target.clone(),
                format!("edge target '{}' does not exist", edge.target),
            ));
        }
    }
    if !issues.is_empty() {
        return issues;
    }

    let adjacency = graph.adjacency();

    if let Some(cycle_node) = find_cycle(graph, &adjacency) {
        issues.push(CompileIssue::node_error(
            IssueCode::DagCycle,
            cycle_node.clone(),
            format!("cycle detected involving node '{cycle_node}'"),
        ));
        return issues;
    }

    let triggers: Vec<&NodeId> = graph
        .nodes
        .iter()
        .filter(|n| adjacency.in_degree(n.id.as_str()) == 0)
        .map(|n| &n.id)
        .collect();
    if triggers.is_empty() {
        issues.push(CompileIssue::error(
            IssueCode::NoTrigger,
            "workflow has no trigger node (entry point)",
        ));
        return issues;
    }

    let mut reachable: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = triggers.iter().map(|t| t.as_str()).collect();
    while let Some(node) = stack.pop() {
        if !reachable.insert(node) {
            continue;
        }
        for next in adjacency.downstream_of(node) {
            stack.push(next.as_str());
        }
    }
    for node in &graph.nodes {
        if !reachable.contains(node.id.as_str()) {
            issues.push(CompileIssue::node_error(
                IssueCode::OrphanNode,
                node.id.clone(),
                format!("node '{}' is not reachable from any trigger", node.id),
            ));
        }
    }

    issues
}

/// Iterative DFS cycle detection with an explicit recursion stack. Returns
/// the node where the first back-edge lands.
fn find_cycle<'a>(
    graph: &'a WorkflowGraph,
    adjacency: &'a skein_workflow::Adjacency,
) -> Option<&'a NodeId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    for start in &graph.nodes {
        if marks.contains_key(start.id.as_str()) {
            continue;
        }
        // (node, next-successor-index) frames.
        let mut stack: Vec<(&NodeId, usize)> = vec![(&start.id, 0)];
        marks.insert(start.id.as_str(), Mark::Visiting);

        while let Some((node, cursor)) = stack.last_mut() {
            let successors = adjacency.downstream_of(node.as_str());
            if *cursor < successors.len() {
                let next = &successors[*cursor];
                *cursor += 1;
                match marks.get(next.as_str()) {
                    Some(Mark::Visiting) => return Some(next),
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(next.as_str(), Mark::Visiting);
                        stack.push((next, 0));
                    }
                }
            } else {
                marks.insert(node.as_str(), Mark::Done);
                stack.pop();
            }
        }
    }
    None
}

/// Phase 2 — every referenced credential must belong to the invoking user.
#[must_use]
pub fn validate_credentials(
    graph: &WorkflowGraph,
    user_credentials: &HashSet<String>,
) -> Vec<CompileIssue> {
    let mut issues = Vec::new();
    for node in &graph.nodes {
        let Some(credential) = node.data.config.get("credential").and_then(|c| c.as_str())
        else {
            continue;
        };
        if credential.is_empty() {
            continue;
        }
        if !user_credentials.contains(credential) {
            issues.push(
                CompileIssue::node_error(
                    IssueCode::MissingCredential,
                    node.id.clone(),
                    format!("credential '{credential}' not found for node"),
                )
                .on_field("credential"),
            );
        }
    }
    issues
}

/// Phase 3 — every node needs a registered handler that accepts its config.
#[must_use]
pub fn validate_node_configs(
    graph: &WorkflowGraph,
    registry: &HandlerRegistry,
) -> Vec<CompileIssue> {
    let mut issues = Vec::new();
    for node in &graph.nodes {
        let Some(handler) = registry.get(&node.node_type) else {
            issues.push(CompileIssue::node_error(
                IssueCode::UnknownNodeType,
                node.id.clone(),
                format!("unknown node type: '{}'", node.node_type),
            ));
            continue;
        };
        for message in handler.validate_config(&node.data.config) {
            issues.push(CompileIssue::node_error(
                IssueCode::InvalidConfig,
                node.id.clone(),
                message,
            ));
        }
    }
    issues
}

/// Phase 4 — each edge's source-output type must be acceptable to the
/// target. `any`/`passthrough` are universal; `error` may only flow where
/// `error` (or `any`) is declared.
#[must_use]
pub fn validate_type_compatibility(
    graph: &WorkflowGraph,
    registry: &HandlerRegistry,
) -> Vec<CompileIssue> {
    let node_types: HashMap<&str, &str> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.node_type.as_str()))
        .collect();

    let mut issues = Vec::new();
    for edge in &graph.edges {
        let (Some(source_type), Some(target_type)) = (
            node_types.get(edge.source.as_str()),
            node_types.get(edge.target.as_str()),
        ) else {
            continue;
        };
        let (Some(source_meta), Some(target_meta)) = (
            registry.metadata_of(source_type),
            registry.metadata_of(target_type),
        ) else {
            continue; // unknown types already reported in phase 3
        };

        let output = source_meta.output_type(&edge.source_handle);
        let accepts = &target_meta.accepts;

        if !output.flows_into(accepts) {
            let message = if output == DataType::Error {
                format!(
                    "node '{}' cannot accept error output from '{}'",
                    edge.target, edge.source
                )
            } else {
                format!(
                    "type mismatch: '{source_type}' outputs '{output:?}' on '{}' but '{target_type}' does not accept it",
                    edge.source_handle
                )
            };
            issues.push(CompileIssue::node_error(
                IssueCode::TypeMismatch,
                edge.target.clone(),
                message,
            ));
        }
    }
    issues
}
