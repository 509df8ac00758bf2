//! Deterministic topological ordering (Kahn's algorithm).

use std::collections::{HashMap, HashSet, VecDeque};

use skein_core::NodeId;
use skein_workflow::WorkflowGraph;

/// Topologically sort a validated graph.
///
/// Determinism contract: the initial queue is seeded with in-degree-0 nodes
/// in input-list order, and successors are released in edge-list order, so
/// identical input graphs produce byte-identical orderings. Must only be
/// called on a cycle-free graph (validated earlier); nodes trapped in a
/// cycle would simply be absent from the result.
#[must_use]
pub fn topological_sort(graph: &WorkflowGraph) -> Vec<NodeId> {
    let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();

    let mut in_degree: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), 0))
        .collect();
    let mut downstream: HashMap<&str, Vec<&NodeId>> = HashMap::new();

    for edge in &graph.edges {
        if !ids.contains(edge.source.as_str()) || !ids.contains(edge.target.as_str()) {
            continue;
        }
        downstream
            .entry(edge.source.as_str())
            .or_default()
            .push(&edge.target);
        *in_degree.entry(edge.target.as_str()).or_default() += 1;
    }

    let mut queue: VecDeque<&NodeId> = graph
        .nodes
        .iter()
        .filter(|n| in_degree[n.id.as_str()] == 0)
        .map(|n| &n.id)
        .collect();

    let mut order = Vec::with_capacity(graph.nodes.len());
    while let Some(node) = queue.pop_front() {
        order.push(node.clone());
        if let Some(successors) = downstream.get(node.as_str()) {
            for successor in successors {
                if let Some(degree) = in_degree.get_mut(successor.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(successor);
                    }
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use skein_workflow::{EdgeDefinition, NodeDefinition};

    use super::*;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> WorkflowGraph {
        WorkflowGraph {
            nodes: nodes
                .iter()
                .map(|id| NodeDefinition::new(*id, "set"))
                .collect(),
            edges: edges
                .iter()
                .map(|(s, t)| EdgeDefinition::new(*s, *t))
                .collect(),
            settings: skein_workflow::WorkflowSettings::default(),
        }
    }

    fn ids(order: &[NodeId]) -> Vec<&str> {
        order.iter().map(NodeId::as_str).collect()
    }

    #[test]
    fn linear_chain() {
        let order = topological_sort(&graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]));
        assert_eq!(ids(&order), vec!["a", "b", "c"]);
    }

    #[test]
    fn ties_follow_input_order() {
        let order = topological_sort(&graph(&["z", "a", "m"], &[]));
        assert_eq!(ids(&order), vec!["z", "a", "m"]);
    }

    #[test]
    fn diamond_respects_dependencies() {
        let order = topological_sort(&graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        ));
        assert_eq!(ids(&order), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn every_edge_points_forward() {
        let g = graph(
            &["t", "x", "y", "z"],
            &[("t", "y"), ("t", "x"), ("x", "z"), ("y", "z")],
        );
        let order = topological_sort(&g);
        let index: std::collections::HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        for edge in &g.edges {
            assert!(index[edge.source.as_str()] < index[edge.target.as_str()]);
        }
    }

    #[test]
    fn cycle_nodes_are_absent() {
        let order = topological_sort(&graph(&["a", "b"], &[("a", "b"), ("b", "a")]));
        assert!(order.is_empty());
    }
}
