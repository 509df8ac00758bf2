//! Conditional routing: the skip set.
//!
//! After a branching node completes, every node that can no longer receive
//! data is marked skipped. Liveness is the dominance rule in reverse: a
//! node stays live while *some* path from an entry point still reaches it
//! through live edges; only nodes reachable exclusively through not-taken
//! branches are skipped.

use std::collections::{HashMap, HashSet};

use skein_core::NodeId;
use skein_execution::ExecutionContext;
use skein_workflow::EdgeDefinition;

/// A node's outgoing edges participate in branch routing only when they use
/// two or more distinct source handles. Single-handle nodes route
/// everything forward regardless of the handle label a handler reported —
/// `http_request` answering on `success` still feeds a default-`output`
/// edge.
#[must_use]
pub fn is_branching(edges: &[&EdgeDefinition]) -> bool {
    let mut handles: HashSet<&str> = HashSet::new();
    for edge in edges {
        handles.insert(edge.source_handle.as_str());
        if handles.len() > 1 {
            return true;
        }
    }
    false
}

/// Recompute the full skip set after a node's branch was taken.
///
/// Walks the live frontier from every entry point: an executed branching
/// node only releases edges matching its taken handle; a skipped node
/// releases nothing; everything else releases all its edges. Plan nodes
/// that are neither executed nor reachable are skipped. Returns the nodes
/// newly added to `skip_set`.
#[must_use]
pub fn recompute_skips(
    execution_order: &[NodeId],
    entry_points: &[NodeId],
    edges: &[EdgeDefinition],
    ctx: &ExecutionContext,
    skip_set: &mut HashSet<NodeId>,
) -> Vec<NodeId> {
    let mut outgoing: HashMap<&str, Vec<&EdgeDefinition>> = HashMap::new();
    for edge in edges {
        outgoing.entry(edge.source.as_str()).or_default().push(edge);
    }

    let executed: HashSet<NodeId> = ctx.executed_nodes().into_iter().collect();

    let mut live: HashSet<&str> = HashSet::new();
    let mut frontier: Vec<&NodeId> = entry_points.iter().collect();
    while let Some(node) = frontier.pop() {
        if !live.insert(node.as_str()) || skip_set.contains(node) {
            continue;
        }
        let node_edges = outgoing.get(node.as_str()).map_or(&[][..], Vec::as_slice);
        let released: Vec<&EdgeDefinition> = if executed.contains(node) && is_branching(node_edges)
        {
            let taken = ctx.output_handle_of(node.as_str()).unwrap_or_default();
            node_edges
                .iter()
                .filter(|e| e.source_handle == taken)
                .copied()
                .collect()
        } else {
            node_edges.to_vec()
        };
        for edge in released {
            frontier.push(&edge.target);
        }
    }

    let mut newly_skipped = Vec::new();
    for node in execution_order {
        if !executed.contains(node) && !live.contains(node.as_str()) && !skip_set.contains(node) {
            skip_set.insert(node.clone());
            newly_skipped.push(node.clone());
        }
    }
    newly_skipped
}
