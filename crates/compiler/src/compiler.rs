//! The phased compilation pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use skein_handlers::HandlerRegistry;
use skein_workflow::WorkflowGraph;

use crate::issue::{CompileIssue, CompileResult};
use crate::plan::ExecutionPlan;
use crate::toposort::topological_sort;
use crate::validate::{
    validate_credentials, validate_dag, validate_node_configs, validate_type_compatibility,
};

/// Compiles one workflow graph for one invoking user.
///
/// ```
/// # use std::collections::HashSet;
/// # use skein_compiler::Compiler;
/// # use skein_handlers::HandlerRegistry;
/// # use skein_workflow::{NodeDefinition, WorkflowGraph, WorkflowSettings};
/// let graph = WorkflowGraph {
///     nodes: vec![NodeDefinition::new("start", "manual_trigger")],
///     edges: vec![],
///     settings: WorkflowSettings::default(),
/// };
/// let result = Compiler::new(graph, HashSet::new(), HandlerRegistry::builtin()).compile();
/// assert!(result.success);
/// ```
pub struct Compiler {
    graph: WorkflowGraph,
    user_credentials: HashSet<String>,
    registry: Arc<HandlerRegistry>,
}

impl Compiler {
    /// Create a compiler for a graph, the invoking user's credential ids and
    /// the process handler registry.
    #[must_use]
    pub fn new(
        graph: WorkflowGraph,
        user_credentials: HashSet<String>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            graph,
            user_credentials,
            registry,
        }
    }

    /// Run the pipeline. Halts at the first phase that produces errors;
    /// warnings accumulate across the phases that ran.
    #[must_use]
    pub fn compile(&self) -> CompileResult {
        let node_count = self.graph.nodes.len();
        let edge_count = self.graph.edges.len();
        let warnings = Vec::new();

        let phases: [fn(&Self) -> Vec<CompileIssue>; 4] = [
            |c| validate_dag(&c.graph),
            |c| validate_credentials(&c.graph, &c.user_credentials),
            |c| validate_node_configs(&c.graph, &c.registry),
            |c| validate_type_compatibility(&c.graph, &c.registry),
        ];
        for phase in phases {
            let errors = phase(self);
            if !errors.is_empty() {
                return CompileResult::failed(errors, warnings, node_count, edge_count);
            }
        }

        let order = topological_sort(&self.graph);
        let plan = ExecutionPlan::build(&self.graph, order);

        CompileResult {
            success: true,
            errors: Vec::new(),
            warnings,
            execution_plan: Some(plan),
            node_count,
            edge_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use skein_workflow::{EdgeDefinition, NodeDefinition, WorkflowSettings};

    use super::*;
    use crate::issue::IssueCode;

    fn compile(graph: WorkflowGraph) -> CompileResult {
        Compiler::new(graph, HashSet::new(), HandlerRegistry::builtin()).compile()
    }

    fn linear() -> WorkflowGraph {
        WorkflowGraph {
            nodes: vec![
                NodeDefinition::new("a", "manual_trigger"),
                NodeDefinition::new("b", "set"),
                NodeDefinition::new("c", "http_request")
                    .with_config(json!({"url": "https://example.com"})),
            ],
            edges: vec![
                EdgeDefinition::new("a", "b"),
                EdgeDefinition::new("b", "c"),
            ],
            settings: WorkflowSettings::default(),
        }
    }

    #[test]
    fn valid_graph_compiles_with_plan() {
        let result = compile(linear());
        assert!(result.success, "errors: {:?}", result.errors);
        let plan = result.execution_plan.unwrap();
        assert_eq!(
            plan.execution_order
                .iter()
                .map(|n| n.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(result.node_count, 3);
        assert_eq!(result.edge_count, 2);
    }

    #[test]
    fn cycle_halts_before_config_validation() {
        // `http_request` here is missing its URL, but the cycle is caught
        // first and the config phase never runs.
        let graph = WorkflowGraph {
            nodes: vec![
                NodeDefinition::new("n1", "http_request"),
                NodeDefinition::new("n2", "set"),
            ],
            edges: vec![
                EdgeDefinition::new("n1", "n2"),
                EdgeDefinition::new("n2", "n1"),
            ],
            settings: WorkflowSettings::default(),
        };
        let result = compile(graph);
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, IssueCode::DagCycle);
        assert!(result.execution_plan.is_none());
    }

    #[test]
    fn missing_credential_halts_before_config_phase() {
        let graph = WorkflowGraph {
            nodes: vec![
                NodeDefinition::new("a", "manual_trigger"),
                NodeDefinition::new("b", "http_request")
                    .with_config(json!({"credential": "nope"})),
            ],
            edges: vec![EdgeDefinition::new("a", "b")],
            settings: WorkflowSettings::default(),
        };
        let result = compile(graph);
        assert!(!result.success);
        assert!(
            result
                .errors
                .iter()
                .all(|e| e.code == IssueCode::MissingCredential)
        );
    }

    #[test]
    fn config_errors_reported_per_node() {
        let graph = WorkflowGraph {
            nodes: vec![
                NodeDefinition::new("a", "manual_trigger"),
                NodeDefinition::new("b", "http_request"),
                NodeDefinition::new("c", "llm"),
            ],
            edges: vec![
                EdgeDefinition::new("a", "b"),
                EdgeDefinition::new("a", "c"),
            ],
            settings: WorkflowSettings::default(),
        };
        let result = compile(graph);
        assert!(!result.success);
        let nodes_with_errors: Vec<&str> = result
            .errors
            .iter()
            .filter_map(|e| e.node_id.as_ref().map(skein_core::NodeId::as_str))
            .collect();
        assert!(nodes_with_errors.contains(&"b"));
        assert!(nodes_with_errors.contains(&"c"));
    }

    #[test]
    fn identical_graphs_compile_to_identical_plans() {
        let first = compile(linear()).execution_plan.unwrap();
        let second = compile(linear()).execution_plan.unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}
