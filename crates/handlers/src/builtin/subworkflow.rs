//! The `subworkflow` node: run another workflow as a child execution.

use async_trait::async_trait;
use serde_json::{Value, json};
use skein_core::NodeItem;
use skein_execution::{ExecutionContext, NodeExecutionResult};

use crate::handler::{NodeHandler, config};
use crate::metadata::{
    DataType, FieldSpec, FieldType, HandleSpec, NodeCategory, NodeMetadata, standard_accepts,
    standard_input,
};

/// Delegates to the orchestrator through the context's subworkflow seam.
/// Circularity, nesting-depth and timeout violations come back as failures
/// on the `error` handle.
#[derive(Debug, Default)]
pub struct SubworkflowNode;

#[async_trait]
impl NodeHandler for SubworkflowNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            node_type: "subworkflow".to_owned(),
            display_name: "Sub-workflow".to_owned(),
            category: NodeCategory::Flow,
            fields: vec![
                FieldSpec::required("workflow_id", "Workflow", FieldType::String),
                FieldSpec::optional(
                    "wait_for_completion",
                    "Wait For Completion",
                    FieldType::Boolean,
                    json!(true),
                ),
            ],
            input_handles: standard_input(),
            output_handles: vec![
                HandleSpec::new("success", "Success", DataType::Json),
                HandleSpec::new("error", "Error", DataType::Error),
            ],
            accepts: standard_accepts(),
        }
    }

    fn validate_config(&self, cfg: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        config::require_str(cfg, "workflow_id", &mut errors);
        errors
    }

    async fn execute(
        &self,
        input: Vec<NodeItem>,
        cfg: &Value,
        ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        let Some(runner) = ctx.subworkflow_runner() else {
            return NodeExecutionResult::failure("sub-workflow execution not available");
        };
        runner.run_subworkflow(ctx, cfg, input).await
    }
}
