//! Trigger nodes — the entry points of a workflow.
//!
//! At execution time a trigger simply passes the run's initial input through
//! as items; the interesting part of a trigger (webhook registration,
//! schedules) lives outside the engine core.

use async_trait::async_trait;
use serde_json::Value;
use skein_core::NodeItem;
use skein_execution::{ExecutionContext, NodeExecutionResult};

use crate::handler::NodeHandler;
use crate::metadata::{DataType, HandleSpec, NodeCategory, NodeMetadata};

fn trigger_metadata(node_type: &str, display_name: &str, output: DataType) -> NodeMetadata {
    NodeMetadata {
        node_type: node_type.to_owned(),
        display_name: display_name.to_owned(),
        category: NodeCategory::Trigger,
        fields: Vec::new(),
        input_handles: Vec::new(),
        output_handles: vec![HandleSpec::new("output", "Output", output)],
        accepts: Vec::new(),
    }
}

fn pass_through(input: Vec<NodeItem>) -> NodeExecutionResult {
    NodeExecutionResult::from_items(input)
}

/// Started explicitly by a user or API call.
#[derive(Debug, Default)]
pub struct ManualTriggerNode;

#[async_trait]
impl NodeHandler for ManualTriggerNode {
    fn metadata(&self) -> NodeMetadata {
        trigger_metadata("manual_trigger", "Manual Trigger", DataType::Any)
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
        pass_through(input)
    }
}

/// Fired by an inbound HTTP request; the payload arrives as initial input.
#[derive(Debug, Default)]
pub struct WebhookTriggerNode;

#[async_trait]
impl NodeHandler for WebhookTriggerNode {
    fn metadata(&self) -> NodeMetadata {
        trigger_metadata("webhook_trigger", "Webhook Trigger", DataType::Json)
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
        pass_through(input)
    }
}

/// Fired on a schedule; emits the tick payload.
#[derive(Debug, Default)]
pub struct ScheduleTriggerNode;

#[async_trait]
impl NodeHandler for ScheduleTriggerNode {
    fn metadata(&self) -> NodeMetadata {
        trigger_metadata("schedule_trigger", "Schedule Trigger", DataType::Datetime)
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
        pass_through(input)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use skein_core::{ExecutionId, UserId, WorkflowId, items_from_value};
    use skein_execution::ContextConfig;

    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ContextConfig::root(
            ExecutionId::v4(),
            UserId::v4(),
            WorkflowId::v4(),
        ))
    }

    #[tokio::test]
    async fn manual_trigger_passes_input_through() {
        let input = items_from_value(json!({"k": "v"}));
        let result = ManualTriggerNode
            .execute(input.clone(), &json!({}), &ctx())
            .await;
        assert!(result.success);
        assert_eq!(result.items, input);
        assert_eq!(result.output_handle, "output");
    }

    #[test]
    fn triggers_have_no_inputs() {
        assert!(ManualTriggerNode.metadata().is_trigger());
        assert!(WebhookTriggerNode.metadata().is_trigger());
        assert!(ScheduleTriggerNode.metadata().is_trigger());
    }

    #[test]
    fn webhook_outputs_json() {
        let meta = WebhookTriggerNode.metadata();
        assert_eq!(meta.output_type("output"), DataType::Json);
    }
}
