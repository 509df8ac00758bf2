//! The `approval` node: a blocking human-in-the-loop gate.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use skein_core::NodeItem;
use skein_execution::{
    AutoAction, ExecutionContext, HitlAction, HitlGateSpec, HitlRequestType, NodeExecutionResult,
};

use crate::handler::{NodeHandler, config};
use crate::metadata::{
    DataType, FieldSpec, FieldType, HandleSpec, NodeCategory, NodeMetadata, standard_accepts,
    standard_input,
};

const DEFAULT_GATE_TIMEOUT_SECS: u64 = 300;

/// Blocks the run until a human approves or rejects (or the timeout applies
/// the configured auto action). Input items pass through on the taken
/// branch; the decision itself is attached to the output.
#[derive(Debug, Default)]
pub struct ApprovalNode;

#[async_trait]
impl NodeHandler for ApprovalNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            node_type: "approval".to_owned(),
            display_name: "Approval Gate".to_owned(),
            category: NodeCategory::Flow,
            fields: vec![
                FieldSpec::optional(
                    "title",
                    "Title",
                    FieldType::String,
                    json!("Approval Required"),
                ),
                FieldSpec::required("message", "Message", FieldType::String),
                FieldSpec::optional(
                    "options",
                    "Options",
                    FieldType::Json,
                    json!(["approve", "reject"]),
                ),
                // Distinct from the per-node `timeout`: the node itself must
                // outlive the gate so the auto action can still run.
                FieldSpec::optional(
                    "timeout_seconds",
                    "Response Timeout (seconds)",
                    FieldType::Number,
                    json!(DEFAULT_GATE_TIMEOUT_SECS),
                ),
                FieldSpec::optional(
                    "auto_action",
                    "On Timeout",
                    FieldType::Select {
                        options: vec!["approve".into(), "reject".into(), "skip".into()],
                    },
                    json!("reject"),
                ),
            ],
            input_handles: standard_input(),
            output_handles: vec![
                HandleSpec::new("approved", "Approved", DataType::Passthrough),
                HandleSpec::new("rejected", "Rejected", DataType::Passthrough),
            ],
            accepts: standard_accepts(),
        }
    }

    fn validate_config(&self, cfg: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        config::require_str(cfg, "message", &mut errors);
        if let Some(auto) = config::str_field(cfg, "auto_action") {
            if !["approve", "reject", "skip"].contains(&auto) {
                errors.push(format!("unknown auto_action '{auto}'"));
            }
        }
        errors
    }

    async fn execute(
        &self,
        input: Vec<NodeItem>,
        cfg: &Value,
        ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        let Some(gate) = ctx.human_gate() else {
            return NodeExecutionResult::failure("human gate not available");
        };

        let auto_action = match config::str_field(cfg, "auto_action") {
            Some("approve") => AutoAction::Approve,
            Some("skip") => AutoAction::Skip,
            _ => AutoAction::Reject,
        };
        let spec = HitlGateSpec {
            request_type: HitlRequestType::Approval,
            title: config::str_field(cfg, "title")
                .unwrap_or("Approval Required")
                .to_owned(),
            message: config::str_field(cfg, "message").unwrap_or_default().to_owned(),
            options: cfg
                .get("options")
                .and_then(Value::as_array)
                .map_or_else(
                    || vec!["approve".to_owned(), "reject".to_owned()],
                    |options| {
                        options
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_owned)
                            .collect()
                    },
                ),
            context_data: cfg
                .get("context_data")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_else(Map::new),
            timeout: Duration::from_secs(
                config::u64_field(cfg, "timeout_seconds").unwrap_or(DEFAULT_GATE_TIMEOUT_SECS),
            ),
            auto_action,
        };

        let outcome = gate.ask_human(ctx, spec).await;
        let approved = matches!(outcome.action, HitlAction::Approve | HitlAction::Answer);

        let mut items = input;
        items.push(NodeItem::new(json!({
            "action": outcome.action,
            "timed_out": outcome.timed_out,
            "value": outcome.value,
        })));

        NodeExecutionResult::from_items(items)
            .on_handle(if approved { "approved" } else { "rejected" })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use skein_core::{ExecutionId, UserId, WorkflowId};
    use skein_execution::{ContextConfig, HitlOutcome, HumanGate, SubworkflowRunner};

    use super::*;

    struct FixedGate(HitlAction, bool);

    #[async_trait]
    impl HumanGate for FixedGate {
        async fn ask_human(&self, _ctx: &ExecutionContext, _spec: HitlGateSpec) -> HitlOutcome {
            HitlOutcome {
                action: self.0,
                value: None,
                timed_out: self.1,
            }
        }
    }

    struct NoSubworkflows;

    #[async_trait]
    impl SubworkflowRunner for NoSubworkflows {
        async fn run_subworkflow(
            &self,
            _ctx: &ExecutionContext,
            _config: &Value,
            _input: Vec<NodeItem>,
        ) -> NodeExecutionResult {
            NodeExecutionResult::failure("unused")
        }
    }

    fn ctx_with_gate(action: HitlAction, timed_out: bool) -> ExecutionContext {
        ExecutionContext::new(ContextConfig::root(
            ExecutionId::v4(),
            UserId::v4(),
            WorkflowId::v4(),
        ))
        .with_seams(Arc::new(NoSubworkflows), Arc::new(FixedGate(action, timed_out)))
    }

    #[tokio::test]
    async fn approval_takes_approved_branch() {
        let ctx = ctx_with_gate(HitlAction::Approve, false);
        let result = ApprovalNode
            .execute(Vec::new(), &json!({"message": "ok?"}), &ctx)
            .await;
        assert_eq!(result.output_handle, "approved");
        assert!(result.success);
    }

    #[tokio::test]
    async fn rejection_takes_rejected_branch() {
        let ctx = ctx_with_gate(HitlAction::Reject, true);
        let result = ApprovalNode
            .execute(Vec::new(), &json!({"message": "ok?"}), &ctx)
            .await;
        assert_eq!(result.output_handle, "rejected");
        assert_eq!(result.items[0].json["timed_out"], json!(true));
    }

    #[tokio::test]
    async fn missing_gate_fails_node() {
        let ctx = ExecutionContext::new(ContextConfig::root(
            ExecutionId::v4(),
            UserId::v4(),
            WorkflowId::v4(),
        ));
        let result = ApprovalNode
            .execute(Vec::new(), &json!({"message": "ok?"}), &ctx)
            .await;
        assert!(!result.success);
    }

    #[test]
    fn message_required() {
        let errors = ApprovalNode.validate_config(&json!({}));
        assert_eq!(errors, vec!["'message' is required".to_owned()]);
    }
}
