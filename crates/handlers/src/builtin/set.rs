//! The `set` node: create or overwrite data fields.

use async_trait::async_trait;
use serde_json::{Map, Value};
use skein_core::NodeItem;
use skein_execution::{ExecutionContext, NodeExecutionResult};

use crate::handler::{NodeHandler, config};
use crate::metadata::{
    DataType, FieldSpec, FieldType, HandleSpec, NodeCategory, NodeMetadata, standard_accepts,
    standard_input,
};

/// Sets key/value pairs, optionally merged over the incoming data.
#[derive(Debug, Default)]
pub struct SetNode;

#[async_trait]
impl NodeHandler for SetNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            node_type: "set".to_owned(),
            display_name: "Set".to_owned(),
            category: NodeCategory::Transform,
            fields: vec![
                FieldSpec::optional("values", "Values", FieldType::Json, Value::Object(Map::new())),
                FieldSpec::optional(
                    "keep_input",
                    "Keep Input Data",
                    FieldType::Boolean,
                    Value::Bool(true),
                ),
            ],
            input_handles: standard_input(),
            output_handles: vec![HandleSpec::new("output", "Output", DataType::Json)],
            accepts: standard_accepts(),
        }
    }

    fn validate_config(&self, config: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(values) = config.get("values") {
            if !values.is_object() {
                errors.push("'values' must be an object".to_owned());
            }
        }
        errors
    }

    async fn execute(
        &self,
        input: Vec<NodeItem>,
        config: &Value,
        _ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        let values = config
            .get("values")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let keep_input = config::bool_field(config, "keep_input", true);

        // With no input, a set node still produces one item of its values.
        if input.is_empty() {
            return NodeExecutionResult::from_items(vec![NodeItem::new(Value::Object(values))]);
        }

        let items = input
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let json = if keep_input {
                    let mut merged = item.json.as_object().cloned().unwrap_or_default();
                    merged.extend(values.clone());
                    Value::Object(merged)
                } else {
                    Value::Object(values.clone())
                };
                NodeItem::new(json).paired_with(index)
            })
            .collect();
        NodeExecutionResult::from_items(items)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
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
    async fn merges_over_input_by_default() {
        let input = items_from_value(json!({"a": 1, "x": "old"}));
        let result = SetNode
            .execute(input, &json!({"values": {"x": "new", "y": 2}}), &ctx())
            .await;
        assert_eq!(result.items[0].json, json!({"a": 1, "x": "new", "y": 2}));
    }

    #[tokio::test]
    async fn replaces_when_keep_input_false() {
        let input = items_from_value(json!({"a": 1}));
        let result = SetNode
            .execute(
                input,
                &json!({"values": {"x": 1}, "keep_input": false}),
                &ctx(),
            )
            .await;
        assert_eq!(result.items[0].json, json!({"x": 1}));
    }

    #[tokio::test]
    async fn empty_input_produces_one_item() {
        let result = SetNode
            .execute(Vec::new(), &json!({"values": {"x": 1}}), &ctx())
            .await;
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].json, json!({"x": 1}));
    }

    #[tokio::test]
    async fn maps_every_input_item() {
        let input = items_from_value(json!([{"i": 1}, {"i": 2}]));
        let result = SetNode
            .execute(input, &json!({"values": {"tag": "t"}}), &ctx())
            .await;
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[1].json, json!({"i": 2, "tag": "t"}));
        assert_eq!(result.items[1].paired_item.map(|p| p.item), Some(1));
    }

    #[test]
    fn rejects_non_object_values() {
        let errors = SetNode.validate_config(&json!({"values": [1, 2]}));
        assert_eq!(errors, vec!["'values' must be an object".to_owned()]);
    }
}
