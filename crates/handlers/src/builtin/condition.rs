//! Branching nodes: `if` and `switch`.

use async_trait::async_trait;
use serde_json::{Value, json};
use skein_core::{NodeItem, items_to_value};
use skein_execution::{ExecutionContext, NodeExecutionResult};
use skein_expression::path::{parse_path, walk};

use crate::handler::{NodeHandler, config};
use crate::metadata::{
    DataType, FieldSpec, FieldType, HandleSpec, NodeCategory, NodeMetadata, standard_accepts,
    standard_input,
};

const OPERATORS: [&str; 7] = [
    "equals",
    "not_equals",
    "contains",
    "greater_than",
    "less_than",
    "is_empty",
    "is_not_empty",
];

/// Read `field` out of the first input item's payload (items auto-dive).
fn field_value(input: &[NodeItem], field: &str) -> Option<Value> {
    let items = items_to_value(input);
    walk(&items, &parse_path(field))
}

/// Loose stringification used for comparison, mirroring how the values were
/// authored in the editor.
fn loose_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn loose_num(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        _ => false,
    }
}

fn evaluate(operator: &str, field: Option<&Value>, compare: &Value) -> bool {
    match operator {
        "equals" => field.is_some_and(|v| loose_str(v) == loose_str(compare)),
        "not_equals" => field.is_none_or(|v| loose_str(v) != loose_str(compare)),
        "contains" => field.is_some_and(|v| loose_str(v).contains(&loose_str(compare))),
        "greater_than" => matches!(
            (field.and_then(loose_num), loose_num(compare)),
            (Some(a), Some(b)) if a > b
        ),
        "less_than" => matches!(
            (field.and_then(loose_num), loose_num(compare)),
            (Some(a), Some(b)) if a < b
        ),
        "is_empty" => is_empty(field),
        "is_not_empty" => !is_empty(field),
        _ => false,
    }
}

/// Two-way branch on a field comparison.
#[derive(Debug, Default)]
pub struct IfNode;

#[async_trait]
impl NodeHandler for IfNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            node_type: "if".to_owned(),
            display_name: "If".to_owned(),
            category: NodeCategory::Conditional,
            fields: vec![
                FieldSpec::required("field", "Field to Check", FieldType::String),
                FieldSpec::optional(
                    "operator",
                    "Operator",
                    FieldType::Select {
                        options: OPERATORS.iter().map(|o| (*o).to_owned()).collect(),
                    },
                    json!("equals"),
                ),
                FieldSpec::optional("value", "Value", FieldType::String, json!("")),
            ],
            input_handles: standard_input(),
            output_handles: vec![
                HandleSpec::new("true", "True", DataType::Passthrough),
                HandleSpec::new("false", "False", DataType::Passthrough),
            ],
            accepts: standard_accepts(),
        }
    }

    fn validate_config(&self, cfg: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        config::require_str(cfg, "field", &mut errors);
        if let Some(op) = config::str_field(cfg, "operator") {
            if !OPERATORS.contains(&op) {
                errors.push(format!("unknown operator '{op}'"));
            }
        }
        errors
    }

    async fn execute(
        &self,
        input: Vec<NodeItem>,
        cfg: &Value,
        _ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        let field = config::str_field(cfg, "field").unwrap_or_default();
        let operator = config::str_field(cfg, "operator").unwrap_or("equals");
        let compare = cfg.get("value").cloned().unwrap_or(Value::Null);

        let value = field_value(&input, field);
        let taken = evaluate(operator, value.as_ref(), &compare);

        NodeExecutionResult::from_items(input).on_handle(if taken { "true" } else { "false" })
    }
}

/// Multi-way branch: matches a field against configured case values.
///
/// Handles are `case_0`, `case_1`, … in case order, with `default` taken
/// when nothing matches.
#[derive(Debug, Default)]
pub struct SwitchNode;

#[async_trait]
impl NodeHandler for SwitchNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            node_type: "switch".to_owned(),
            display_name: "Switch".to_owned(),
            category: NodeCategory::Conditional,
            fields: vec![
                FieldSpec::required("field", "Field to Check", FieldType::String),
                FieldSpec::required("cases", "Cases", FieldType::Json),
            ],
            input_handles: standard_input(),
            output_handles: vec![HandleSpec::new("default", "Default", DataType::Passthrough)],
            accepts: standard_accepts(),
        }
    }

    fn validate_config(&self, cfg: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        config::require_str(cfg, "field", &mut errors);
        match cfg.get("cases") {
            Some(Value::Array(cases)) if !cases.is_empty() => {}
            Some(Value::Array(_)) => errors.push("'cases' must not be empty".to_owned()),
            _ => errors.push("'cases' must be an array".to_owned()),
        }
        errors
    }

    async fn execute(
        &self,
        input: Vec<NodeItem>,
        cfg: &Value,
        _ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        let field = config::str_field(cfg, "field").unwrap_or_default();
        let cases = cfg
            .get("cases")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let value = field_value(&input, field);
        let handle = value
            .as_ref()
            .and_then(|v| {
                cases
                    .iter()
                    .position(|case| loose_str(case) == loose_str(v))
            })
            .map_or_else(|| "default".to_owned(), |index| format!("case_{index}"));

        NodeExecutionResult::from_items(input).on_handle(handle)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
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

    #[rstest]
    #[case(json!({"v": "yes"}), "equals", json!("yes"), "true")]
    #[case(json!({"v": "no"}), "equals", json!("yes"), "false")]
    #[case(json!({"v": "no"}), "not_equals", json!("yes"), "true")]
    #[case(json!({"v": "hello world"}), "contains", json!("world"), "true")]
    #[case(json!({"v": 10}), "greater_than", json!(5), "true")]
    #[case(json!({"v": 10}), "greater_than", json!("50"), "false")]
    #[case(json!({"v": 3}), "less_than", json!(5), "true")]
    #[case(json!({"v": ""}), "is_empty", json!(null), "true")]
    #[case(json!({"v": "x"}), "is_not_empty", json!(null), "true")]
    #[tokio::test]
    async fn if_operator_table(
        #[case] data: Value,
        #[case] operator: &str,
        #[case] value: Value,
        #[case] expected: &str,
    ) {
        let result = IfNode
            .execute(
                items_from_value(data),
                &json!({"field": "v", "operator": operator, "value": value}),
                &ctx(),
            )
            .await;
        assert_eq!(result.output_handle, expected);
        assert!(result.success);
    }

    #[tokio::test]
    async fn missing_field_compares_false_on_equals() {
        let result = IfNode
            .execute(
                items_from_value(json!({"other": 1})),
                &json!({"field": "v", "operator": "equals", "value": "x"}),
                &ctx(),
            )
            .await;
        assert_eq!(result.output_handle, "false");
    }

    #[tokio::test]
    async fn if_passes_input_through() {
        let input = items_from_value(json!({"v": "yes"}));
        let result = IfNode
            .execute(
                input.clone(),
                &json!({"field": "v", "operator": "equals", "value": "yes"}),
                &ctx(),
            )
            .await;
        assert_eq!(result.items, input);
    }

    #[tokio::test]
    async fn switch_picks_matching_case() {
        let result = SwitchNode
            .execute(
                items_from_value(json!({"color": "green"})),
                &json!({"field": "color", "cases": ["red", "green", "blue"]}),
                &ctx(),
            )
            .await;
        assert_eq!(result.output_handle, "case_1");
    }

    #[tokio::test]
    async fn switch_falls_back_to_default() {
        let result = SwitchNode
            .execute(
                items_from_value(json!({"color": "mauve"})),
                &json!({"field": "color", "cases": ["red", "green"]}),
                &ctx(),
            )
            .await;
        assert_eq!(result.output_handle, "default");
    }

    #[test]
    fn switch_requires_cases() {
        assert!(
            SwitchNode
                .validate_config(&json!({"field": "x"}))
                .contains(&"'cases' must be an array".to_owned())
        );
        assert!(
            SwitchNode
                .validate_config(&json!({"field": "x", "cases": []}))
                .contains(&"'cases' must not be empty".to_owned())
        );
    }
}
