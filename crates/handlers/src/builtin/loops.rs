//! Loop-family nodes: `loop` and `split_in_batches`.
//!
//! Both emit on the `loop` handle while iterating and on `done` when
//! finished. The engine increments `ctx` loop counters for these node types
//! and the orchestrator enforces the caps; the handlers only decide which
//! exit to take.

use async_trait::async_trait;
use serde_json::{Value, json};
use skein_core::{NodeItem, items_from_value, items_to_value};
use skein_execution::{ExecutionContext, NodeExecutionResult};

use crate::handler::{NodeHandler, config};
use crate::metadata::{
    DataType, FieldSpec, FieldType, HandleSpec, NodeCategory, NodeMetadata, standard_accepts,
    standard_input,
};

const DEFAULT_LOOP_MAX: u64 = 10;
const DEFAULT_BATCH_MAX: u64 = 100;

fn loop_handles() -> Vec<HandleSpec> {
    vec![
        HandleSpec::new("loop", "Loop", DataType::Passthrough),
        HandleSpec::new("done", "Done", DataType::Passthrough),
    ]
}

fn validate_positive(cfg: &Value, key: &str, errors: &mut Vec<String>) {
    if let Some(value) = cfg.get(key) {
        if value.as_u64().is_none_or(|n| n == 0) {
            errors.push(format!("'{key}' must be a positive integer"));
        }
    }
}

/// Repeats its downstream branch up to `max_loop_count` times.
#[derive(Debug, Default)]
pub struct LoopNode;

#[async_trait]
impl NodeHandler for LoopNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            node_type: "loop".to_owned(),
            display_name: "Loop".to_owned(),
            category: NodeCategory::Conditional,
            fields: vec![FieldSpec::optional(
                "max_loop_count",
                "Max Iterations",
                FieldType::Number,
                json!(DEFAULT_LOOP_MAX),
            )],
            input_handles: standard_input(),
            output_handles: loop_handles(),
            accepts: standard_accepts(),
        }
    }

    fn validate_config(&self, cfg: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        validate_positive(cfg, "max_loop_count", &mut errors);
        errors
    }

    async fn execute(
        &self,
        input: Vec<NodeItem>,
        cfg: &Value,
        ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        let max_loop = config::u64_field(cfg, "max_loop_count").unwrap_or(DEFAULT_LOOP_MAX);
        let current = ctx
            .current_node()
            .map_or(0, |node| ctx.loop_count(node.as_str()));

        let handle = if current < max_loop { "loop" } else { "done" };
        NodeExecutionResult::from_items(input).on_handle(handle)
    }
}

/// Slices the input items into batches, looping once per batch.
///
/// Cursor state lives in execution variables (`_cursor_<node>`,
/// `_items_<node>`); on `done` the originally captured items are emitted so
/// downstream nodes see the full set.
#[derive(Debug, Default)]
pub struct SplitInBatchesNode;

#[async_trait]
impl NodeHandler for SplitInBatchesNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            node_type: "split_in_batches".to_owned(),
            display_name: "Split In Batches".to_owned(),
            category: NodeCategory::Transform,
            fields: vec![
                FieldSpec::optional("batch_size", "Batch Size", FieldType::Number, json!(1)),
                FieldSpec::optional(
                    "max_loop_count",
                    "Max Iterations",
                    FieldType::Number,
                    json!(DEFAULT_BATCH_MAX),
                ),
            ],
            input_handles: standard_input(),
            output_handles: loop_handles(),
            accepts: standard_accepts(),
        }
    }

    fn validate_config(&self, cfg: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        validate_positive(cfg, "batch_size", &mut errors);
        validate_positive(cfg, "max_loop_count", &mut errors);
        errors
    }

    async fn execute(
        &self,
        input: Vec<NodeItem>,
        cfg: &Value,
        ctx: &ExecutionContext,
    ) -> NodeExecutionResult {
        let batch_size = config::u64_field(cfg, "batch_size").unwrap_or(1).max(1) as usize;
        let max_loop = config::u64_field(cfg, "max_loop_count").unwrap_or(DEFAULT_BATCH_MAX);
        let Some(node) = ctx.current_node() else {
            return NodeExecutionResult::from_items(input).on_handle("done");
        };

        let items_key = format!("_items_{node}");
        let cursor_key = format!("_cursor_{node}");

        // First entry captures the working set.
        let all_items = match ctx.variable(&items_key) {
            Some(stored) => items_from_value(stored),
            None => {
                ctx.set_variable(items_key.clone(), items_to_value(&input));
                input
            }
        };
        let cursor = ctx
            .variable(&cursor_key)
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        let exhausted = cursor >= all_items.len();
        let over_cap = ctx.loop_count(node.as_str()) >= max_loop;
        if exhausted || over_cap {
            return NodeExecutionResult::from_items(all_items).on_handle("done");
        }

        let batch: Vec<NodeItem> = all_items
            .iter()
            .skip(cursor)
            .take(batch_size)
            .cloned()
            .collect();
        ctx.set_variable(cursor_key, json!(cursor + batch_size));

        NodeExecutionResult::from_items(batch).on_handle("loop")
    }
}
