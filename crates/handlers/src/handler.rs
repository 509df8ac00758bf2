//! The node handler contract.

use async_trait::async_trait;
use serde_json::Value;
use skein_core::NodeItem;
use skein_execution::{ExecutionContext, NodeExecutionResult};

use crate::metadata::NodeMetadata;

/// The code implementing one node type.
///
/// Handlers are stateless across invocations: everything per-run arrives
/// through the arguments. `execute` reports failures as a
/// [`NodeExecutionResult`] with `success = false` — it never panics and has
/// no `Err` channel; only the engine escalates failures. Long-running work
/// must honour `ctx.cancellation`.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Static description: palette info, config fields, handles, typing.
    fn metadata(&self) -> NodeMetadata;

    /// Pure, deterministic validation of a node config. An empty list means
    /// valid. The engine never executes a node whose config failed
    /// compilation.
    fn validate_config(&self, config: &Value) -> Vec<String>;

    /// Execute the node.
    ///
    /// `input` is the gathered items list, `config` has already had its
    /// expressions resolved, `ctx` carries per-run state and the
    /// cancellation token.
    async fn execute(
        &self,
        input: Vec<NodeItem>,
        config: &Value,
        ctx: &ExecutionContext,
    ) -> NodeExecutionResult;
}

/// Shared config-reading helpers for handler implementations.
pub(crate) mod config {
    use serde_json::Value;

    pub fn str_field<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
        config.get(key).and_then(Value::as_str)
    }

    pub fn u64_field(config: &Value, key: &str) -> Option<u64> {
        config.get(key).and_then(Value::as_u64)
    }

    pub fn bool_field(config: &Value, key: &str, default: bool) -> bool {
        config.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Require a non-empty string field, appending an error when absent.
    pub fn require_str(config: &Value, key: &str, errors: &mut Vec<String>) {
        if str_field(config, key).is_none_or(str::is_empty) {
            errors.push(format!("'{key}' is required"));
        }
    }
}
