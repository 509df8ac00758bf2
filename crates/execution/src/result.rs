//! What a node handler returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_core::{NodeItem, items_from_value};

/// The default output handle for non-branching nodes.
pub const OUTPUT_HANDLE: &str = "output";
/// The conventional error handle.
pub const ERROR_HANDLE: &str = "error";

/// Result of executing one node.
///
/// `output_handle` drives conditional routing: `"output"`/`"success"` for
/// plain nodes, `"true"`/`"false"` for `if`, `"loop"`/`"done"` for the loop
/// family, and arbitrary labels where edges reference them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    /// Whether the handler considers the node to have succeeded.
    pub success: bool,
    /// Output items (canonical shape; wrapped on construction).
    pub items: Vec<NodeItem>,
    /// Error description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The exit this result leaves through.
    pub output_handle: String,
}

impl NodeExecutionResult {
    /// A successful result on the default handle.
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            items: items_from_value(data),
            error: None,
            output_handle: OUTPUT_HANDLE.to_owned(),
        }
    }

    /// A successful result from already-shaped items.
    #[must_use]
    pub fn from_items(items: Vec<NodeItem>) -> Self {
        Self {
            success: true,
            items,
            error: None,
            output_handle: OUTPUT_HANDLE.to_owned(),
        }
    }

    /// A failed result on the error handle.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            error: Some(error.into()),
            output_handle: ERROR_HANDLE.to_owned(),
        }
    }

    /// Override the output handle.
    #[must_use]
    pub fn on_handle(mut self, handle: impl Into<String>) -> Self {
        self.output_handle = handle.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn success_wraps_bare_object() {
        let result = NodeExecutionResult::success(json!({"a": 1}));
        assert!(result.success);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].json, json!({"a": 1}));
        assert_eq!(result.output_handle, "output");
    }

    #[test]
    fn failure_uses_error_handle() {
        let result = NodeExecutionResult::failure("boom");
        assert!(!result.success);
        assert_eq!(result.output_handle, "error");
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.items.is_empty());
    }

    #[test]
    fn on_handle_overrides() {
        let result = NodeExecutionResult::success(json!({})).on_handle("true");
        assert_eq!(result.output_handle, "true");
    }
}
