//! Evaluation scope: what an expression can see.
//!
//! The engine implements [`ExpressionScope`] on its execution context; tests
//! and standalone evaluation use [`MapScope`].

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Read-only view of the data an expression may reference.
pub trait ExpressionScope {
    /// Output of a node, addressed by node *id*.
    fn output_of(&self, node_id: &str) -> Option<Value>;

    /// Resolve an exact node label to its id.
    fn id_for_label(&self, label: &str) -> Option<String>;

    /// Resolve a label ignoring case. Called only as a last resort after the
    /// exact-label and exact-id lookups both miss.
    fn id_for_label_ci(&self, label: &str) -> Option<String>;

    /// An execution variable by name.
    fn variable(&self, name: &str) -> Option<Value>;

    /// The current node's input items, as a JSON array of items.
    fn current_input(&self) -> Value;
}

/// A scope backed by plain maps.
#[derive(Debug, Clone, Default)]
pub struct MapScope {
    /// node id → output value (canonically an items array).
    pub node_outputs: HashMap<String, Value>,
    /// node label → node id.
    pub node_label_to_id: HashMap<String, String>,
    /// execution variables.
    pub variables: Map<String, Value>,
    /// the current node's input items.
    pub current_input: Value,
}

impl ExpressionScope for MapScope {
    fn output_of(&self, node_id: &str) -> Option<Value> {
        self.node_outputs.get(node_id).cloned()
    }

    fn id_for_label(&self, label: &str) -> Option<String> {
        self.node_label_to_id.get(label).cloned()
    }

    fn id_for_label_ci(&self, label: &str) -> Option<String> {
        let lowered = label.to_lowercase();
        self.node_label_to_id
            .iter()
            .find(|(l, _)| l.to_lowercase() == lowered)
            .map(|(_, id)| id.clone())
    }

    fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn current_input(&self) -> Value {
        self.current_input.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn scope() -> MapScope {
        let mut s = MapScope::default();
        s.node_outputs.insert("n1".into(), json!([{"json": {}}]));
        s.node_label_to_id.insert("First Step".into(), "n1".into());
        s
    }

    #[test]
    fn exact_label_lookup() {
        assert_eq!(scope().id_for_label("First Step"), Some("n1".into()));
        assert_eq!(scope().id_for_label("first step"), None);
    }

    #[test]
    fn case_insensitive_lookup() {
        assert_eq!(scope().id_for_label_ci("FIRST STEP"), Some("n1".into()));
        assert_eq!(scope().id_for_label_ci("missing"), None);
    }

    #[test]
    fn output_by_id() {
        assert!(scope().output_of("n1").is_some());
        assert!(scope().output_of("nope").is_none());
    }
}
