//! The canonical inter-node data shape.
//!
//! Node output is always a *list of items*, each item carrying a `json`
//! payload (and optionally binary attachments and item lineage). Handlers
//! are allowed to return looser shapes — a bare object, a bare list of
//! objects, a scalar — and [`items_from_value`] normalises them on ingress
//! so a single shape flows through the engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Back-reference from an output item to the input item it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedItem {
    /// Index of the source item in the node's input list.
    pub item: usize,
}

/// A single unit of data flowing between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeItem {
    /// The JSON payload of this item.
    pub json: Value,
    /// Optional binary attachments keyed by property name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<Map<String, Value>>,
    /// Optional lineage back to the input item this was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<PairedItem>,
}

impl NodeItem {
    /// Create an item from a JSON payload.
    #[must_use]
    pub fn new(json: Value) -> Self {
        Self {
            json,
            binary: None,
            paired_item: None,
        }
    }

    /// Attach lineage to this item.
    #[must_use]
    pub fn paired_with(mut self, index: usize) -> Self {
        self.paired_item = Some(PairedItem { item: index });
        self
    }
}

/// Normalise an arbitrary handler output into the canonical items list.
///
/// Rules (in order):
/// - a list: each element is normalised individually;
/// - an object that already looks like an item (has a `json` key): kept;
/// - any other object: wrapped as `{json: object}`;
/// - `null`: produces an empty list;
/// - any scalar: wrapped as `{json: {"value": scalar}}`.
#[must_use]
pub fn items_from_value(value: Value) -> Vec<NodeItem> {
    match value {
        Value::Array(elements) => elements.into_iter().map(wrap_one).collect(),
        Value::Null => Vec::new(),
        other => vec![wrap_one(other)],
    }
}

fn wrap_one(value: Value) -> NodeItem {
    match value {
        Value::Object(map) if map.contains_key("json") => {
            // Already item-shaped; pick up binary/pairing if present.
            let json = map.get("json").cloned().unwrap_or(Value::Null);
            let binary = map
                .get("binary")
                .and_then(Value::as_object)
                .cloned();
            let paired_item = map
                .get("paired_item")
                .and_then(|p| serde_json::from_value(p.clone()).ok());
            NodeItem {
                json,
                binary,
                paired_item,
            }
        }
        Value::Object(map) => NodeItem::new(Value::Object(map)),
        scalar => NodeItem::new(json!({ "value": scalar })),
    }
}

/// Collapse an items list back into a plain JSON value (a list of the items'
/// full shapes) for persistence and event payloads.
#[must_use]
pub fn items_to_value(items: &[NodeItem]) -> Value {
    serde_json::to_value(items).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn bare_object_is_wrapped() {
        let items = items_from_value(json!({"a": 1}));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].json, json!({"a": 1}));
    }

    #[test]
    fn item_shaped_object_is_kept() {
        let items = items_from_value(json!({"json": {"a": 1}}));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].json, json!({"a": 1}));
    }

    #[test]
    fn list_elements_are_wrapped_individually() {
        let items = items_from_value(json!([{"a": 1}, {"json": {"b": 2}}]));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].json, json!({"a": 1}));
        assert_eq!(items[1].json, json!({"b": 2}));
    }

    #[test]
    fn scalar_becomes_value_object() {
        let items = items_from_value(json!(42));
        assert_eq!(items[0].json, json!({"value": 42}));
    }

    #[test]
    fn null_becomes_empty_list() {
        assert!(items_from_value(Value::Null).is_empty());
    }

    #[test]
    fn paired_item_survives_wrapping() {
        let items = items_from_value(json!({"json": {"x": 1}, "paired_item": {"item": 3}}));
        assert_eq!(items[0].paired_item, Some(PairedItem { item: 3 }));
    }

    #[test]
    fn serde_roundtrip() {
        let item = NodeItem::new(json!({"k": "v"})).paired_with(0);
        let encoded = serde_json::to_string(&item).unwrap();
        let back: NodeItem = serde_json::from_str(&encoded).unwrap();
        assert_eq!(back, item);
    }
}
