//! Compile-time template discovery.
//!
//! The compiler walks every node config once and records the paths at which
//! template strings occur, so the engine only deep-copies and rewrites
//! configs that actually contain expressions.

use serde_json::Value;

use crate::path::PathSegment;

/// Find the paths of all string values containing `{{` in `config`.
///
/// Paths are emitted in a stable depth-first order: object keys in their
/// serialized order, array elements by index.
#[must_use]
pub fn find_template_paths(config: &Value) -> Vec<Vec<PathSegment>> {
    let mut found = Vec::new();
    let mut prefix = Vec::new();
    visit(config, &mut prefix, &mut found);
    found
}

fn visit(value: &Value, prefix: &mut Vec<PathSegment>, found: &mut Vec<Vec<PathSegment>>) {
    match value {
        Value::String(s) => {
            if s.contains("{{") {
                found.push(prefix.clone());
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                prefix.push(PathSegment::Key(key.clone()));
                visit(child, prefix, found);
                prefix.pop();
            }
        }
        Value::Array(elements) => {
            for (index, child) in elements.iter().enumerate() {
                prefix.push(PathSegment::Index(index));
                visit(child, prefix, found);
                prefix.pop();
            }
        }
        _ => {}
    }
}
