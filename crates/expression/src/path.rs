//! Dotted-path tokenizer and JSON traversal.
//!
//! Paths interleave dot keys, numeric indices and quoted bracket keys:
//! `a.b`, `a[0]`, `a["key"]`, `a['key']`, `data[0].id`. Keys in dot
//! position are word characters (`[A-Za-z0-9_]`); anything else must use the
//! bracket form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a path. Serializes untagged: keys as strings, indices as
/// numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

impl PathSegment {
    /// Convenience constructor for a key segment.
    #[must_use]
    pub fn key(k: impl Into<String>) -> Self {
        Self::Key(k.into())
    }
}

/// Tokenize a dotted path. Malformed stretches (an unterminated bracket, an
/// empty key) end the path at that point; what parsed so far is returned.
#[must_use]
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let bytes = path.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'.' => i += 1,
            b'[' => {
                let Some((segment, next)) = parse_bracket(path, i) else {
                    break;
                };
                segments.push(segment);
                i = next;
            }
            _ => {
                let start = i;
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                if i == start {
                    break; // unexpected character
                }
                segments.push(PathSegment::Key(path[start..i].to_owned()));
            }
        }
    }
    segments
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Render a path back to its dotted form, for diagnostics.
#[must_use]
pub fn format_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
            PathSegment::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// Parse `[123]`, `["key"]` or `['key']` starting at the `[`.
/// Returns the segment and the index just past the `]`.
fn parse_bracket(path: &str, open: usize) -> Option<(PathSegment, usize)> {
    let inner_start = open + 1;
    let bytes = path.as_bytes();
    let mut i = inner_start;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }

    match bytes.get(i) {
        Some(&q @ (b'"' | b'\'')) => {
            let key_start = i + 1;
            let key_end = path[key_start..].find(q as char)? + key_start;
            let close = path[key_end + 1..].find(']')? + key_end + 1;
            Some((
                PathSegment::Key(path[key_start..key_end].to_owned()),
                close + 1,
            ))
        }
        Some(b) if b.is_ascii_digit() => {
            let digit_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let index: usize = path[digit_start..i].parse().ok()?;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if bytes.get(i) == Some(&b']') {
                Some((PathSegment::Index(index), i + 1))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Walk `value` along `segments`.
///
/// The one non-obvious rule: when the current value is an *items list* (an
/// array whose first element is an object carrying a `json` key) and the
/// next segment is a key, traversal dives into the first item — `json`
/// itself maps to the first item's payload, any other key is looked up
/// inside that payload. This is what makes `$node['A'].json.field` work for
/// single- and multi-item outputs alike.
#[must_use]
pub fn walk<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<Value> {
    let mut current: &'a Value = value;

    for segment in segments {
        match segment {
            PathSegment::Index(i) => {
                current = current.as_array()?.get(*i)?;
            }
            PathSegment::Key(key) => {
                if let Value::Array(elements) = current {
                    // Items-list auto-dive.
                    let first = elements.first()?;
                    let json = first.as_object()?.get("json")?;
                    if key == "json" {
                        current = json;
                    } else {
                        current = json.as_object()?.get(key)?;
                    }
                } else {
                    current = current.as_object()?.get(key)?;
                }
            }
        }
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn dots_and_words() {
        assert_eq!(
            parse_path("a.b.c"),
            vec![
                PathSegment::key("a"),
                PathSegment::key("b"),
                PathSegment::key("c")
            ]
        );
    }

    #[test]
    fn numeric_index() {
        assert_eq!(
            parse_path("data[0].id"),
            vec![
                PathSegment::key("data"),
                PathSegment::Index(0),
                PathSegment::key("id")
            ]
        );
    }

    #[test]
    fn quoted_bracket_keys() {
        assert_eq!(
            parse_path(r#"a["complex key"]['other']"#),
            vec![
                PathSegment::key("a"),
                PathSegment::key("complex key"),
                PathSegment::key("other")
            ]
        );
    }

    #[test]
    fn unterminated_bracket_truncates() {
        assert_eq!(parse_path("a[0"), vec![PathSegment::key("a")]);
    }

    #[test]
    fn empty_path_is_empty() {
        assert!(parse_path("").is_empty());
    }

    #[test]
    fn walk_plain_object() {
        let v = json!({"a": {"b": [10, 20]}});
        assert_eq!(walk(&v, &parse_path("a.b[1]")), Some(json!(20)));
    }

    #[test]
    fn walk_missing_key_is_none() {
        let v = json!({"a": 1});
        assert_eq!(walk(&v, &parse_path("b")), None);
    }

    #[test]
    fn walk_empty_path_clones_value() {
        let v = json!({"a": 1});
        assert_eq!(walk(&v, &[]), Some(v.clone()));
    }

    #[test]
    fn walk_items_list_dives_into_first_json() {
        let items = json!([{"json": {"message": "hi", "data": {"score": 95}}}]);
        assert_eq!(
            walk(&items, &parse_path("json.data.score")),
            Some(json!(95))
        );
        // Key lookup without the explicit `json` step dives too.
        assert_eq!(walk(&items, &parse_path("message")), Some(json!("hi")));
    }

    #[test]
    fn walk_items_list_with_index_stays_literal() {
        let items = json!([{"json": {"x": 1}}, {"json": {"x": 2}}]);
        assert_eq!(walk(&items, &parse_path("[1].json.x")), Some(json!(2)));
    }

    #[test]
    fn walk_non_items_array_with_key_is_none() {
        let v = json!([1, 2, 3]);
        assert_eq!(walk(&v, &parse_path("x")), None);
    }

    #[test]
    fn walk_empty_items_list_is_none() {
        let v = json!([]);
        assert_eq!(walk(&v, &parse_path("x")), None);
    }
}
