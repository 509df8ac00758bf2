//! Expression AST and parser.
//!
//! An expression is the trimmed content between `{{` and `}}`. Three
//! reference forms exist; anything else is [`Expr::Unsupported`], which
//! evaluates to `null` with a warning rather than failing the node.

use crate::path::{PathSegment, parse_path};

/// A parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `$node[<label-or-id>].<path>` or `$node.<label-or-id>.<path>`.
    NodeRef {
        /// The label or node id being referenced.
        label: String,
        /// Path into the node's output.
        path: Vec<PathSegment>,
    },
    /// `$json.<path>` or `$input.<path>` — the current node's input items.
    InputRef {
        /// Path into the input items.
        path: Vec<PathSegment>,
    },
    /// `$vars.<name>.<path>` — an execution variable.
    VarRef {
        /// Variable name (first path token).
        name: String,
        /// Remaining path into the variable's value.
        path: Vec<PathSegment>,
    },
    /// Anything the grammar does not cover.
    Unsupported {
        /// The raw expression text, for diagnostics.
        raw: String,
    },
}

impl Expr {
    /// Parse a single expression.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(rest) = trimmed.strip_prefix("$node") {
            if let Some(expr) = parse_node_ref(rest) {
                return expr;
            }
        } else if let Some(rest) = strip_input_prefix(trimmed) {
            return Self::InputRef {
                path: parse_path(rest),
            };
        } else if let Some(rest) = trimmed.strip_prefix("$vars.") {
            let mut segments = parse_path(rest);
            if !segments.is_empty() {
                let PathSegment::Key(name) = segments.remove(0) else {
                    return Self::Unsupported {
                        raw: trimmed.to_owned(),
                    };
                };
                return Self::VarRef {
                    name,
                    path: segments,
                };
            }
        }

        Self::Unsupported {
            raw: trimmed.to_owned(),
        }
    }
}

/// `$json`/`$input` share semantics; strip either prefix plus the separator.
fn strip_input_prefix(expr: &str) -> Option<&str> {
    for prefix in ["$json", "$input"] {
        if let Some(rest) = expr.strip_prefix(prefix) {
            return match rest.as_bytes().first() {
                None => Some(""),
                Some(b'.') => Some(&rest[1..]),
                Some(b'[') => Some(rest),
                Some(_) => None, // e.g. `$jsonish` — not ours
            };
        }
    }
    None
}

/// Parse the tail of a `$node` reference: `["Label"].path`, `['Label'].path`
/// or `.Label.path`. Dot-style labels allow word characters and dashes.
fn parse_node_ref(rest: &str) -> Option<Expr> {
    let bytes = rest.as_bytes();
    match bytes.first()? {
        b'[' => {
            let inner = rest[1..].trim_start();
            let quote = *inner.as_bytes().first()?;
            if quote != b'"' && quote != b'\'' {
                return None;
            }
            let label_end = inner[1..].find(quote as char)? + 1;
            let label = inner[1..label_end].to_owned();
            let after_quote = inner[label_end + 1..].trim_start();
            let close = after_quote.strip_prefix(']')?;
            let path_text = close.strip_prefix('.').unwrap_or(close);
            Some(Expr::NodeRef {
                label,
                path: parse_path(path_text),
            })
        }
        b'.' => {
            let tail = &rest[1..];
            let label_len = tail
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-')
                .count();
            if label_len == 0 {
                return None;
            }
            let label = tail[..label_len].to_owned();
            let path_text = tail[label_len..].strip_prefix('.').unwrap_or(&tail[label_len..]);
            Some(Expr::NodeRef {
                label,
                path: parse_path(path_text),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::path::PathSegment;

    #[rstest]
    #[case(r#"$node["First"].json.data.score"#, "First")]
    #[case(r"$node['First'].json.data.score", "First")]
    #[case(r"$node.First.json.data.score", "First")]
    fn node_ref_forms(#[case] raw: &str, #[case] label: &str) {
        let Expr::NodeRef { label: l, path } = Expr::parse(raw) else {
            panic!("expected NodeRef");
        };
        assert_eq!(l, label);
        assert_eq!(
            path,
            vec![
                PathSegment::key("json"),
                PathSegment::key("data"),
                PathSegment::key("score")
            ]
        );
    }

    #[test]
    fn node_ref_dashed_label() {
        let Expr::NodeRef { label, .. } = Expr::parse("$node.send-email.json") else {
            panic!("expected NodeRef");
        };
        assert_eq!(label, "send-email");
    }

    #[test]
    fn node_ref_without_path() {
        let Expr::NodeRef { label, path } = Expr::parse(r#"$node["A"]"#) else {
            panic!("expected NodeRef");
        };
        assert_eq!(label, "A");
        assert!(path.is_empty());
    }

    #[rstest]
    #[case("$json.message")]
    #[case("$input.message")]
    fn input_ref_forms(#[case] raw: &str) {
        let Expr::InputRef { path } = Expr::parse(raw) else {
            panic!("expected InputRef");
        };
        assert_eq!(path, vec![PathSegment::key("message")]);
    }

    #[test]
    fn input_ref_with_bracket_start() {
        let Expr::InputRef { path } = Expr::parse("$json[0].json.x") else {
            panic!("expected InputRef");
        };
        assert_eq!(path[0], PathSegment::Index(0));
    }

    #[test]
    fn bare_input_ref() {
        assert_eq!(Expr::parse("$input"), Expr::InputRef { path: vec![] });
    }

    #[test]
    fn var_ref_with_nested_path() {
        let Expr::VarRef { name, path } = Expr::parse("$vars.user.email") else {
            panic!("expected VarRef");
        };
        assert_eq!(name, "user");
        assert_eq!(path, vec![PathSegment::key("email")]);
    }

    #[rstest]
    #[case("1 + 2")]
    #[case("$unknown.thing")]
    #[case("$vars.")]
    #[case("$node")]
    fn unsupported_forms(#[case] raw: &str) {
        assert!(matches!(Expr::parse(raw), Expr::Unsupported { .. }));
    }
}
