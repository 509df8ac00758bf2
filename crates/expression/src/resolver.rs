//! Template resolution against a scope.
//!
//! Two entry points: [`resolve_str`] for one template string and
//! [`resolve_config`] for a config object with pre-analysed template paths.
//! Evaluation never fails a node — missing data yields `null` and a
//! [`ResolutionWarning`].

use serde_json::Value;

use crate::ast::Expr;
use crate::path::{PathSegment, format_path, walk};
use crate::scope::ExpressionScope;
use crate::template::{Template, TemplatePart};

/// A non-fatal problem encountered while resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionWarning {
    /// The expression text that produced the warning.
    pub expression: String,
    /// Human-readable description.
    pub message: String,
}

/// The outcome of a resolution: the value plus any warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// The resolved value.
    pub value: Value,
    /// Warnings accumulated during resolution.
    pub warnings: Vec<ResolutionWarning>,
}

/// Resolve one template string.
///
/// Whole-string templates (`"{{ expr }}"`) keep the evaluated value's type;
/// interpolations stringify each expression, rendering missing values as the
/// empty string.
#[must_use]
pub fn resolve_str(text: &str, scope: &dyn ExpressionScope) -> Resolved {
    let template = match Template::parse(text) {
        Ok(t) => t,
        Err(err) => {
            return Resolved {
                value: Value::String(text.to_owned()),
                warnings: vec![ResolutionWarning {
                    expression: text.to_owned(),
                    message: err.to_string(),
                }],
            };
        }
    };

    let mut warnings = Vec::new();

    if let Some(expr) = template.as_whole_expression() {
        let value = eval(expr, scope, &mut warnings);
        return Resolved { value, warnings };
    }

    let mut rendered = String::with_capacity(text.len());
    for part in template.parts() {
        match part {
            TemplatePart::Static(s) => rendered.push_str(s),
            TemplatePart::Expression(expr) => {
                let value = eval(expr, scope, &mut warnings);
                rendered.push_str(&stringify(&value));
            }
        }
    }
    Resolved {
        value: Value::String(rendered),
        warnings,
    }
}

/// Resolve the pre-analysed template paths inside a config object.
///
/// The config is deep-copied; only string values at the given paths are
/// replaced. Paths that no longer point at a string (the config changed
/// since analysis) are skipped.
#[must_use]
pub fn resolve_config(
    config: &Value,
    paths: &[Vec<PathSegment>],
    scope: &dyn ExpressionScope,
) -> Resolved {
    let mut resolved = config.clone();
    let mut warnings = Vec::new();

    for path in paths {
        let Some(Value::String(template)) = get_at(&resolved, path).cloned() else {
            continue;
        };
        let outcome = resolve_str(&template, scope);
        warnings.extend(outcome.warnings);
        set_at(&mut resolved, path, outcome.value);
    }

    Resolved {
        value: resolved,
        warnings,
    }
}

fn eval(expr_text: &str, scope: &dyn ExpressionScope, warnings: &mut Vec<ResolutionWarning>) -> Value {
    let mut warn = |message: String| {
        warnings.push(ResolutionWarning {
            expression: expr_text.to_owned(),
            message,
        });
    };

    match Expr::parse(expr_text) {
        Expr::NodeRef { label, path } => {
            // Lookup order: exact label, exact id, case-insensitive label.
            let node_id = scope
                .id_for_label(&label)
                .or_else(|| scope.output_of(&label).map(|_| label.clone()))
                .or_else(|| scope.id_for_label_ci(&label));

            let Some(output) = node_id.and_then(|id| scope.output_of(&id)) else {
                warn(format!("node '{label}' not found"));
                return Value::Null;
            };
            match walk(&output, &path) {
                Some(value) => value,
                None => {
                    warn(format!(
                        "path '{}' not found in node '{label}' output",
                        format_path(&path)
                    ));
                    Value::Null
                }
            }
        }
        Expr::InputRef { path } => {
            let input = scope.current_input();
            match walk(&input, &path) {
                Some(value) => value,
                None => {
                    warn(format!(
                        "path '{}' not found in current input",
                        format_path(&path)
                    ));
                    Value::Null
                }
            }
        }
        Expr::VarRef { name, path } => {
            let Some(value) = scope.variable(&name) else {
                warn(format!("variable '{name}' not set"));
                return Value::Null;
            };
            match walk(&value, &path) {
                Some(v) => v,
                None => {
                    warn(format!(
                        "path '{}' not found in variable '{name}'",
                        format_path(&path)
                    ));
                    Value::Null
                }
            }
        }
        Expr::Unsupported { raw } => {
            warn(format!("unsupported expression '{raw}'"));
            Value::Null
        }
    }
}

/// Interpolation rendering: nulls disappear, strings stay bare, everything
/// else uses its compact JSON form.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Literal (no items auto-dive) nested lookup, for config traversal.
fn get_at<'a>(value: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = match segment {
            PathSegment::Key(k) => current.as_object()?.get(k)?,
            PathSegment::Index(i) => current.as_array()?.get(*i)?,
        };
    }
    Some(current)
}

fn set_at(value: &mut Value, path: &[PathSegment], new_value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *value = new_value;
        return;
    };
    let mut current = value;
    for segment in parents {
        let next = match segment {
            PathSegment::Key(k) => current.as_object_mut().and_then(|o| o.get_mut(k)),
            PathSegment::Index(i) => current.as_array_mut().and_then(|a| a.get_mut(*i)),
        };
        match next {
            Some(v) => current = v,
            None => return,
        }
    }
    match last {
        PathSegment::Key(k) => {
            if let Some(obj) = current.as_object_mut() {
                obj.insert(k.clone(), new_value);
            }
        }
        PathSegment::Index(i) => {
            if let Some(slot) = current.as_array_mut().and_then(|a| a.get_mut(*i)) {
                *slot = new_value;
            }
        }
    }
}
