#![warn(missing_docs)]

//! # Skein Expression
//!
//! The `{{ … }}` template language used inside node configurations.
//!
//! A config string may be a *whole-string template* (`"{{ $node['A'].json.x }}"`,
//! the evaluated value keeps its JSON type) or an *interpolation*
//! (`"Hi {{ $vars.name }}!"`, evaluated values are stringified and missing
//! values become the empty string). Expressions reference:
//!
//! - `$node[<label-or-id>].<path>` / `$node.<label-or-id>.<path>` — another
//!   node's output. Label lookup order: exact label, exact node id,
//!   case-insensitive label (last resort).
//! - `$json.<path>` / `$input.<path>` — the current node's input items.
//! - `$vars.<name>.<path>` — an execution variable.
//!
//! Paths interleave dot keys, numeric indices and quoted bracket keys
//! (`a.b[0]["k"]['k']`). When a path meets an items list and the next token
//! is not an index, evaluation dives into the first item's `json` payload,
//! so `$node['A'].json.field` works whether the output is one item or many.
//!
//! Missing nodes and missing paths never fail a node: they evaluate to
//! `null` and surface as [`ResolutionWarning`]s. The parser is hand-written
//! (no regexes); the template structure is parsed once and reused.

pub mod analyze;
pub mod ast;
pub mod error;
pub mod path;
pub mod resolver;
pub mod scope;
pub mod template;

pub use analyze::find_template_paths;
pub use ast::Expr;
pub use error::ExpressionError;
pub use path::PathSegment;
pub use resolver::{Resolved, ResolutionWarning, resolve_config, resolve_str};
pub use scope::{ExpressionScope, MapScope};
pub use template::{Template, TemplatePart};
