//! Expression parsing errors.
//!
//! Evaluation itself is infallible — missing data degrades to `null` plus
//! a warning. Errors here are structural: a template that cannot be parsed
//! at all.

use thiserror::Error;

/// Maximum number of `{{ … }}` expressions allowed in a single template.
pub const MAX_TEMPLATE_EXPRESSIONS: usize = 1000;

/// Errors raised while parsing a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    /// A `{{` with no matching `}}`.
    #[error("unterminated expression starting at offset {offset}")]
    UnterminatedExpression {
        /// Byte offset of the opening `{{`.
        offset: usize,
    },

    /// The template contains more expressions than the safety ceiling.
    #[error("template contains more than {MAX_TEMPLATE_EXPRESSIONS} expressions")]
    TooManyExpressions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unterminated_display_names_offset() {
        let err = ExpressionError::UnterminatedExpression { offset: 7 };
        assert_eq!(
            err.to_string(),
            "unterminated expression starting at offset 7"
        );
    }
}
