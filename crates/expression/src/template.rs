//! Template splitting: static text interleaved with `{{ … }}` expressions.
//!
//! Parsed once into [`TemplatePart`]s; rendering walks the parts. A template
//! whose entire content is a single expression is "whole" and preserves the
//! evaluated value's JSON type.

use crate::error::{ExpressionError, MAX_TEMPLATE_EXPRESSIONS};

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// Literal text copied through untouched.
    Static(String),
    /// The trimmed content between `{{` and `}}`.
    Expression(String),
}

/// A parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parse a template. Text without `{{` parses to a single static part.
    pub fn parse(source: impl Into<String>) -> Result<Self, ExpressionError> {
        let source = source.into();
        let mut parts = Vec::new();
        let mut expression_count = 0usize;
        let mut rest = source.as_str();
        let mut offset = 0usize;

        while let Some(open) = rest.find("{{") {
            let Some(close_rel) = rest[open + 2..].find("}}") else {
                return Err(ExpressionError::UnterminatedExpression {
                    offset: offset + open,
                });
            };
            if open > 0 {
                parts.push(TemplatePart::Static(rest[..open].to_owned()));
            }
            let body = rest[open + 2..open + 2 + close_rel].trim();
            parts.push(TemplatePart::Expression(body.to_owned()));
            expression_count += 1;
            if expression_count > MAX_TEMPLATE_EXPRESSIONS {
                return Err(ExpressionError::TooManyExpressions);
            }
            let consumed = open + 2 + close_rel + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Static(rest.to_owned()));
        }

        Ok(Self { source, parts })
    }

    /// The original template text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed parts.
    #[must_use]
    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Whether the template contains any expression at all.
    #[must_use]
    pub fn has_expressions(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, TemplatePart::Expression(_)))
    }

    /// When the whole template is exactly one expression (no surrounding
    /// text), return it. Whole-string templates keep the evaluated type.
    #[must_use]
    pub fn as_whole_expression(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [TemplatePart::Expression(expr)] => Some(expr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn plain_text_is_one_static_part() {
        let t = Template::parse("hello").unwrap();
        assert_eq!(t.parts(), &[TemplatePart::Static("hello".into())]);
        assert!(!t.has_expressions());
        assert_eq!(t.as_whole_expression(), None);
    }

    #[test]
    fn whole_expression_detected() {
        let t = Template::parse("{{ $vars.x }}").unwrap();
        assert_eq!(t.as_whole_expression(), Some("$vars.x"));
    }

    #[test]
    fn interpolation_splits_into_parts() {
        let t = Template::parse("Hi {{ $vars.name }}!").unwrap();
        assert_eq!(
            t.parts(),
            &[
                TemplatePart::Static("Hi ".into()),
                TemplatePart::Expression("$vars.name".into()),
                TemplatePart::Static("!".into()),
            ]
        );
        assert_eq!(t.as_whole_expression(), None);
    }

    #[test]
    fn surrounding_whitespace_makes_interpolation() {
        let t = Template::parse(" {{ $vars.x }}").unwrap();
        assert_eq!(t.as_whole_expression(), None);
    }

    #[test]
    fn adjacent_expressions() {
        let t = Template::parse("{{ $vars.a }}{{ $vars.b }}").unwrap();
        assert_eq!(
            t.parts(),
            &[
                TemplatePart::Expression("$vars.a".into()),
                TemplatePart::Expression("$vars.b".into()),
            ]
        );
    }

    #[test]
    fn unterminated_expression_errors_with_offset() {
        let err = Template::parse("abc {{ $vars.x").unwrap_err();
        assert_eq!(err, ExpressionError::UnterminatedExpression { offset: 4 });
    }

    #[test]
    fn empty_string_parses_to_no_parts() {
        let t = Template::parse("").unwrap();
        assert!(t.parts().is_empty());
    }
}
