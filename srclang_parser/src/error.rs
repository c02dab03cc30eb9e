//! Parse error types

use crate::span::Span;
use std::fmt;
use thiserror::Error;

/// Parse error type
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    /// Unexpected token
    #[error("line {}: unexpected {found}, expected {expected}", .span.line)]
    UnexpectedToken {
        found: String,
        expected: String,
        span: Span,
    },

    /// Unexpected end of input
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    /// Integer literal out of range
    #[error("line {}: integer literal '{literal}' out of range", .span.line)]
    IntOutOfRange { literal: String, span: Span },

    /// Unrecognized character
    #[error("line {}: unrecognized token", .span.line)]
    LexerError { span: Span },
}

impl ParseError {
    /// Get the span of the error, if it has one
    pub fn span(&self) -> Option<&Span> {
        match self {
            ParseError::UnexpectedToken { span, .. } => Some(span),
            ParseError::UnexpectedEof { .. } => None,
            ParseError::IntOutOfRange { span, .. } => Some(span),
            ParseError::LexerError { span } => Some(span),
        }
    }

    /// Create an unexpected token error
    pub fn unexpected_token(
        found: impl Into<String>,
        expected: impl Into<String>,
        span: Span,
    ) -> Self {
        ParseError::UnexpectedToken {
            found: found.into(),
            expected: expected.into(),
            span,
        }
    }

    /// Create an unexpected EOF error
    pub fn unexpected_eof(expected: impl Into<String>) -> Self {
        ParseError::UnexpectedEof {
            expected: expected.into(),
        }
    }

    /// Format the error with the offending source line and a marker.
    pub fn format_with_context(&self, source: &str) -> String {
        let Some(span) = self.span() else {
            return String::new();
        };

        let lines: Vec<&str> = source.lines().collect();
        let line_idx = span.line.saturating_sub(1);
        if line_idx >= lines.len() {
            return String::new();
        }

        let line = lines[line_idx];
        let col = span.column.saturating_sub(1);
        let len = span.end.saturating_sub(span.start).max(1);
        let marker = "^".repeat(len.min(line.len().saturating_sub(col)).max(1));

        format!(
            "  {} | {}\n  {} | {}{}",
            span.line,
            line,
            " ".repeat(span.line.to_string().len()),
            " ".repeat(col),
            marker
        )
    }
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Collection of parse errors for error recovery
#[derive(Debug, Default)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    /// Create a new empty error collection
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error
    pub fn push(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Check if there are any errors
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Get all errors
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Get the first error
    pub fn first(&self) -> Option<&ParseError> {
        self.errors.first()
    }

    /// Iterate over errors
    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.errors.iter()
    }

    /// Format all errors with source context
    pub fn format_all(&self, source: &str) -> String {
        self.errors
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let context = e.format_with_context(source);
                if context.is_empty() {
                    format!("Error {}: {}", i + 1, e)
                } else {
                    format!("Error {}: {}\n{}", i + 1, e, context)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_token_display() {
        let span = Span::new(0, 3, 1, 1);
        let err = ParseError::unexpected_token("'var'", "an expression", span);
        assert!(err.to_string().contains("'var'"));
        assert!(err.to_string().contains("an expression"));
    }

    #[test]
    fn test_format_with_context() {
        let source = "var x: integer = 1;";
        let span = Span::new(15, 16, 1, 16);
        let err = ParseError::unexpected_token("'='", "':='", span);
        let context = err.format_with_context(source);
        assert!(context.contains("var x"));
        assert!(context.contains('^'));
    }

    #[test]
    fn test_parse_errors_collects() {
        let mut errors = ParseErrors::new();
        assert!(errors.is_empty());
        errors.push(ParseError::unexpected_eof("a statement"));
        errors.push(ParseError::LexerError {
            span: Span::new(0, 1, 2, 5),
        });
        assert_eq!(errors.len(), 2);
        assert!(errors.first().is_some());
        let formatted = errors.format_all("x\ny");
        assert!(formatted.contains("Error 1:"));
        assert!(formatted.contains("Error 2:"));
    }
}
