//! Lexer for SrcLang source code
//!
//! Wraps the logos-generated lexer with span tracking and one-token
//! lookahead for the recursive-descent parser.

use logos::Logos;

use crate::error::ParseError;
use crate::span::{SourceMap, Span};
use crate::token::Token;

/// A token with its span and source text
#[derive(Debug, Clone)]
pub struct SpannedToken<'a> {
    pub token: Token,
    pub span: Span,
    pub text: &'a str,
}

impl<'a> SpannedToken<'a> {
    pub fn new(token: Token, span: Span, text: &'a str) -> Self {
        Self { token, span, text }
    }
}

/// SrcLang lexer
pub struct Lexer<'a> {
    source: &'a str,
    inner: logos::Lexer<'a, Token>,
    source_map: SourceMap,
    /// Peeked token (for lookahead)
    peeked: Option<Option<Result<SpannedToken<'a>, ParseError>>>,
    /// Line of the most recently consumed token
    last_line: usize,
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("position", &self.inner.span())
            .field("last_line", &self.last_line)
            .finish_non_exhaustive()
    }
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            inner: Token::lexer(source),
            source_map: SourceMap::new(source),
            peeked: None,
            last_line: 1,
        }
    }

    /// Get the source code
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Line of the most recently consumed token (for diagnostics)
    pub fn last_line(&self) -> usize {
        self.last_line
    }

    /// Peek at the next token without consuming it
    pub fn peek(&mut self) -> Option<&Result<SpannedToken<'a>, ParseError>> {
        if self.peeked.is_none() {
            self.peeked = Some(self.next_token_internal());
        }
        self.peeked.as_ref().and_then(|p| p.as_ref())
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Option<Result<SpannedToken<'a>, ParseError>> {
        let next = match self.peeked.take() {
            Some(peeked) => peeked,
            None => self.next_token_internal(),
        };
        if let Some(Ok(tok)) = &next {
            self.last_line = tok.span.line;
        }
        next
    }

    fn next_token_internal(&mut self) -> Option<Result<SpannedToken<'a>, ParseError>> {
        let result = self.inner.next()?;
        let range = self.inner.span();
        let span = self.source_map.span(range.start, range.end);
        match result {
            Ok(token) => Some(Ok(SpannedToken::new(token, span, self.inner.slice()))),
            Err(()) => Some(Err(ParseError::LexerError { span })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new("var x");
        assert!(matches!(
            lexer.peek(),
            Some(Ok(SpannedToken {
                token: Token::KwVar,
                ..
            }))
        ));
        let tok = lexer.next_token().unwrap().unwrap();
        assert_eq!(tok.token, Token::KwVar);
        let tok = lexer.next_token().unwrap().unwrap();
        assert_eq!(tok.token, Token::Ident);
        assert_eq!(tok.text, "x");
        assert!(lexer.next_token().is_none());
    }

    #[test]
    fn test_spans_track_lines() {
        let mut lexer = Lexer::new("var\nx");
        lexer.next_token();
        let tok = lexer.next_token().unwrap().unwrap();
        assert_eq!(tok.span.line, 2);
        assert_eq!(lexer.last_line(), 2);
    }

    #[test]
    fn test_lexer_error_has_span() {
        let mut lexer = Lexer::new("x\n@");
        lexer.next_token();
        let err = lexer.next_token().unwrap().unwrap_err();
        assert_eq!(err.span().unwrap().line, 2);
    }
}
