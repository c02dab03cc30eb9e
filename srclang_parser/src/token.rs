//! Token definitions for the SrcLang lexer.

use logos::Logos;

/// SrcLang tokens
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")] // whitespace
#[logos(skip r"//[^\n]*")] // line comments
pub enum Token {
    // ==================== Keywords ====================
    #[token("method")]
    KwMethod,
    #[token("extern")]
    KwExtern,
    #[token("var")]
    KwVar,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("while")]
    KwWhile,
    #[token("return")]
    KwReturn,

    // ==================== Type names ====================
    #[token("integer")]
    KwInteger,
    #[token("bool")]
    KwBool,
    #[token("void")]
    KwVoid,

    // ==================== Boolean literals ====================
    #[token("true")]
    True,
    #[token("false")]
    False,

    // ==================== Delimiters ====================
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // ==================== Punctuation ====================
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":=")]
    Assign,
    #[token(":")]
    Colon,

    // ==================== Operators ====================
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token("<")]
    Less,
    #[token(">=")]
    GreaterEq,
    #[token(">")]
    Greater,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,

    // ==================== Literals and identifiers ====================
    #[regex(r"[0-9]+")]
    Int,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
}

impl Token {
    /// Human-readable description used in parse error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::KwMethod => "'method'",
            Token::KwExtern => "'extern'",
            Token::KwVar => "'var'",
            Token::KwIf => "'if'",
            Token::KwElse => "'else'",
            Token::KwWhile => "'while'",
            Token::KwReturn => "'return'",
            Token::KwInteger => "'integer'",
            Token::KwBool => "'bool'",
            Token::KwVoid => "'void'",
            Token::True => "'true'",
            Token::False => "'false'",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBrace => "'{'",
            Token::RBrace => "'}'",
            Token::Comma => "','",
            Token::Semicolon => "';'",
            Token::Assign => "':='",
            Token::Colon => "':'",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::Slash => "'/'",
            Token::Percent => "'%'",
            Token::EqEq => "'=='",
            Token::NotEq => "'!='",
            Token::LessEq => "'<='",
            Token::Less => "'<'",
            Token::GreaterEq => "'>='",
            Token::Greater => "'>'",
            Token::AndAnd => "'&&'",
            Token::OrOr => "'||'",
            Token::Bang => "'!'",
            Token::Int => "integer literal",
            Token::Ident => "identifier",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<Token> {
        Token::lexer(src).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            lex_all("method main var x"),
            vec![Token::KwMethod, Token::Ident, Token::KwVar, Token::Ident]
        );
    }

    #[test]
    fn test_assign_vs_colon() {
        assert_eq!(
            lex_all("x := y : z"),
            vec![
                Token::Ident,
                Token::Assign,
                Token::Ident,
                Token::Colon,
                Token::Ident
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            lex_all("<= < == != >= > && || !"),
            vec![
                Token::LessEq,
                Token::Less,
                Token::EqEq,
                Token::NotEq,
                Token::GreaterEq,
                Token::Greater,
                Token::AndAnd,
                Token::OrOr,
                Token::Bang
            ]
        );
    }

    #[test]
    fn test_line_comments_skipped() {
        assert_eq!(
            lex_all("x // comment with := tokens\ny"),
            vec![Token::Ident, Token::Ident]
        );
    }

    #[test]
    fn test_unknown_character_is_error() {
        let mut lexer = Token::lexer("x $ y");
        assert_eq!(lexer.next(), Some(Ok(Token::Ident)));
        assert_eq!(lexer.next(), Some(Err(())));
    }
}
