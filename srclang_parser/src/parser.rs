//! Recursive-descent parser for SrcLang.
//!
//! Expressions use precedence climbing; statement and item parsing
//! recover at `;`/`}` and `method`/`extern` boundaries so that several
//! syntax errors can be reported from a single run.

use crate::ast::{BinOp, CallExpr, Expr, Method, Param, Program, Stmt, TypeName, UnaryOp};
use crate::error::{ParseError, ParseErrors, ParseResult};
use crate::lexer::{Lexer, SpannedToken};
use crate::token::Token;

/// Parse a whole SrcLang source file.
pub fn parse(source: &str) -> Result<Program, ParseErrors> {
    Parser::new(source).parse_program()
}

/// SrcLang parser
#[derive(Debug)]
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    errors: ParseErrors,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            errors: ParseErrors::new(),
        }
    }

    /// Parse the whole input, consuming the parser.
    pub fn parse_program(mut self) -> Result<Program, ParseErrors> {
        let mut methods = Vec::new();

        loop {
            let token = match self.lexer.peek() {
                None => break,
                Some(Err(_)) => {
                    if let Some(Err(err)) = self.lexer.next_token() {
                        self.errors.push(err);
                    }
                    continue;
                }
                Some(Ok(tok)) => tok.token,
            };
            let result = match token {
                Token::KwMethod => self.parse_method(false),
                Token::KwExtern => self.parse_method(true),
                _ => {
                    let tok = self.advance().expect("peeked token");
                    Err(ParseError::unexpected_token(
                        tok.token.describe(),
                        "'method' or 'extern'",
                        tok.span,
                    ))
                }
            };
            match result {
                Ok(method) => methods.push(method),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize_item();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(Program { methods })
        } else {
            Err(self.errors)
        }
    }

    // ==================== Items ====================

    fn parse_method(&mut self, is_extern: bool) -> ParseResult<Method> {
        if is_extern {
            self.expect(Token::KwExtern, "'extern'")?;
        }
        let kw = self.expect(Token::KwMethod, "'method'")?;
        let line = kw.span.line;
        let name = self.expect_ident()?;

        self.expect(Token::LParen, "'('")?;
        let params = self.parse_params()?;
        self.expect(Token::RParen, "')'")?;

        let return_ty = if self.eat(Token::Colon) {
            self.parse_type(true)?
        } else {
            TypeName::Void
        };

        let body = if is_extern {
            self.expect(Token::Semicolon, "';'")?;
            None
        } else {
            Some(self.parse_block()?)
        };

        Ok(Method {
            name,
            params,
            return_ty,
            body,
            line,
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.peek_token() == Some(Token::RParen) {
            return Ok(params);
        }
        loop {
            let tok = self.expect(Token::Ident, "a parameter name")?;
            let name = tok.text.to_string();
            let line = tok.span.line;
            self.expect(Token::Colon, "':'")?;
            let ty = self.parse_type(false)?;
            params.push(Param { name, ty, line });
            if !self.eat(Token::Comma) {
                break;
            }
        }
        Ok(params)
    }

    /// Parse a type name; `void` is only accepted in return position.
    fn parse_type(&mut self, allow_void: bool) -> ParseResult<TypeName> {
        let expected = if allow_void {
            "'integer', 'bool' or 'void'"
        } else {
            "'integer' or 'bool'"
        };
        let tok = self.advance_expecting(expected)?;
        match tok.token {
            Token::KwInteger => Ok(TypeName::Integer),
            Token::KwBool => Ok(TypeName::Bool),
            Token::KwVoid if allow_void => Ok(TypeName::Void),
            _ => Err(ParseError::unexpected_token(
                tok.token.describe(),
                expected,
                tok.span,
            )),
        }
    }

    // ==================== Statements ====================

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(Token::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        loop {
            match self.peek_token() {
                None => {
                    // Either EOF or a lexer error; surface whichever it is.
                    match self.lexer.next_token() {
                        Some(Err(err)) => {
                            self.errors.push(err);
                            self.synchronize_stmt();
                            continue;
                        }
                        _ => return Err(ParseError::unexpected_eof("'}'")),
                    }
                }
                Some(Token::RBrace) => {
                    self.advance()?;
                    return Ok(stmts);
                }
                Some(_) => match self.parse_stmt() {
                    Ok(stmt) => stmts.push(stmt),
                    Err(err) => {
                        self.errors.push(err);
                        self.synchronize_stmt();
                    }
                },
            }
        }
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        match self.peek_token() {
            Some(Token::KwVar) => self.parse_decl(),
            Some(Token::KwIf) => self.parse_if(),
            Some(Token::KwWhile) => self.parse_while(),
            Some(Token::KwReturn) => self.parse_return(),
            Some(Token::Ident) => self.parse_assign_or_call(),
            Some(_) => {
                let tok = self.advance()?;
                Err(ParseError::unexpected_token(
                    tok.token.describe(),
                    "a statement",
                    tok.span,
                ))
            }
            None => Err(ParseError::unexpected_eof("a statement")),
        }
    }

    fn parse_decl(&mut self) -> ParseResult<Stmt> {
        let kw = self.expect(Token::KwVar, "'var'")?;
        let line = kw.span.line;
        let name = self.expect_ident()?;
        self.expect(Token::Colon, "':'")?;
        let ty = self.parse_type(false)?;
        self.expect(Token::Assign, "':='")?;
        let init = self.parse_expr(1)?;
        self.expect(Token::Semicolon, "';'")?;
        Ok(Stmt::Decl {
            name,
            ty,
            init,
            line,
        })
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let kw = self.expect(Token::KwIf, "'if'")?;
        let line = kw.span.line;
        let cond = self.parse_expr(1)?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.eat(Token::KwElse) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            line,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let kw = self.expect(Token::KwWhile, "'while'")?;
        let line = kw.span.line;
        let cond = self.parse_expr(1)?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body, line })
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let kw = self.expect(Token::KwReturn, "'return'")?;
        let line = kw.span.line;
        let value = if self.peek_token() == Some(Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr(1)?)
        };
        self.expect(Token::Semicolon, "';'")?;
        Ok(Stmt::Return { value, line })
    }

    fn parse_assign_or_call(&mut self) -> ParseResult<Stmt> {
        let tok = self.expect(Token::Ident, "an identifier")?;
        let name = tok.text.to_string();
        let line = tok.span.line;
        match self.peek_token() {
            Some(Token::Assign) => {
                self.advance()?;
                let value = self.parse_expr(1)?;
                self.expect(Token::Semicolon, "';'")?;
                Ok(Stmt::Assign { name, value, line })
            }
            Some(Token::LParen) => {
                let call = self.parse_call_args(name, line)?;
                self.expect(Token::Semicolon, "';'")?;
                Ok(Stmt::Call(call))
            }
            Some(_) => {
                let tok = self.advance()?;
                Err(ParseError::unexpected_token(
                    tok.token.describe(),
                    "':=' or '('",
                    tok.span,
                ))
            }
            None => Err(ParseError::unexpected_eof("':=' or '('")),
        }
    }

    // ==================== Expressions ====================

    /// Precedence-climbing expression parser; all binary operators are
    /// left-associative.
    fn parse_expr(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(token) = self.peek_token() {
            let Some((op, prec)) = binary_op(token) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let tok = self.advance()?;
            let right = self.parse_expr(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line: tok.span.line,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        match self.peek_token() {
            Some(Token::Minus) => {
                let tok = self.advance()?;
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                    line: tok.span.line,
                })
            }
            Some(Token::Bang) => {
                let tok = self.advance()?;
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                    line: tok.span.line,
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let tok = self.advance_expecting("an expression")?;
        let line = tok.span.line;
        match tok.token {
            Token::Int => {
                let value = tok.text.parse::<i64>().map_err(|_| {
                    ParseError::IntOutOfRange {
                        literal: tok.text.to_string(),
                        span: tok.span,
                    }
                })?;
                Ok(Expr::Int { value, line })
            }
            Token::True => Ok(Expr::Bool { value: true, line }),
            Token::False => Ok(Expr::Bool { value: false, line }),
            Token::Ident => {
                let name = tok.text.to_string();
                if self.peek_token() == Some(Token::LParen) {
                    Ok(Expr::Call(self.parse_call_args(name, line)?))
                } else {
                    Ok(Expr::Id { name, line })
                }
            }
            Token::LParen => {
                let expr = self.parse_expr(1)?;
                self.expect(Token::RParen, "')'")?;
                Ok(expr)
            }
            _ => Err(ParseError::unexpected_token(
                tok.token.describe(),
                "an expression",
                tok.span,
            )),
        }
    }

    /// Parse the `( args? )` tail of a call whose callee is already consumed.
    fn parse_call_args(&mut self, callee: String, line: usize) -> ParseResult<CallExpr> {
        self.expect(Token::LParen, "'('")?;
        let mut args = Vec::new();
        if self.peek_token() != Some(Token::RParen) {
            loop {
                args.push(self.parse_expr(1)?);
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok(CallExpr { callee, args, line })
    }

    // ==================== Token helpers ====================

    fn peek_token(&mut self) -> Option<Token> {
        match self.lexer.peek() {
            Some(Ok(tok)) => Some(tok.token),
            _ => None,
        }
    }

    fn advance(&mut self) -> ParseResult<SpannedToken<'a>> {
        match self.lexer.next_token() {
            Some(result) => result,
            None => Err(ParseError::unexpected_eof("more input")),
        }
    }

    fn advance_expecting(&mut self, expected: &str) -> ParseResult<SpannedToken<'a>> {
        match self.lexer.next_token() {
            Some(result) => result,
            None => Err(ParseError::unexpected_eof(expected)),
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> ParseResult<SpannedToken<'a>> {
        let tok = self.advance_expecting(expected)?;
        if tok.token == token {
            Ok(tok)
        } else {
            Err(ParseError::unexpected_token(
                tok.token.describe(),
                expected,
                tok.span,
            ))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        let tok = self.expect(Token::Ident, "an identifier")?;
        Ok(tok.text.to_string())
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.peek_token() == Some(token) {
            self.lexer.next_token();
            true
        } else {
            false
        }
    }

    // ==================== Error recovery ====================

    /// Skip to the next `method`/`extern` keyword after an item error.
    fn synchronize_item(&mut self) {
        while let Some(token) = self.peek_token() {
            if matches!(token, Token::KwMethod | Token::KwExtern) {
                return;
            }
            self.lexer.next_token();
        }
        // A lexer error is not peekable as a token; consume it so the
        // loop in parse_program can make progress.
        if let Some(Err(err)) = self.lexer.next_token() {
            self.errors.push(err);
        }
    }

    /// Skip past the current statement after a statement error.
    fn synchronize_stmt(&mut self) {
        loop {
            match self.peek_token() {
                None => {
                    if let Some(Err(err)) = self.lexer.next_token() {
                        self.errors.push(err);
                        continue;
                    }
                    return;
                }
                Some(Token::Semicolon) => {
                    self.lexer.next_token();
                    return;
                }
                Some(Token::RBrace) | Some(Token::KwMethod) | Some(Token::KwExtern) => return,
                Some(_) => {
                    self.lexer.next_token();
                }
            }
        }
    }
}

/// Binary operator and its precedence for a token, if any.
///
/// Higher binds tighter; 1 is the loosest expression level.
fn binary_op(token: Token) -> Option<(BinOp, u8)> {
    match token {
        Token::OrOr => Some((BinOp::Or, 1)),
        Token::AndAnd => Some((BinOp::And, 2)),
        Token::EqEq => Some((BinOp::Eq, 3)),
        Token::NotEq => Some((BinOp::Neq, 3)),
        Token::Less => Some((BinOp::Lt, 4)),
        Token::LessEq => Some((BinOp::Le, 4)),
        Token::Greater => Some((BinOp::Gt, 4)),
        Token::GreaterEq => Some((BinOp::Ge, 4)),
        Token::Plus => Some((BinOp::Add, 5)),
        Token::Minus => Some((BinOp::Sub, 5)),
        Token::Star => Some((BinOp::Mul, 6)),
        Token::Slash => Some((BinOp::Div, 6)),
        Token::Percent => Some((BinOp::Mod, 6)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        parse(src).unwrap_or_else(|e| panic!("parse failed: {}", e))
    }

    #[test]
    fn test_empty_main() {
        let program = parse_ok("method main(): integer { }");
        assert_eq!(program.methods.len(), 1);
        let main = &program.methods[0];
        assert_eq!(main.name, "main");
        assert_eq!(main.return_ty, TypeName::Integer);
        assert_eq!(main.body.as_deref(), Some(&[][..]));
    }

    #[test]
    fn test_omitted_return_type_is_void() {
        let program = parse_ok("method go() { }");
        assert_eq!(program.methods[0].return_ty, TypeName::Void);
    }

    #[test]
    fn test_extern_method() {
        let program = parse_ok("extern method put(x: integer);");
        let put = &program.methods[0];
        assert!(put.is_extern());
        assert_eq!(put.params.len(), 1);
        assert_eq!(put.params[0].ty, TypeName::Integer);
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let program = parse_ok("method main(): integer { return 2 + 3 * 4; }");
        let body = program.methods[0].body.as_ref().unwrap();
        let Stmt::Return {
            value: Some(Expr::Binary { op, right, .. }),
            ..
        } = &body[0]
        else {
            panic!("expected return of binary expression, got {:?}", body[0]);
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(
            right.as_ref(),
            Expr::Binary { op: BinOp::Mul, .. }
        ));
    }

    #[test]
    fn test_left_associativity() {
        let program = parse_ok("method main(): integer { return 10 - 3 - 2; }");
        let body = program.methods[0].body.as_ref().unwrap();
        let Stmt::Return {
            value: Some(Expr::Binary { op, left, .. }),
            ..
        } = &body[0]
        else {
            panic!("expected return of binary expression");
        };
        assert_eq!(*op, BinOp::Sub);
        assert!(matches!(
            left.as_ref(),
            Expr::Binary { op: BinOp::Sub, .. }
        ));
    }

    #[test]
    fn test_unary_minus_and_not() {
        let program = parse_ok("method f(): bool { return !(0 - 1 < -2); }");
        let body = program.methods[0].body.as_ref().unwrap();
        assert!(matches!(
            &body[0],
            Stmt::Return {
                value: Some(Expr::Unary {
                    op: UnaryOp::Not,
                    ..
                }),
                ..
            }
        ));
    }

    #[test]
    fn test_statements_and_lines() {
        let src = "method main() {\n  var x: integer := 1;\n  x := x + 1;\n  put(x);\n}";
        let program = parse_ok(src);
        let body = program.methods[0].body.as_ref().unwrap();
        assert_eq!(body.len(), 3);
        assert_eq!(body[0].line(), 2);
        assert!(matches!(&body[1], Stmt::Assign { name, .. } if name == "x"));
        assert!(matches!(&body[2], Stmt::Call(call) if call.callee == "put"));
    }

    #[test]
    fn test_if_else_and_while() {
        let src = r#"
method classify(n: integer): integer {
    while n > 10 {
        n := n / 2;
    }
    if n == 0 {
        return 0;
    } else {
        return 1;
    }
}
"#;
        let program = parse_ok(src);
        let body = program.methods[0].body.as_ref().unwrap();
        assert!(matches!(&body[0], Stmt::While { .. }));
        assert!(matches!(
            &body[1],
            Stmt::If {
                else_branch: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_call_arguments() {
        let program = parse_ok("method main() { combine(1, 2 + 3, true); }");
        let body = program.methods[0].body.as_ref().unwrap();
        let Stmt::Call(call) = &body[0] else {
            panic!("expected call statement");
        };
        assert_eq!(call.args.len(), 3);
    }

    #[test]
    fn test_missing_semicolon_is_error() {
        let err = parse("method main() { var x: integer := 1 }").unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.first().unwrap().to_string().contains("';'"));
    }

    #[test]
    fn test_error_recovery_reports_multiple() {
        let src = "method main() { var := 1; x ; }";
        let err = parse(src).unwrap_err();
        assert!(err.len() >= 2, "expected at least 2 errors, got {}", err.len());
    }

    #[test]
    fn test_int_out_of_range() {
        let err = parse("method main(): integer { return 99999999999999999999; }").unwrap_err();
        assert!(matches!(
            err.first().unwrap(),
            ParseError::IntOutOfRange { .. }
        ));
    }
}
