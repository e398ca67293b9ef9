//! Operator-precedence parsing of `#if`/`#elif` constant expressions.
//!
//! Precedence climbing over the observed table (tighter binds downward):
//!
//! | level | operators            |
//! |-------|----------------------|
//! | 1     | `\|`                 |
//! | 2     | `&`, `\|\|`          |
//! | 4     | `^`                  |
//! | 5     | `&&`                 |
//! | 6     | `==`, `!=`           |
//! | 7     | `<`, `<=`, `>`, `>=` |
//! | 8     | `<<`, `>>`           |
//! | 9     | `+`, `-`             |
//! | 10    | `*`, `/`, `%`        |
//!
//! `&` and `||` genuinely share level 2 here; that is the behavior this
//! engine ships with, standard C notwithstanding.
//!
//! Terms are literals, identifiers (expanded and re-parsed at evaluation
//! time), call forms, parenthesised sub-expressions, and `defined X` /
//! `defined(X)`, whose operand is never macro-expanded.

use crate::{BodyMode, Parser, ParseError};
use cpre_ast::{BinOp, Expr, IdentElem, LitElem, LitKind, UnaryOp};
use cpre_lexer::TokenKind;

fn binary_op(kind: TokenKind) -> Option<(u8, BinOp)> {
    Some(match kind {
        TokenKind::Pipe => (1, BinOp::Or),
        TokenKind::Amp => (2, BinOp::And),
        TokenKind::PipePipe => (2, BinOp::LogOr),
        TokenKind::Caret => (4, BinOp::Xor),
        TokenKind::AmpAmp => (5, BinOp::LogAnd),
        TokenKind::EqEq => (6, BinOp::Eq),
        TokenKind::BangEq => (6, BinOp::Ne),
        TokenKind::Lt => (7, BinOp::Lt),
        TokenKind::Le => (7, BinOp::Le),
        TokenKind::Gt => (7, BinOp::Gt),
        TokenKind::Ge => (7, BinOp::Ge),
        TokenKind::Shl => (8, BinOp::Shl),
        TokenKind::Shr => (8, BinOp::Shr),
        TokenKind::Plus => (9, BinOp::Add),
        TokenKind::Minus => (9, BinOp::Sub),
        TokenKind::Star => (10, BinOp::Mul),
        TokenKind::Slash => (10, BinOp::Div),
        TokenKind::Percent => (10, BinOp::Rem),
        _ => return None,
    })
}

impl Parser<'_> {
    /// Parse a full expression and diagnose trailing tokens.
    pub(crate) fn parse_expression_toplevel(&mut self) -> Expr {
        self.skip_expr_trivia();
        if self.tok.kind == TokenKind::Eof {
            self.error_at(self.tok.span, "empty expression");
            return Expr::Bad(self.tok.span, String::new());
        }
        let expr = self.parse_binary_expr(1);
        self.skip_expr_trivia();
        if self.tok.kind != TokenKind::Eof {
            self.error_at(
                self.tok.span,
                format!("unexpected {} in expression", self.tok.kind.description()),
            );
        }
        expr
    }

    /// Skip everything an expression treats as whitespace.
    fn skip_expr_trivia(&mut self) {
        while self.tok.is_blank_text()
            || matches!(
                self.tok.kind,
                TokenKind::Splice
                    | TokenKind::Newline
                    | TokenKind::LineComment
                    | TokenKind::BlockComment
            )
        {
            self.next();
        }
    }

    /// Precedence climbing: parse operators binding at least `min_prec`.
    fn parse_binary_expr(&mut self, min_prec: u8) -> Expr {
        let mut x = self.parse_unary_expr();
        loop {
            self.skip_expr_trivia();
            let Some((prec, op)) = binary_op(self.tok.kind) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let pos = self.tok.span.lo;
            self.next();
            let y = self.parse_binary_expr(prec + 1);
            x = Expr::Binary {
                x: Box::new(x),
                pos,
                op,
                y: Box::new(y),
            };
        }
        x
    }

    fn parse_unary_expr(&mut self) -> Expr {
        self.skip_expr_trivia();
        let op = match self.tok.kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::KwDefined => Some(UnaryOp::Defined),
            _ => None,
        };
        match op {
            Some(UnaryOp::Defined) => {
                let pos = self.tok.span.lo;
                self.next();
                let x = self.parse_defined_operand();
                Expr::Unary {
                    pos,
                    op: UnaryOp::Defined,
                    x: Box::new(x),
                }
            }
            Some(op) => {
                let pos = self.tok.span.lo;
                self.next();
                let x = self.parse_unary_expr();
                Expr::Unary {
                    pos,
                    op,
                    x: Box::new(x),
                }
            }
            None => self.parse_primary_expr(),
        }
    }

    /// `defined NAME` or `defined(NAME)`. The operand is a plain
    /// environment query and is never expanded.
    fn parse_defined_operand(&mut self) -> Expr {
        self.skip_expr_trivia();
        match self.tok.kind {
            TokenKind::Ident => {
                let tok = self.next();
                Expr::Ident(IdentElem::new(tok.span.lo, tok.text))
            }
            TokenKind::LParen => {
                self.next();
                self.skip_expr_trivia();
                if self.tok.kind != TokenKind::Ident {
                    let err = ParseError::Unexpected {
                        found: self.tok.kind.description(),
                        expected: "an identifier after `defined`",
                        span: self.tok.span,
                    };
                    self.error(&err);
                    return Expr::Bad(self.tok.span, self.tok.text.clone());
                }
                let tok = self.next();
                let inner = Expr::Ident(IdentElem::new(tok.span.lo, tok.text));
                self.skip_expr_trivia();
                if self.tok.kind == TokenKind::RParen {
                    self.next();
                } else {
                    let err = ParseError::Unexpected {
                        found: self.tok.kind.description(),
                        expected: "`)`",
                        span: self.tok.span,
                    };
                    self.error(&err);
                }
                Expr::Paren(Box::new(inner))
            }
            _ => {
                let err = ParseError::Unexpected {
                    found: self.tok.kind.description(),
                    expected: "an identifier after `defined`",
                    span: self.tok.span,
                };
                self.error(&err);
                Expr::Bad(self.tok.span, self.tok.text.clone())
            }
        }
    }

    fn parse_primary_expr(&mut self) -> Expr {
        self.skip_expr_trivia();
        match self.tok.kind {
            TokenKind::Int => self.parse_lit_expr(LitKind::Int),
            TokenKind::Float => self.parse_lit_expr(LitKind::Float),
            TokenKind::Char => self.parse_lit_expr(LitKind::Char),
            TokenKind::Str => self.parse_lit_expr(LitKind::Str),
            TokenKind::Ident => self.parse_ident_or_call_expr(),
            k if k.is_directive_keyword() => {
                // Directive keywords are ordinary identifiers in
                // expression position.
                let tok = self.next();
                Expr::Ident(IdentElem::new(tok.span.lo, tok.text))
            }
            TokenKind::LParen => {
                self.next();
                let x = self.parse_binary_expr(1);
                self.skip_expr_trivia();
                if self.tok.kind == TokenKind::RParen {
                    self.next();
                } else {
                    let err = ParseError::Unexpected {
                        found: self.tok.kind.description(),
                        expected: "`)`",
                        span: self.tok.span,
                    };
                    self.error(&err);
                }
                Expr::Paren(Box::new(x))
            }
            TokenKind::Eof => {
                self.error_at(self.tok.span, "unexpected end of expression");
                Expr::Bad(self.tok.span, String::new())
            }
            _ => {
                self.error_at(
                    self.tok.span,
                    format!("unexpected {} in expression", self.tok.kind.description()),
                );
                let tok = self.next();
                Expr::Bad(tok.span, tok.text)
            }
        }
    }

    fn parse_lit_expr(&mut self, kind: LitKind) -> Expr {
        let tok = self.next();
        Expr::Lit(LitElem::new(tok.span.lo, kind, tok.text))
    }

    fn parse_ident_or_call_expr(&mut self) -> Expr {
        let tok = self.next();
        let name = IdentElem::new(tok.span.lo, tok.text);

        let state = self.save_state();
        self.skip_blank();
        if self.tok.kind == TokenKind::LParen {
            let lparen = self.tok.span.lo;
            self.next();
            if let Some((args, rparen)) = self.parse_call_args(BodyMode::Object) {
                return Expr::Call(cpre_ast::CallElem {
                    name,
                    lparen,
                    args,
                    rparen,
                });
            }
        }
        self.restore_state(state);
        Expr::Ident(name)
    }
}
