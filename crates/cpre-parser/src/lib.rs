//! Directive and statement parsing for cpre.
//!
//! The parser consumes atoms from [`cpre_lexer::Lexer`] and builds the
//! statement tree the evaluator walks. It alternates between two modes:
//!
//! - **Text mode** (the default) collects body elements — including
//!   identifiers and macro call forms, so the evaluator can expand them —
//!   until a directive-hash or end of input.
//! - **Directive mode**, entered on a line-leading `#`, dispatches on the
//!   following keyword to a per-directive sub-parser. Unknown directives
//!   are captured verbatim as invalid statements.
//!
//! Conditional groups parse recursively into a right-leaning else-chain.
//! `#if`/`#elif` condition text is collected to the end of the directive
//! line (splices removed) and handed to the operator-precedence expression
//! parser in `expr`; the same entry point serves the evaluator when it
//! re-parses expansion results.

#![warn(missing_docs)]

use cpre_ast::{
    BadStmt, Block, CallElem, CommandKind, CommandStmt, Cond, Elem, ElseArm, Expr, FnDef,
    IdentElem, IfKind, IfStmt, IncludeKind, IncludeStmt, InvalidStmt, LineStmt, LitElem, LitKind,
    ObjectDef, Stmt, TextElem, TextStmt, UndefStmt,
};
use cpre_diagnostics::{Diagnostic, DiagnosticHandler};
use cpre_lexer::{Lexer, LexerState, Token, TokenKind};
use cpre_span::{BytePos, Span};
use thiserror::Error;

mod expr;

/// A structured parser error; converted into a [`Diagnostic`] when emitted.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The current token is not what the grammar requires.
    #[error("expected {expected}, got {found}")]
    Unexpected {
        /// Description of what was found.
        found: &'static str,
        /// Description of what was required.
        expected: &'static str,
        /// Location of the offending token.
        span: Span,
    },

    /// A token that may not appear in a macro parameter list.
    #[error("{found} may not appear in macro parameter list")]
    BadParamList {
        /// Description of the offending token.
        found: &'static str,
        /// Location of the offending token.
        span: Span,
    },

    /// Trailing tokens after a complete directive.
    #[error("unexpected {found} after directive")]
    TrailingTokens {
        /// Description of the first stray token.
        found: &'static str,
        /// Location of the first stray token.
        span: Span,
    },

    /// A conditional group was still open at end of input.
    #[error("unterminated conditional, expected `#endif`")]
    UnterminatedConditional {
        /// Location of the opening directive.
        span: Span,
    },

    /// A branch directive appeared with no conditional group open.
    #[error("{found} without matching `#if`")]
    DanglingBranch {
        /// Description of the directive.
        found: &'static str,
        /// Location of the directive.
        span: Span,
    },
}

impl ParseError {
    /// Convert to a diagnostic.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        let span = match self {
            Self::Unexpected { span, .. }
            | Self::BadParamList { span, .. }
            | Self::TrailingTokens { span, .. }
            | Self::UnterminatedConditional { span }
            | Self::DanglingBranch { span, .. } => *span,
        };
        Diagnostic::error(span, self.to_string())
    }
}

/// Which construct a body element is being parsed for. Controls whether
/// `#`/`##` are operators and how splices and block comments are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BodyMode {
    /// Free text between directives: everything is preserved.
    Text,
    /// An object-like definition body: splices and block comments become
    /// discardable trivia, `#`/`##` stay plain text.
    Object,
    /// A function-like definition body: like `Object`, plus `#name` and
    /// `x ## y` parse as operators.
    Function,
}

/// How a branch body ended.
enum BranchEnd {
    /// `#elif` reached; the keyword is the current token.
    Elif {
        /// Position of the branch directive's `#`.
        hash: BytePos,
    },
    /// `#else` reached and its line consumed.
    Else {
        /// The `#else` directive line's span.
        span: Span,
    },
    /// `#endif` reached and its line consumed.
    Endif {
        /// Position of the `#`.
        hash: BytePos,
        /// End of the `#endif` line content.
        end: BytePos,
    },
    /// End of input.
    Eof,
}

/// The statement parser.
pub struct Parser<'src> {
    src: &'src str,
    lexer: Lexer<'src>,
    /// The current (one-token look-ahead) token, span already rebased.
    tok: Token,
    /// Offset added to every token span; non-zero for sub-parses of
    /// expansion fragments.
    base: u32,
    handler: DiagnosticHandler,
}

/// A restorable parser snapshot: lexer state plus the current token.
struct ParserState {
    lexer: LexerState,
    tok: Token,
}

impl<'src> Parser<'src> {
    /// Create a parser over a whole source file.
    #[must_use]
    pub fn new(src: &'src str) -> Self {
        Self::new_at(src, BytePos::ZERO)
    }

    /// Create a parser over a fragment whose first byte corresponds to
    /// `anchor` in the original source.
    #[must_use]
    pub fn new_at(src: &'src str, anchor: BytePos) -> Self {
        let mut parser = Self {
            src,
            lexer: Lexer::new(src),
            tok: Token::new(TokenKind::Eof, String::new(), Span::DUMMY),
            base: anchor.as_u32(),
            handler: DiagnosticHandler::new(),
        };
        parser.next();
        parser
    }

    /// Parse the whole input into a statement tree.
    pub fn parse(&mut self) -> Block {
        let mut root = Block::new();
        loop {
            match self.tok.kind {
                TokenKind::Eof => break,
                TokenKind::DirectiveHash => {
                    let stmt = self.parse_directive();
                    root.push(stmt);
                }
                _ => {
                    let stmt = self.parse_text_block();
                    root.push(stmt);
                }
            }
        }
        root
    }

    /// Take all accumulated diagnostics, the lexer's merged in.
    pub fn finish_diagnostics(&mut self) -> Vec<Diagnostic> {
        let base = self.base;
        let lex_diags = self.lexer.take_diagnostics().into_iter().map(|mut d| {
            d.span = shift_span(d.span, base);
            d
        });
        let mut all: Vec<Diagnostic> = lex_diags.collect();
        all.extend(self.handler.take_diagnostics());
        all.sort_by_key(|d| d.span.lo);
        all
    }

    // ========================================================================
    // Token plumbing
    // ========================================================================

    /// Advance, returning the token that was current.
    fn next(&mut self) -> Token {
        let mut incoming = self.lexer.next_token();
        incoming.span = shift_span(incoming.span, self.base);
        std::mem::replace(&mut self.tok, incoming)
    }

    fn save_state(&self) -> ParserState {
        ParserState {
            lexer: self.lexer.save(),
            tok: self.tok.clone(),
        }
    }

    fn restore_state(&mut self, state: ParserState) {
        self.lexer.restore(state.lexer);
        self.tok = state.tok;
    }

    fn error(&mut self, err: &ParseError) {
        self.handler.emit(err.to_diagnostic());
    }

    fn error_at(&mut self, span: Span, message: impl Into<String>) {
        self.handler.emit(Diagnostic::error(span, message));
    }

    /// Slice the original text between two rebased positions.
    fn text_between(&self, from: BytePos, to: BytePos) -> &'src str {
        &self.src[(from.as_u32() - self.base) as usize..(to.as_u32() - self.base) as usize]
    }

    /// Skip blank text only. Used in free text, where a splice must not be
    /// consumed (its newline is part of the output).
    fn skip_blank(&mut self) {
        while self.tok.is_blank_text() {
            self.next();
        }
    }

    /// Skip blank text and splices: whitespace within a directive line,
    /// where continuations may appear anywhere.
    fn skip_blank_splice(&mut self) {
        while self.tok.is_blank_text() || self.tok.kind == TokenKind::Splice {
            self.next();
        }
    }

    /// Consume the rest of the directive line through its newline. With
    /// `check`, the first stray non-blank, non-comment token is diagnosed.
    /// Returns the end of the line's content (start of the newline).
    fn scan_to_line_end(&mut self, check: bool) -> BytePos {
        let mut complained = false;
        loop {
            match self.tok.kind {
                TokenKind::Newline => {
                    let end = self.tok.span.lo;
                    self.next();
                    return end;
                }
                TokenKind::Eof => return self.tok.span.lo,
                _ => {
                    if check
                        && !complained
                        && !self.tok.is_blank_text()
                        && !self.tok.kind.is_comment()
                        && self.tok.kind != TokenKind::Splice
                    {
                        complained = true;
                        let err = ParseError::TrailingTokens {
                            found: self.tok.kind.description(),
                            span: self.tok.span,
                        };
                        self.error(&err);
                    }
                    self.next();
                }
            }
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Option<IdentElem> {
        if self.tok.kind == TokenKind::Ident {
            let tok = self.next();
            Some(IdentElem::new(tok.span.lo, tok.text))
        } else {
            let err = ParseError::Unexpected {
                found: self.tok.kind.description(),
                expected,
                span: self.tok.span,
            };
            self.error(&err);
            None
        }
    }

    // ========================================================================
    // Text mode
    // ========================================================================

    /// Collect body elements until a directive-hash or end of input.
    fn parse_text_block(&mut self) -> Stmt {
        let from = self.tok.span.lo;
        let mut elems = Vec::new();
        while !matches!(self.tok.kind, TokenKind::DirectiveHash | TokenKind::Eof) {
            elems.push(self.parse_elem(BodyMode::Text));
        }
        let to = elems.last().map_or(from, Elem::end);
        Stmt::Text(TextStmt {
            span: Span::new(from, to),
            elems,
        })
    }

    /// Parse one body element in the given mode. The current token must not
    /// be a newline terminator for body modes (callers check).
    fn parse_elem(&mut self, mode: BodyMode) -> Elem {
        match self.tok.kind {
            TokenKind::Ident => self.parse_maybe_call(mode),
            TokenKind::Int => self.parse_lit(LitKind::Int),
            TokenKind::Float => self.parse_lit(LitKind::Float),
            TokenKind::Char => self.parse_lit(LitKind::Char),
            TokenKind::Str => self.parse_lit(LitKind::Str),
            TokenKind::BlockComment => {
                let tok = self.next();
                if mode == BodyMode::Text {
                    // Strip the comment but keep its newlines so line
                    // numbering survives multi-line comments.
                    let newlines: String = tok.text.chars().filter(|&c| c == '\n').collect();
                    Elem::Text(TextElem::new(tok.span.lo, TokenKind::Text, newlines))
                } else {
                    Elem::Text(TextElem::new(tok.span.lo, TokenKind::BlockComment, tok.text))
                }
            }
            TokenKind::Splice => {
                let tok = self.next();
                let kind = if mode == BodyMode::Text {
                    TokenKind::Text
                } else {
                    TokenKind::Splice
                };
                Elem::Text(TextElem::new(tok.span.lo, kind, tok.text))
            }
            _ => {
                let tok = self.next();
                Elem::Text(TextElem::new(tok.span.lo, tok.kind, tok.text))
            }
        }
    }

    fn parse_lit(&mut self, kind: LitKind) -> Elem {
        let tok = self.next();
        Elem::Lit(LitElem::new(tok.span.lo, kind, tok.text))
    }

    /// An identifier, or a call form if a `(` follows (blanks allowed in
    /// between). When the parenthesis turns out not to open a well-formed
    /// argument list, scanning is restored and the bare identifier is kept.
    fn parse_maybe_call(&mut self, mode: BodyMode) -> Elem {
        let tok = self.next();
        let name = IdentElem::new(tok.span.lo, tok.text);

        let state = self.save_state();
        self.skip_blank();
        if self.tok.kind == TokenKind::LParen {
            let lparen = self.tok.span.lo;
            self.next();
            if let Some((args, rparen)) = self.parse_call_args(mode) {
                return Elem::Call(CallElem {
                    name,
                    lparen,
                    args,
                    rparen,
                });
            }
        }
        self.restore_state(state);
        Elem::Ident(name)
    }

    /// Parse a balanced, comma-split argument list; the opening `(` is
    /// already consumed. Returns `None` (without diagnostics) if the list
    /// does not close before its terminator: end of line for definition
    /// bodies, directive-hash or end of input in free text.
    fn parse_call_args(&mut self, mode: BodyMode) -> Option<(Vec<Elem>, BytePos)> {
        let mut args: Vec<Elem> = Vec::new();
        let mut cur: Vec<Elem> = Vec::new();
        let mut depth = 1u32;

        loop {
            match self.tok.kind {
                TokenKind::Eof | TokenKind::DirectiveHash => return None,
                TokenKind::Newline if mode != BodyMode::Text => return None,
                TokenKind::RParen => {
                    let tok = self.next();
                    if depth > 1 {
                        depth -= 1;
                        cur.push(Elem::Text(TextElem::new(tok.span.lo, tok.kind, tok.text)));
                    } else {
                        if !cur.is_empty() || !args.is_empty() {
                            args.push(Elem::seq_or_single(cur));
                        }
                        return Some((args, tok.span.lo));
                    }
                }
                TokenKind::LParen => {
                    let tok = self.next();
                    depth += 1;
                    cur.push(Elem::Text(TextElem::new(tok.span.lo, tok.kind, tok.text)));
                }
                TokenKind::Comma if depth == 1 => {
                    self.next();
                    args.push(Elem::seq_or_single(std::mem::take(&mut cur)));
                }
                _ => cur.push(self.parse_elem(mode)),
            }
        }
    }

    // ========================================================================
    // Directive mode
    // ========================================================================

    fn parse_directive(&mut self) -> Stmt {
        let hash = self.next();
        let from = hash.span.lo;
        self.skip_blank_splice();
        match self.tok.kind {
            TokenKind::KwInclude => self.parse_include(from),
            TokenKind::KwDefine => self.parse_define(from),
            TokenKind::KwUndef => self.parse_undef(from),
            TokenKind::KwIf => self.parse_conditional(from, IfKind::If),
            TokenKind::KwIfdef => self.parse_conditional(from, IfKind::Ifdef),
            TokenKind::KwIfndef => self.parse_conditional(from, IfKind::Ifndef),
            TokenKind::KwElif | TokenKind::KwElse | TokenKind::KwEndif => {
                let err = ParseError::DanglingBranch {
                    found: self.tok.kind.description(),
                    span: self.tok.span,
                };
                self.error(&err);
                self.parse_invalid(from)
            }
            TokenKind::KwLine => {
                self.next();
                self.parse_line(from, None)
            }
            TokenKind::Int => {
                // `# N "file"` is shorthand for `#line N "file"`.
                let tok = self.next();
                self.parse_line(from, Some(tok.text))
            }
            TokenKind::KwError => self.parse_command(from, CommandKind::Error),
            TokenKind::KwWarning => self.parse_command(from, CommandKind::Warning),
            TokenKind::KwPragma => self.parse_command(from, CommandKind::Pragma),
            _ => self.parse_invalid(from),
        }
    }

    /// Capture a `#` line with no recognised directive, text preserved
    /// verbatim (splices included, so the span may cover several lines).
    fn parse_invalid(&mut self, from: BytePos) -> Stmt {
        let end = self.scan_to_line_end(false);
        Stmt::Invalid(InvalidStmt {
            span: Span::new(from, end),
            text: self.text_between(from, end).to_string(),
        })
    }

    fn parse_include(&mut self, from: BytePos) -> Stmt {
        self.next();
        self.skip_blank_splice();
        let (path, kind) = match self.tok.kind {
            TokenKind::Str => {
                let tok = self.next();
                (tok.text, IncludeKind::Local)
            }
            TokenKind::Lt => {
                self.next();
                let mut path = String::from("<");
                loop {
                    match self.tok.kind {
                        TokenKind::Gt => {
                            self.next();
                            path.push('>');
                            break;
                        }
                        TokenKind::Newline | TokenKind::Eof => break,
                        _ => {
                            let tok = self.next();
                            path.push_str(&tok.text);
                        }
                    }
                }
                (path, IncludeKind::System)
            }
            _ => {
                let err = ParseError::Unexpected {
                    found: self.tok.kind.description(),
                    expected: "include path",
                    span: self.tok.span,
                };
                self.error(&err);
                (String::new(), IncludeKind::Local)
            }
        };
        let end = self.scan_to_line_end(true);
        Stmt::Include(IncludeStmt {
            span: Span::new(from, end),
            path,
            kind,
        })
    }

    fn parse_undef(&mut self, from: BytePos) -> Stmt {
        self.next();
        self.skip_blank_splice();
        let Some(name) = self.expect_ident("a macro name") else {
            return self.parse_invalid(from);
        };
        let end = self.scan_to_line_end(true);
        Stmt::Undef(UndefStmt {
            span: Span::new(from, end),
            name,
        })
    }

    fn parse_line(&mut self, from: BytePos, number: Option<String>) -> Stmt {
        let line = match number {
            Some(n) => n,
            None => {
                self.skip_blank_splice();
                if self.tok.kind == TokenKind::Int {
                    self.next().text
                } else {
                    let err = ParseError::Unexpected {
                        found: self.tok.kind.description(),
                        expected: "a line number",
                        span: self.tok.span,
                    };
                    self.error(&err);
                    return self.parse_invalid(from);
                }
            }
        };
        self.skip_blank_splice();
        let path = if self.tok.kind == TokenKind::Str {
            Some(self.next().text)
        } else {
            None
        };
        let end = self.scan_to_line_end(true);
        Stmt::Line(LineStmt {
            span: Span::new(from, end),
            line,
            path,
        })
    }

    /// `#error` / `#warning` / `#pragma`: capture the directive line
    /// verbatim with splices deleted.
    fn parse_command(&mut self, from: BytePos, kind: CommandKind) -> Stmt {
        let end = self.scan_to_line_end(false);
        Stmt::Command(CommandStmt {
            span: Span::new(from, end),
            kind,
            text: clear_splices(self.text_between(from, end)),
        })
    }

    // ========================================================================
    // Definitions
    // ========================================================================

    fn parse_define(&mut self, from: BytePos) -> Stmt {
        self.next();
        self.skip_blank_splice();
        let Some(name) = self.expect_ident("a macro name") else {
            let end = self.scan_to_line_end(false);
            return Stmt::Bad(BadStmt {
                span: Span::new(from, end),
                text: self.text_between(from, end).to_string(),
            });
        };

        // A parenthesis directly after the name (no blanks) makes the
        // definition function-like.
        if self.tok.kind == TokenKind::LParen {
            let lparen = self.tok.span.lo;
            self.next();
            let Some(params) = self.parse_param_list() else {
                let end = self.scan_to_line_end(false);
                return Stmt::Bad(BadStmt {
                    span: Span::new(from, end),
                    text: self.text_between(from, end).to_string(),
                });
            };
            let rparen = self.tok.span.lo;
            self.next(); // ')'
            self.skip_blank_splice();
            let body = self.parse_body_elems(BodyMode::Function);
            let to = body.last().map_or(rparen + 1, Elem::end);
            self.consume_newline();
            return Stmt::FnDef(FnDef {
                span: Span::new(from, to),
                name,
                lparen,
                params,
                rparen,
                body,
            });
        }

        self.skip_blank_splice();
        let body = self.parse_body_elems(BodyMode::Object);
        let to = body.last().map_or_else(|| name.end(), Elem::end);
        self.consume_newline();
        Stmt::ObjectDef(ObjectDef {
            span: Span::new(from, to),
            name,
            body,
        })
    }

    /// Parse a `(P1, …, Pn)` parameter list; the current token is just past
    /// `(` on entry and is the `)` on successful exit.
    fn parse_param_list(&mut self) -> Option<Vec<IdentElem>> {
        let mut params = Vec::new();
        self.skip_blank_splice();
        loop {
            match self.tok.kind {
                TokenKind::RParen => return Some(params),
                TokenKind::Ident => {
                    let tok = self.next();
                    params.push(IdentElem::new(tok.span.lo, tok.text));
                    self.skip_blank_splice();
                    match self.tok.kind {
                        TokenKind::RParen => return Some(params),
                        TokenKind::Comma => {
                            self.next();
                            self.skip_blank_splice();
                        }
                        _ => break,
                    }
                }
                _ => break,
            }
        }
        let err = ParseError::BadParamList {
            found: self.tok.kind.description(),
            span: self.tok.span,
        };
        self.error(&err);
        None
    }

    /// Parse a definition body up to (not including) the line's newline.
    fn parse_body_elems(&mut self, mode: BodyMode) -> Vec<Elem> {
        let mut elems: Vec<Elem> = Vec::new();
        loop {
            match self.tok.kind {
                TokenKind::Newline | TokenKind::Eof => break,
                TokenKind::Hash if mode == BodyMode::Function => {
                    let hash = self.next();
                    if self.tok.kind == TokenKind::Ident {
                        let tok = self.next();
                        elems.push(Elem::Stringize(cpre_ast::StringizeElem {
                            pos: hash.span.lo,
                            name: IdentElem::new(tok.span.lo, tok.text),
                        }));
                    } else {
                        elems.push(Elem::Text(TextElem::new(
                            hash.span.lo,
                            TokenKind::Hash,
                            hash.text,
                        )));
                    }
                }
                TokenKind::HashHash if mode == BodyMode::Function => {
                    // Bind the paste to the nearest preceding element,
                    // dropping interleaved blanks.
                    while elems.last().is_some_and(Elem::is_blank) {
                        elems.pop();
                    }
                    let op = self.next();
                    match elems.pop() {
                        Some(x) => {
                            self.skip_blank_splice();
                            if matches!(self.tok.kind, TokenKind::Newline | TokenKind::Eof) {
                                self.error_at(op.span, "`##` is missing a right operand");
                                elems.push(x);
                                elems.push(Elem::Text(TextElem::new(
                                    op.span.lo,
                                    TokenKind::HashHash,
                                    op.text,
                                )));
                            } else {
                                let y = self.parse_elem(mode);
                                elems.push(Elem::Paste(cpre_ast::PasteElem {
                                    x: Box::new(x),
                                    pos: op.span.lo,
                                    y: Box::new(y),
                                }));
                            }
                        }
                        None => {
                            self.error_at(op.span, "`##` is missing a left operand");
                            elems.push(Elem::Text(TextElem::new(
                                op.span.lo,
                                TokenKind::HashHash,
                                op.text,
                            )));
                        }
                    }
                }
                _ => elems.push(self.parse_elem(mode)),
            }
        }
        elems
    }

    fn consume_newline(&mut self) {
        if self.tok.kind == TokenKind::Newline {
            self.next();
        }
    }

    // ========================================================================
    // Conditionals
    // ========================================================================

    fn parse_conditional(&mut self, from: BytePos, kind: IfKind) -> Stmt {
        let ifs = self.parse_if_link(from, kind);
        Stmt::If(Box::new(ifs))
    }

    /// Parse one link of a conditional chain; the current token is the
    /// opening keyword (`if`/`ifdef`/`ifndef`/`elif`).
    fn parse_if_link(&mut self, from: BytePos, kind: IfKind) -> IfStmt {
        self.next(); // keyword
        let (cond, cond_span) = match kind {
            IfKind::If | IfKind::Elif => self.parse_condition(from),
            IfKind::Ifdef | IfKind::Ifndef => {
                self.skip_blank_splice();
                let name = self
                    .expect_ident("a macro name")
                    .unwrap_or_else(|| IdentElem::new(self.tok.span.lo, ""));
                let end = self.scan_to_line_end(true);
                (Cond::Name(name), Span::new(from, end))
            }
        };

        let (then, end) = self.parse_branch_body();
        let mut stmt = IfStmt {
            span: Span::new(from, cond_span.hi),
            kind,
            cond,
            cond_span,
            then,
            els: None,
            endif_span: Span::DUMMY,
        };

        match end {
            BranchEnd::Elif { hash } => {
                let link = self.parse_if_link(hash, IfKind::Elif);
                stmt.span = Span::new(from, link.span.hi);
                stmt.endif_span = link.endif_span;
                stmt.els = Some(ElseArm::Elif(Box::new(link)));
            }
            BranchEnd::Else { span } => {
                let (body, endif_span) = self.parse_else_body(span.lo);
                stmt.span = Span::new(from, endif_span.hi.max(body.span().hi));
                stmt.endif_span = endif_span;
                stmt.els = Some(ElseArm::Else { span, body });
            }
            BranchEnd::Endif { hash, end } => {
                stmt.endif_span = Span::new(hash, end);
                stmt.span = Span::new(from, end);
            }
            BranchEnd::Eof => {
                let err = ParseError::UnterminatedConditional {
                    span: Span::new(from, cond_span.hi),
                };
                self.error(&err);
                stmt.endif_span = Span::new(self.tok.span.lo, self.tok.span.lo);
                stmt.span = Span::new(from, self.tok.span.lo);
            }
        }
        stmt
    }

    /// Collect the body of an `#else` branch through the closing `#endif`.
    fn parse_else_body(&mut self, else_hash: BytePos) -> (Block, Span) {
        let mut body;
        let mut end;
        (body, end) = self.parse_branch_body();
        loop {
            match end {
                BranchEnd::Endif { hash, end } => return (body, Span::new(hash, end)),
                BranchEnd::Eof => {
                    let err = ParseError::UnterminatedConditional {
                        span: Span::new(else_hash, else_hash + 1),
                    };
                    self.error(&err);
                    let at = self.tok.span.lo;
                    return (body, Span::new(at, at));
                }
                BranchEnd::Elif { .. } => {
                    self.error_at(self.tok.span, "`#elif` after `#else`");
                    self.next(); // keyword
                    self.scan_to_line_end(false);
                }
                BranchEnd::Else { span } => {
                    self.error_at(span, "duplicate `#else`");
                }
            }
            let (more, next_end) = self.parse_branch_body();
            body.stmts.extend(more.stmts);
            end = next_end;
        }
    }

    /// Collect statements until a branch delimiter at this nesting depth.
    fn parse_branch_body(&mut self) -> (Block, BranchEnd) {
        let mut block = Block::new();
        loop {
            match self.tok.kind {
                TokenKind::Eof => return (block, BranchEnd::Eof),
                TokenKind::DirectiveHash => {
                    let state = self.save_state();
                    let hash = self.tok.span.lo;
                    self.next();
                    self.skip_blank_splice();
                    match self.tok.kind {
                        TokenKind::KwElif => return (block, BranchEnd::Elif { hash }),
                        TokenKind::KwElse => {
                            self.next();
                            let end = self.scan_to_line_end(true);
                            return (
                                block,
                                BranchEnd::Else {
                                    span: Span::new(hash, end),
                                },
                            );
                        }
                        TokenKind::KwEndif => {
                            self.next();
                            let end = self.scan_to_line_end(true);
                            return (block, BranchEnd::Endif { hash, end });
                        }
                        _ => {
                            self.restore_state(state);
                            let stmt = self.parse_directive();
                            block.push(stmt);
                        }
                    }
                }
                _ => {
                    let stmt = self.parse_text_block();
                    block.push(stmt);
                }
            }
        }
    }

    /// Collect a `#if`/`#elif` condition: the raw directive text to end of
    /// line, splices deleted and comments blanked, parsed by the expression
    /// sub-parser anchored at the condition's first token.
    fn parse_condition(&mut self, from: BytePos) -> (Cond, Span) {
        self.skip_blank_splice();
        let anchor = self.tok.span.lo;
        let mut text = String::new();
        loop {
            match self.tok.kind {
                TokenKind::Newline | TokenKind::Eof => break,
                TokenKind::Splice => {
                    self.next();
                }
                TokenKind::LineComment | TokenKind::BlockComment => {
                    text.push(' ');
                    self.next();
                }
                _ => {
                    let tok = self.next();
                    text.push_str(&tok.text);
                }
            }
        }
        let end = self.tok.span.lo;
        self.consume_newline();

        let (expr, diags) = parse_expression(&text, anchor);
        self.handler.merge(diags);
        (Cond::Expr(expr), Span::new(from, end))
    }
}

/// Parse a whole source file. Returns the statement tree and all lexical
/// and structural diagnostics, merged and ordered by position.
pub fn parse(src: &str) -> (Block, Vec<Diagnostic>) {
    let mut parser = Parser::new(src);
    let block = parser.parse();
    let diagnostics = parser.finish_diagnostics();
    (block, diagnostics)
}

/// Parse a constant expression from a fragment. `anchor` is the position in
/// the original source the fragment's first byte corresponds to; node
/// positions and diagnostics are rebased onto it.
pub fn parse_expression(src: &str, anchor: BytePos) -> (Expr, Vec<Diagnostic>) {
    let mut parser = Parser::new_at(src, anchor);
    let expr = parser.parse_expression_toplevel();
    let diagnostics = parser.finish_diagnostics();
    (expr, diagnostics)
}

/// Parse a body-element sequence from a fragment, with `#`/`##` recognised
/// as in function-like macro bodies. This is the reparse entry point used
/// by the token-paste operator.
pub fn parse_body(src: &str, anchor: BytePos) -> (Elem, Vec<Diagnostic>) {
    let mut parser = Parser::new_at(src, anchor);
    let elems = parser.parse_body_elems(BodyMode::Function);
    let diagnostics = parser.finish_diagnostics();
    (Elem::seq_or_single(elems), diagnostics)
}

fn shift_span(span: Span, base: u32) -> Span {
    if base == 0 {
        span
    } else {
        Span::from_raw(span.lo.as_u32() + base, span.hi.as_u32() + base)
    }
}

/// Delete backslash-newline splices (`\`, optional `\r`s, `\n`) from text.
fn clear_splices(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j] == b'\r' {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'\n' {
                i = j + 1;
                continue;
            }
        }
        let c = text[i..].chars().next().unwrap();
        out.push(c);
        i += c.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests;
