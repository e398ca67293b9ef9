//! Lexical analysis for cpre.
//!
//! The lexer turns preprocessor input into a flat stream of positioned
//! atoms: identifiers, numeric/char/string literals, operators, comments,
//! newlines, backslash-newline splices, and raw text runs for everything
//! else. It distinguishes a `#` at the start of a logical line (directive
//! introducer) from an in-line `#` (stringize) and `##` (paste).
//!
//! A logical line starts at the beginning of input, after a newline, and
//! after a backslash-newline splice. Character and string literals are
//! scanned tentatively: a quote only opens a literal when a matching
//! unescaped closer appears before the end of the line, otherwise the quote
//! byte is emitted as plain text.
//!
//! Scanning can be snapshotted and restored, which the parser uses for
//! bounded look-ahead (deciding whether a `(` after an identifier belongs
//! to a macro call).

#![warn(missing_docs)]

use cpre_diagnostics::Diagnostic;
use cpre_span::Span;
use unicode_xid::UnicodeXID;

mod token;

pub use token::{Token, TokenKind};

/// A lexer over preprocessor source text.
pub struct Lexer<'src> {
    /// The source being lexed.
    src: &'src str,
    /// Current byte position.
    pos: usize,
    /// Whether the next token starts a logical line.
    at_line_start: bool,
    /// Accumulated lexical diagnostics.
    diagnostics: Vec<Diagnostic>,
}

/// A restorable snapshot of the scanning state.
#[derive(Clone, Copy, Debug)]
pub struct LexerState {
    pos: usize,
    at_line_start: bool,
    diagnostics_len: usize,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source.
    #[must_use]
    pub fn new(src: &'src str) -> Self {
        Self {
            src,
            pos: 0,
            at_line_start: true,
            diagnostics: Vec::new(),
        }
    }

    /// Take the accumulated diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Snapshot the scanning state.
    #[must_use]
    pub fn save(&self) -> LexerState {
        LexerState {
            pos: self.pos,
            at_line_start: self.at_line_start,
            diagnostics_len: self.diagnostics.len(),
        }
    }

    /// Restore a previously saved scanning state.
    pub fn restore(&mut self, state: LexerState) {
        self.pos = state.pos;
        self.at_line_start = state.at_line_start;
        self.diagnostics.truncate(state.diagnostics_len);
    }

    fn remaining(&self) -> &'src str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.remaining().chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn bump_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if pred(c) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn error(&mut self, at: usize, message: impl Into<String>) {
        let pos = at as u32;
        self.diagnostics
            .push(Diagnostic::error(Span::from_raw(pos, pos + 1), message));
    }

    /// Produce the next token. Returns an [`TokenKind::Eof`] token forever
    /// once the input is exhausted.
    pub fn next_token(&mut self) -> Token {
        let start = self.pos;
        let line_start = self.at_line_start;

        let Some(c) = self.peek() else {
            return self.finish(start, TokenKind::Eof);
        };

        let kind = if is_ident_start(c) {
            self.scan_ident()
        } else if c.is_ascii_digit() {
            self.scan_number()
        } else if c == '\'' && self.char_lit_ahead() {
            self.scan_char_lit()
        } else if c == '"' && self.str_lit_ahead() {
            self.scan_str_lit()
        } else if c == '#' && line_start {
            self.bump();
            TokenKind::DirectiveHash
        } else {
            self.scan_operator_or_text(c)
        };

        self.finish(start, kind)
    }

    fn finish(&mut self, start: usize, kind: TokenKind) -> Token {
        self.at_line_start = matches!(kind, TokenKind::Newline | TokenKind::Splice);
        Token::new(
            kind,
            self.src[start..self.pos].to_string(),
            Span::from_raw(start as u32, self.pos as u32),
        )
    }

    fn scan_ident(&mut self) -> TokenKind {
        let start = self.pos;
        self.bump_while(is_ident_continue);
        TokenKind::from_keyword(&self.src[start..self.pos]).unwrap_or(TokenKind::Ident)
    }

    // ========================================================================
    // Numbers
    // ========================================================================

    fn scan_number(&mut self) -> TokenKind {
        let mut kind = TokenKind::Int;
        let mut base = 10u32;

        if self.peek() == Some('0') {
            self.bump();
            match self.peek().map(to_lower) {
                Some('x') => {
                    self.bump();
                    base = 16;
                }
                Some('b') => {
                    self.bump();
                    base = 2;
                }
                _ => base = 8,
            }
        }
        self.scan_digits(base);

        if self.peek() == Some('.') {
            kind = TokenKind::Float;
            self.bump();
            self.scan_digits(base);
        }

        if let Some(e) = self.peek().map(to_lower) {
            if e == 'e' || e == 'p' {
                if e == 'e' && base != 10 && base != 8 {
                    self.error(self.pos, "'e' exponent requires decimal mantissa");
                } else if e == 'p' && base != 16 {
                    self.error(self.pos, "'p' exponent requires hexadecimal mantissa");
                }
                self.bump();
                kind = TokenKind::Float;
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.bump();
                }
                self.scan_digits(10);
            }
        }

        // Trailing suffix letters. An `f`/`F` flips a plain integer to a
        // floating kind unless a `u`/`U` was seen first.
        let mut unsigned = false;
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphabetic() {
                break;
            }
            match to_lower(c) {
                'u' => unsigned = true,
                'f' if !unsigned && kind == TokenKind::Int => kind = TokenKind::Float,
                _ => {}
            }
            self.bump();
        }

        kind
    }

    fn scan_digits(&mut self, base: u32) {
        self.bump_while(|c| match base {
            16 => c.is_ascii_hexdigit(),
            _ => c.to_digit(10).is_some_and(|d| d < base),
        });
    }

    // ========================================================================
    // Character and string literals
    // ========================================================================

    /// Tentatively scan a character literal: exactly one character or escape
    /// followed by a closing quote on the same line.
    fn char_lit_ahead(&mut self) -> bool {
        let state = self.save();
        let ok = self.scan_char_body();
        self.restore(state);
        ok
    }

    fn scan_char_body(&mut self) -> bool {
        self.bump(); // opening quote
        match self.peek() {
            None | Some('\n') | Some('\'') => return false,
            Some('\\') => {
                self.bump();
                match self.peek() {
                    None | Some('\n') => return false,
                    Some('x') => {
                        self.bump();
                        self.bump_while(|c| c.is_ascii_hexdigit());
                    }
                    Some(c) if ('0'..='7').contains(&c) => {
                        self.bump_while(|c| ('0'..='7').contains(&c));
                    }
                    _ => {
                        self.bump();
                    }
                }
            }
            _ => {
                self.bump();
            }
        }
        if self.peek() == Some('\'') {
            self.bump();
            true
        } else {
            false
        }
    }

    fn scan_char_lit(&mut self) -> TokenKind {
        self.scan_char_body();
        TokenKind::Char
    }

    /// Tentatively scan a string literal: a matching unescaped closing quote
    /// before the end of the line.
    fn str_lit_ahead(&mut self) -> bool {
        let state = self.save();
        let ok = self.scan_str_body();
        self.restore(state);
        ok
    }

    fn scan_str_body(&mut self) -> bool {
        self.bump(); // opening quote
        loop {
            match self.peek() {
                None | Some('\n') => return false,
                Some('"') => {
                    self.bump();
                    return true;
                }
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        None | Some('\n') => return false,
                        _ => {
                            self.bump();
                        }
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn scan_str_lit(&mut self) -> TokenKind {
        self.scan_str_body();
        TokenKind::Str
    }

    // ========================================================================
    // Comments, operators, text
    // ========================================================================

    fn scan_operator_or_text(&mut self, c: char) -> TokenKind {
        let start = self.pos;
        match c {
            '/' => {
                self.bump();
                match self.peek() {
                    Some('/') => {
                        self.bump_while(|c| c != '\n');
                        TokenKind::LineComment
                    }
                    Some('*') => {
                        self.bump();
                        loop {
                            match self.bump() {
                                None => {
                                    self.error(start, "comment not terminated");
                                    break;
                                }
                                Some('*') if self.peek() == Some('/') => {
                                    self.bump();
                                    break;
                                }
                                _ => {}
                            }
                        }
                        TokenKind::BlockComment
                    }
                    _ => TokenKind::Slash,
                }
            }
            '(' => {
                self.bump();
                TokenKind::LParen
            }
            ')' => {
                self.bump();
                TokenKind::RParen
            }
            ',' => {
                self.bump();
                TokenKind::Comma
            }
            '+' => {
                self.bump();
                TokenKind::Plus
            }
            '-' => {
                self.bump();
                TokenKind::Minus
            }
            '*' => {
                self.bump();
                TokenKind::Star
            }
            '%' => {
                self.bump();
                TokenKind::Percent
            }
            '^' => {
                self.bump();
                TokenKind::Caret
            }
            '~' => {
                self.bump();
                TokenKind::Tilde
            }
            '&' => self.one_or_two('&', TokenKind::Amp, TokenKind::AmpAmp),
            '|' => self.one_or_two('|', TokenKind::Pipe, TokenKind::PipePipe),
            '=' => self.one_or_two('=', TokenKind::Assign, TokenKind::EqEq),
            '!' => self.one_or_two('=', TokenKind::Bang, TokenKind::BangEq),
            '<' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        TokenKind::Le
                    }
                    Some('<') => {
                        self.bump();
                        TokenKind::Shl
                    }
                    _ => TokenKind::Lt,
                }
            }
            '>' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        TokenKind::Ge
                    }
                    Some('>') => {
                        self.bump();
                        TokenKind::Shr
                    }
                    _ => TokenKind::Gt,
                }
            }
            '#' => self.one_or_two('#', TokenKind::Hash, TokenKind::HashHash),
            '\\' => {
                // A splice is backslash, any carriage returns, one newline.
                let state = self.save();
                self.bump();
                self.bump_while(|c| c == '\r');
                if self.peek() == Some('\n') {
                    self.bump();
                    TokenKind::Splice
                } else {
                    self.restore(state);
                    self.bump();
                    TokenKind::Text
                }
            }
            '\n' => {
                self.bump();
                TokenKind::Newline
            }
            '\r' => {
                let state = self.save();
                self.bump_while(|c| c == '\r');
                if self.peek() == Some('\n') {
                    self.bump();
                    TokenKind::Newline
                } else {
                    self.restore(state);
                    self.bump();
                    TokenKind::Text
                }
            }
            '\'' | '"' => {
                // A quote that failed its tentative literal scan.
                self.bump();
                TokenKind::Text
            }
            '\0' => {
                self.error(start, "illegal character NUL");
                self.bump();
                TokenKind::Text
            }
            _ => {
                self.bump_while(|c| !is_text_boundary(c));
                TokenKind::Text
            }
        }
    }

    fn one_or_two(&mut self, second: char, one: TokenKind, two: TokenKind) -> TokenKind {
        self.bump();
        if self.peek() == Some(second) {
            self.bump();
            two
        } else {
            one
        }
    }
}

const fn to_lower(c: char) -> char {
    c.to_ascii_lowercase()
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$' || (!c.is_ascii() && c.is_xid_start())
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || (!c.is_ascii() && c.is_xid_continue())
}

/// Characters that terminate a raw text run.
fn is_text_boundary(c: char) -> bool {
    is_ident_start(c)
        || c.is_ascii_digit()
        || matches!(
            c,
            '\\' | '/'
                | '\''
                | '"'
                | '('
                | ')'
                | ','
                | '+'
                | '-'
                | '*'
                | '%'
                | '&'
                | '|'
                | '='
                | '^'
                | '~'
                | '<'
                | '>'
                | '!'
                | '\n'
                | '\r'
                | '#'
                | '\0'
        )
}
