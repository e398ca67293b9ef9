//! Token definitions for the cpre lexer.

use cpre_span::{BytePos, Span};
use std::fmt;

/// A token produced by the lexer: a kind, the exact source lexeme, and the
/// byte span it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The source text of the token, exactly as written.
    pub text: String,
    /// The byte span of the token.
    pub span: Span,
}

impl Token {
    /// Create a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, text: String, span: Span) -> Self {
        Self { kind, text, span }
    }

    /// The start position of the token.
    #[must_use]
    pub const fn pos(&self) -> BytePos {
        self.span.lo
    }

    /// The end position of the token.
    #[must_use]
    pub const fn end(&self) -> BytePos {
        self.span.hi
    }

    /// Whether this token is raw text consisting only of blanks
    /// (spaces, tabs, carriage returns).
    #[must_use]
    pub fn is_blank_text(&self) -> bool {
        self.kind == TokenKind::Text && self.text.chars().all(|c| matches!(c, ' ' | '\t' | '\r'))
    }
}

/// The kind of token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// End of input.
    Eof,
    /// A run of characters that form no other token.
    Text,
    /// `// …` to end of line.
    LineComment,
    /// `/* … */`, possibly spanning lines.
    BlockComment,
    /// `\r*\n`.
    Newline,
    /// Backslash, optional carriage returns, newline: a line continuation.
    Splice,

    /// An identifier.
    Ident,
    /// An integer literal.
    Int,
    /// A floating-point literal.
    Float,
    /// A character literal, quotes included.
    Char,
    /// A string literal, quotes included.
    Str,

    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `~`
    Tilde,
    /// `&&`
    AmpAmp,
    /// `||`
    PipePipe,
    /// `!`
    Bang,
    /// `==`
    EqEq,
    /// `!=`
    BangEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `=`
    Assign,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// A `#` that is not at the start of a logical line: the stringize operator.
    Hash,
    /// `##`: the token-pasting operator.
    HashHash,
    /// A `#` at the start of a logical line, introducing a directive.
    DirectiveHash,

    /// `include`
    KwInclude,
    /// `define`
    KwDefine,
    /// `undef`
    KwUndef,
    /// `if`
    KwIf,
    /// `ifdef`
    KwIfdef,
    /// `ifndef`
    KwIfndef,
    /// `elif`
    KwElif,
    /// `else`
    KwElse,
    /// `endif`
    KwEndif,
    /// `line`
    KwLine,
    /// `error`
    KwError,
    /// `warning`
    KwWarning,
    /// `pragma`
    KwPragma,
    /// `defined`
    KwDefined,
}

impl TokenKind {
    /// Convert a word to its directive-keyword kind, if it is one.
    #[must_use]
    pub fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "include" => Self::KwInclude,
            "define" => Self::KwDefine,
            "undef" => Self::KwUndef,
            "if" => Self::KwIf,
            "ifdef" => Self::KwIfdef,
            "ifndef" => Self::KwIfndef,
            "elif" => Self::KwElif,
            "else" => Self::KwElse,
            "endif" => Self::KwEndif,
            "line" => Self::KwLine,
            "error" => Self::KwError,
            "warning" => Self::KwWarning,
            "pragma" => Self::KwPragma,
            "defined" => Self::KwDefined,
            _ => return None,
        })
    }

    /// Check if this is a directive keyword (not counting `defined`).
    #[must_use]
    pub fn is_directive_keyword(&self) -> bool {
        matches!(
            self,
            Self::KwInclude
                | Self::KwDefine
                | Self::KwUndef
                | Self::KwIf
                | Self::KwIfdef
                | Self::KwIfndef
                | Self::KwElif
                | Self::KwElse
                | Self::KwEndif
                | Self::KwLine
                | Self::KwError
                | Self::KwWarning
                | Self::KwPragma
        )
    }

    /// Check if this is a literal kind.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Char | Self::Str)
    }

    /// Check if this is a comment kind.
    #[must_use]
    pub fn is_comment(&self) -> bool {
        matches!(self, Self::LineComment | Self::BlockComment)
    }

    /// Get the name of the token for error messages.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Eof => "end of input",
            Self::Text => "text",
            Self::LineComment | Self::BlockComment => "comment",
            Self::Newline => "newline",
            Self::Splice => "line continuation",
            Self::Ident => "identifier",
            Self::Int => "integer literal",
            Self::Float => "float literal",
            Self::Char => "character literal",
            Self::Str => "string literal",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Star => "`*`",
            Self::Slash => "`/`",
            Self::Percent => "`%`",
            Self::Amp => "`&`",
            Self::Pipe => "`|`",
            Self::Caret => "`^`",
            Self::Shl => "`<<`",
            Self::Shr => "`>>`",
            Self::Tilde => "`~`",
            Self::AmpAmp => "`&&`",
            Self::PipePipe => "`||`",
            Self::Bang => "`!`",
            Self::EqEq => "`==`",
            Self::BangEq => "`!=`",
            Self::Lt => "`<`",
            Self::Gt => "`>`",
            Self::Le => "`<=`",
            Self::Ge => "`>=`",
            Self::Assign => "`=`",
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::Comma => "`,`",
            Self::Hash => "`#`",
            Self::HashHash => "`##`",
            Self::DirectiveHash => "`#`",
            Self::KwInclude => "`include`",
            Self::KwDefine => "`define`",
            Self::KwUndef => "`undef`",
            Self::KwIf => "`if`",
            Self::KwIfdef => "`ifdef`",
            Self::KwIfndef => "`ifndef`",
            Self::KwElif => "`elif`",
            Self::KwElse => "`else`",
            Self::KwEndif => "`endif`",
            Self::KwLine => "`line`",
            Self::KwError => "`error`",
            Self::KwWarning => "`warning`",
            Self::KwPragma => "`pragma`",
            Self::KwDefined => "`defined`",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
