//! Syntax tree definitions for cpre.
//!
//! Two families of nodes come out of the parser:
//!
//! - **Body elements** ([`Elem`]) are the building blocks of macro
//!   definition bodies, macro call arguments, and the raw text between
//!   directives. The evaluator never mutates them; expansion builds new
//!   strings.
//! - **Statements** ([`Stmt`]) are directive lines and raw-text blocks,
//!   grouped into [`Block`]s, with conditional chains represented as
//!   right-leaning else-chains.
//!
//! Constant expressions for `#if`/`#elif` conditions are a third, small
//! family ([`Expr`]) sharing the literal/identifier/call leaves with the
//! element world.

#![warn(missing_docs)]

use cpre_lexer::TokenKind;
use cpre_span::{BytePos, Span};

// ============================================================================
// Body elements
// ============================================================================

/// An identifier occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentElem {
    /// Position of the first byte of the name.
    pub pos: BytePos,
    /// The identifier text.
    pub name: String,
}

impl IdentElem {
    /// Create a new identifier element.
    #[must_use]
    pub fn new(pos: BytePos, name: impl Into<String>) -> Self {
        Self {
            pos,
            name: name.into(),
        }
    }

    /// Position just past the identifier.
    #[must_use]
    pub fn end(&self) -> BytePos {
        self.pos + self.name.len() as u32
    }

    /// The span of the identifier.
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.pos, self.end())
    }
}

/// A verbatim piece of text: whitespace, operators, comments, splices,
/// keywords outside directive position — anything that expansion passes
/// through (or filters) without interpreting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextElem {
    /// Position of the first byte.
    pub pos: BytePos,
    /// The token kind the text came from.
    pub kind: TokenKind,
    /// The text itself.
    pub text: String,
}

impl TextElem {
    /// Create a new text element.
    #[must_use]
    pub fn new(pos: BytePos, kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            pos,
            kind,
            text: text.into(),
        }
    }

    /// Whether the text consists only of blanks (spaces, tabs, carriage
    /// returns). Used when trimming macro arguments.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.chars().all(|c| matches!(c, ' ' | '\t' | '\r'))
    }

    /// The span of the text.
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.pos, self.pos + self.text.len() as u32)
    }
}

/// The kind of a literal element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LitKind {
    /// Integer literal.
    Int,
    /// Floating literal.
    Float,
    /// Character literal.
    Char,
    /// String literal.
    Str,
}

/// A numeric, character or string literal, lexeme preserved verbatim
/// (quotes included for char/string).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LitElem {
    /// Position of the first byte.
    pub pos: BytePos,
    /// The literal kind.
    pub kind: LitKind,
    /// The literal lexeme.
    pub text: String,
}

impl LitElem {
    /// Create a new literal element.
    #[must_use]
    pub fn new(pos: BytePos, kind: LitKind, text: impl Into<String>) -> Self {
        Self {
            pos,
            kind,
            text: text.into(),
        }
    }

    /// The span of the literal.
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.pos, self.pos + self.text.len() as u32)
    }
}

/// A macro call form: `name(arg, …)`. Each argument is a single element;
/// multi-element arguments are [`Elem::Seq`] sequences.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallElem {
    /// The callee.
    pub name: IdentElem,
    /// Position of `(`.
    pub lparen: BytePos,
    /// The comma-split arguments.
    pub args: Vec<Elem>,
    /// Position of `)`.
    pub rparen: BytePos,
}

impl CallElem {
    /// The span of the whole call form.
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.name.pos, self.rparen + 1)
    }

    /// The number of spaces between the callee name and `(` in the source.
    #[must_use]
    pub fn gap(&self) -> u32 {
        self.lparen - self.name.end()
    }
}

/// The stringize form `#param`, only meaningful in function-like bodies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringizeElem {
    /// Position of `#`.
    pub pos: BytePos,
    /// The operand, which must name a macro parameter.
    pub name: IdentElem,
}

/// The token-paste form `x ## y`, only meaningful in function-like bodies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasteElem {
    /// Left operand.
    pub x: Box<Elem>,
    /// Position of `##`.
    pub pos: BytePos,
    /// Right operand.
    pub y: Box<Elem>,
}

/// A body element: one node of the union used for macro definition
/// contents, macro call arguments, and free text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Elem {
    /// Verbatim text.
    Text(TextElem),
    /// A potentially expandable identifier.
    Ident(IdentElem),
    /// A literal, passed through verbatim.
    Lit(LitElem),
    /// A macro invocation form.
    Call(CallElem),
    /// `#param`.
    Stringize(StringizeElem),
    /// `x ## y`.
    Paste(PasteElem),
    /// An ordered sequence of elements.
    Seq(Vec<Elem>),
}

impl Elem {
    /// Wrap a list of elements: a single element stays bare, anything else
    /// becomes a sequence.
    #[must_use]
    pub fn seq_or_single(mut elems: Vec<Elem>) -> Elem {
        if elems.len() == 1 {
            elems.pop().unwrap()
        } else {
            Elem::Seq(elems)
        }
    }

    /// The start position of the element (`BytePos::ZERO` for an empty
    /// sequence).
    #[must_use]
    pub fn pos(&self) -> BytePos {
        match self {
            Elem::Text(t) => t.pos,
            Elem::Ident(i) => i.pos,
            Elem::Lit(l) => l.pos,
            Elem::Call(c) => c.name.pos,
            Elem::Stringize(s) => s.pos,
            Elem::Paste(p) => p.x.pos(),
            Elem::Seq(s) => s.first().map_or(BytePos::ZERO, Elem::pos),
        }
    }

    /// The end position of the element.
    #[must_use]
    pub fn end(&self) -> BytePos {
        match self {
            Elem::Text(t) => t.span().hi,
            Elem::Ident(i) => i.end(),
            Elem::Lit(l) => l.span().hi,
            Elem::Call(c) => c.span().hi,
            Elem::Stringize(s) => s.name.end(),
            Elem::Paste(p) => p.y.end(),
            Elem::Seq(s) => s.last().map_or(BytePos::ZERO, Elem::end),
        }
    }

    /// The span of the element.
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.pos(), self.end())
    }

    /// Whether the element is blank text (candidate for argument trimming).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Elem::Text(t) if t.is_blank())
    }

    /// Whether the element is a bare identifier or literal; such elements
    /// paste by direct textual concatenation.
    #[must_use]
    pub fn is_atomic(&self) -> bool {
        matches!(self, Elem::Ident(_) | Elem::Lit(_))
    }
}

// ============================================================================
// Constant expressions
// ============================================================================

/// A unary operator in a constant expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `~`
    BitNot,
    /// `!`
    Not,
    /// `defined`
    Defined,
}

/// A binary operator in a constant expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `&&`
    LogAnd,
    /// `||`
    LogOr,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

/// A constant expression, as used by `#if`/`#elif` conditions.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A fragment the expression parser could not make sense of.
    Bad(Span, String),
    /// A literal term.
    Lit(LitElem),
    /// An identifier term (expanded and re-parsed at evaluation time).
    Ident(IdentElem),
    /// A function-like macro call term.
    Call(CallElem),
    /// A parenthesised sub-expression.
    Paren(Box<Expr>),
    /// A unary operation.
    Unary {
        /// Position of the operator.
        pos: BytePos,
        /// The operator.
        op: UnaryOp,
        /// The operand.
        x: Box<Expr>,
    },
    /// A binary operation.
    Binary {
        /// Left operand.
        x: Box<Expr>,
        /// Position of the operator.
        pos: BytePos,
        /// The operator.
        op: BinOp,
        /// Right operand.
        y: Box<Expr>,
    },
}

impl Expr {
    /// The position the expression starts at.
    #[must_use]
    pub fn pos(&self) -> BytePos {
        match self {
            Expr::Bad(span, _) => span.lo,
            Expr::Lit(l) => l.pos,
            Expr::Ident(i) => i.pos,
            Expr::Call(c) => c.name.pos,
            Expr::Paren(x) => x.pos(),
            Expr::Unary { pos, .. } => *pos,
            Expr::Binary { x, .. } => x.pos(),
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

/// An ordered list of statements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    /// The statements, in source order.
    pub stmts: Vec<Stmt>,
}

impl Block {
    /// Create an empty block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement.
    pub fn push(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    /// The source span covered by the block's statements, dummy if empty.
    #[must_use]
    pub fn span(&self) -> Span {
        match (self.stmts.first(), self.stmts.last()) {
            (Some(first), Some(last)) => first.span().to(last.span()),
            _ => Span::DUMMY,
        }
    }

    /// Visit every statement in the block, recursing into conditionals.
    pub fn walk(&self, f: &mut impl FnMut(&Stmt)) {
        for stmt in &self.stmts {
            stmt.walk(f);
        }
    }
}

/// A run of raw source text between directives.
#[derive(Clone, Debug, PartialEq)]
pub struct TextStmt {
    /// The span of the run.
    pub span: Span,
    /// The parsed elements (identifiers and call forms are recognised so
    /// the evaluator can expand them).
    pub elems: Vec<Elem>,
}

/// `#define NAME body…`
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDef {
    /// The directive's span, `#` through end of body.
    pub span: Span,
    /// The macro name.
    pub name: IdentElem,
    /// The replacement body; empty for flag defines.
    pub body: Vec<Elem>,
}

/// `#define NAME(P1,…,Pn) body…`
#[derive(Clone, Debug, PartialEq)]
pub struct FnDef {
    /// The directive's span.
    pub span: Span,
    /// The macro name.
    pub name: IdentElem,
    /// Position of `(`.
    pub lparen: BytePos,
    /// The parameter names.
    pub params: Vec<IdentElem>,
    /// Position of `)`.
    pub rparen: BytePos,
    /// The replacement body.
    pub body: Vec<Elem>,
}

/// `#undef NAME`
#[derive(Clone, Debug, PartialEq)]
pub struct UndefStmt {
    /// The directive's span.
    pub span: Span,
    /// The name to unbind.
    pub name: IdentElem,
}

/// Whether an include path was written `<…>` or `"…"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IncludeKind {
    /// `#include <path>`
    System,
    /// `#include "path"`
    Local,
}

/// `#include <path>` / `#include "path"` (placeholder semantics).
#[derive(Clone, Debug, PartialEq)]
pub struct IncludeStmt {
    /// The directive's span.
    pub span: Span,
    /// The path as written, delimiters included.
    pub path: String,
    /// System or local form.
    pub kind: IncludeKind,
}

/// `#line N ["file"]`, also reachable as `# N ["file"]`.
#[derive(Clone, Debug, PartialEq)]
pub struct LineStmt {
    /// The directive's span.
    pub span: Span,
    /// The line number lexeme.
    pub line: String,
    /// The optional file name lexeme, quotes included.
    pub path: Option<String>,
}

/// The kind of a free-text command directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `#error`
    Error,
    /// `#warning`
    Warning,
    /// `#pragma`
    Pragma,
}

/// `#error` / `#warning` / `#pragma` with the directive line captured
/// verbatim (splices removed).
#[derive(Clone, Debug, PartialEq)]
pub struct CommandStmt {
    /// The directive's span.
    pub span: Span,
    /// Error, warning or pragma.
    pub kind: CommandKind,
    /// The whole directive text, `#` included.
    pub text: String,
}

/// A `#`-line with no recognised directive, preserved verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct InvalidStmt {
    /// The line's span.
    pub span: Span,
    /// The line text.
    pub text: String,
}

/// A malformed directive (e.g. a bad `#define` parameter list) captured as
/// its raw text.
#[derive(Clone, Debug, PartialEq)]
pub struct BadStmt {
    /// The line's span.
    pub span: Span,
    /// The line text.
    pub text: String,
}

/// Which conditional directive opened a chain link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IfKind {
    /// `#if`
    If,
    /// `#elif`
    Elif,
    /// `#ifdef`
    Ifdef,
    /// `#ifndef`
    Ifndef,
}

/// The condition of a conditional directive.
#[derive(Clone, Debug, PartialEq)]
pub enum Cond {
    /// A constant expression (`#if` / `#elif`).
    Expr(Expr),
    /// A bare name (`#ifdef` / `#ifndef`).
    Name(IdentElem),
}

/// The continuation of a conditional chain.
#[derive(Clone, Debug, PartialEq)]
pub enum ElseArm {
    /// `#elif …`, itself a conditional with its own continuation.
    Elif(Box<IfStmt>),
    /// `#else` followed by a body.
    Else {
        /// The `#else` directive line's span.
        span: Span,
        /// The fallback body.
        body: Block,
    },
}

/// A conditional directive and its chain: `#if`/`#ifdef`/`#ifndef` with
/// zero or more `#elif` links, an optional `#else`, closed by `#endif`.
#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    /// From the opening `#` through the end of the `#endif` line.
    pub span: Span,
    /// Which directive opened this link.
    pub kind: IfKind,
    /// The branch condition.
    pub cond: Cond,
    /// The directive line(s) holding the condition, splices included.
    pub cond_span: Span,
    /// The branch body.
    pub then: Block,
    /// The rest of the chain.
    pub els: Option<ElseArm>,
    /// The `#endif` directive's span; dummy when the input ended without one.
    pub endif_span: Span,
}

/// A preprocessor statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// Raw text between directives.
    Text(TextStmt),
    /// An object-like definition.
    ObjectDef(ObjectDef),
    /// A function-like definition.
    FnDef(FnDef),
    /// An undefine.
    Undef(UndefStmt),
    /// An include (placeholder semantics).
    Include(IncludeStmt),
    /// A line directive.
    Line(LineStmt),
    /// `#error` / `#warning` / `#pragma`.
    Command(CommandStmt),
    /// An unrecognised directive.
    Invalid(InvalidStmt),
    /// A malformed directive.
    Bad(BadStmt),
    /// A conditional chain.
    If(Box<IfStmt>),
}

impl Stmt {
    /// The source span of the statement.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Stmt::Text(s) => s.span,
            Stmt::ObjectDef(s) => s.span,
            Stmt::FnDef(s) => s.span,
            Stmt::Undef(s) => s.span,
            Stmt::Include(s) => s.span,
            Stmt::Line(s) => s.span,
            Stmt::Command(s) => s.span,
            Stmt::Invalid(s) => s.span,
            Stmt::Bad(s) => s.span,
            Stmt::If(s) => s.span,
        }
    }

    /// Visit this statement and, for conditionals, every statement in the
    /// chain's branches.
    pub fn walk(&self, f: &mut impl FnMut(&Stmt)) {
        f(self);
        if let Stmt::If(ifs) = self {
            let mut cur = ifs;
            loop {
                cur.then.walk(f);
                match &cur.els {
                    Some(ElseArm::Elif(next)) => cur = next,
                    Some(ElseArm::Else { body, .. }) => {
                        body.walk(f);
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_or_single_unwraps() {
        let ident = Elem::Ident(IdentElem::new(BytePos::new(3), "x"));
        assert_eq!(Elem::seq_or_single(vec![ident.clone()]), ident);

        let two = Elem::seq_or_single(vec![
            Elem::Ident(IdentElem::new(BytePos::new(0), "a")),
            Elem::Ident(IdentElem::new(BytePos::new(2), "b")),
        ]);
        assert!(matches!(two, Elem::Seq(ref v) if v.len() == 2));
        assert_eq!(two.span(), Span::from_raw(0, 3));
    }

    #[test]
    fn blank_and_atomic() {
        let blank = Elem::Text(TextElem::new(
            BytePos::ZERO,
            cpre_lexer::TokenKind::Text,
            " \t",
        ));
        assert!(blank.is_blank());
        assert!(!blank.is_atomic());

        let lit = Elem::Lit(LitElem::new(BytePos::ZERO, LitKind::Int, "12"));
        assert!(lit.is_atomic());
        assert!(!lit.is_blank());
    }

    #[test]
    fn call_gap() {
        let call = CallElem {
            name: IdentElem::new(BytePos::new(0), "F"),
            lparen: BytePos::new(3),
            args: vec![],
            rparen: BytePos::new(4),
        };
        assert_eq!(call.gap(), 2);
        assert_eq!(call.span(), Span::from_raw(0, 5));
    }
}
