//! Directive evaluation and output emission for cpre.
//!
//! The evaluator walks the statement tree, maintains the macro
//! environment, resolves conditionals, expands raw text, and appends to a
//! single output buffer. Every directive line is replaced by exactly
//! enough newline characters to keep surviving code on its original source
//! lines; conditional branches that are not taken are padded the same way.
//!
//! The expansion engine lives in `expand`, the constant-expression
//! interpreter in `expr`. Both call back into `cpre-parser` to re-parse
//! strings produced by expansion (token pasting, identifiers in expression
//! position).

#![warn(missing_docs)]

use cpre_ast::{Block, CommandKind, Cond, ElseArm, FnDef, IdentElem, IfKind, IfStmt, ObjectDef, Stmt};
use cpre_diagnostics::{Diagnostic, DiagnosticHandler};
use cpre_span::{SourceFile, Span};
use rustc_hash::FxHashMap;

mod expand;
mod expr;

pub use expand::quote_graphic;

/// Names that user code may not redefine.
const RESERVED: [&str; 2] = ["__LINE__", "__FUNCTION__"];

/// Default bound on the macro expansion stack; pathological inputs that
/// exceed it get a diagnostic and a truncated expansion.
const DEFAULT_MAX_DEPTH: usize = 256;

/// The evaluator: macro environment, output buffer, diagnostics, and the
/// position index of the source being preprocessed.
pub struct Evaluator<'t> {
    file: &'t SourceFile,
    macros: FxHashMap<String, Binding<'t>>,
    out: String,
    handler: DiagnosticHandler,
    /// Last `#line` directive seen; recorded but not applied to `__LINE__`.
    line_directive: Option<(String, Option<String>)>,
    max_depth: usize,
    /// Nesting of identifier/call re-evaluation inside constant expressions.
    expr_depth: usize,
}

/// What a macro name is bound to.
#[derive(Clone, Debug)]
enum Binding<'t> {
    /// An opaque replacement string.
    Text(String),
    /// A reference to an object-like definition statement.
    Object(&'t ObjectDef),
    /// A reference to a function-like definition statement.
    Function(&'t FnDef),
}

impl<'t> Evaluator<'t> {
    /// Create an evaluator over the given source file. `__FILE__` is
    /// preinstalled as the quoted file name.
    #[must_use]
    pub fn new(file: &'t SourceFile) -> Self {
        let mut macros = FxHashMap::default();
        macros.insert(
            "__FILE__".to_string(),
            Binding::Text(quote_graphic(&file.name)),
        );
        Self {
            file,
            macros,
            out: String::new(),
            handler: DiagnosticHandler::new(),
            line_directive: None,
            max_depth: DEFAULT_MAX_DEPTH,
            expr_depth: 0,
        }
    }

    /// Override the expansion depth bound.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Evaluate a statement tree, returning the output bytes.
    pub fn run(&mut self, tree: &'t Block) -> String {
        self.out = String::with_capacity(self.file.src.len());
        for stmt in &tree.stmts {
            self.eval_stmt(stmt);
        }
        std::mem::take(&mut self.out)
    }

    /// Take the diagnostics accumulated so far.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.handler.take_diagnostics()
    }

    /// Whether a name is currently bound in the macro environment.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// The `#line` directive last recorded, if any.
    #[must_use]
    pub fn line_directive(&self) -> Option<(&str, Option<&str>)> {
        self.line_directive
            .as_ref()
            .map(|(line, path)| (line.as_str(), path.as_deref()))
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.handler.emit(Diagnostic::error(span, message));
    }

    fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.handler.emit(Diagnostic::warning(span, message));
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn eval_stmt(&mut self, stmt: &'t Stmt) {
        match stmt {
            Stmt::Text(text) => {
                let mut env = expand::ExpandEnv::global(None);
                for elem in &text.elems {
                    let piece = self.expand(elem, &mut env);
                    self.out.push_str(&piece);
                }
            }
            Stmt::ObjectDef(def) => self.eval_define(&def.name, def.span, Binding::Object(def)),
            Stmt::FnDef(def) => self.eval_define(&def.name, def.span, Binding::Function(def)),
            Stmt::Undef(un) => {
                self.macros.remove(&un.name.name);
                self.placeholder(un.span);
            }
            Stmt::Include(inc) => {
                tracing::warn!(path = %inc.path, "#include is not resolved, emitting placeholder");
                self.placeholder(inc.span);
            }
            Stmt::Line(line) => {
                self.line_directive = Some((line.line.clone(), line.path.clone()));
                self.placeholder(line.span);
            }
            Stmt::Command(cmd) => {
                match cmd.kind {
                    CommandKind::Error => self.error(cmd.span, cmd.text.clone()),
                    CommandKind::Warning => self.warning(cmd.span, cmd.text.clone()),
                    CommandKind::Pragma => {}
                }
                self.placeholder(cmd.span);
            }
            Stmt::Invalid(inv) => self.placeholder(inv.span),
            Stmt::Bad(bad) => self.placeholder(bad.span),
            Stmt::If(ifs) => self.eval_conditional(ifs),
        }
    }

    fn eval_define(&mut self, name: &IdentElem, span: Span, binding: Binding<'t>) {
        let n = name.name.as_str();
        if RESERVED.contains(&n) {
            self.warning(span, format!("{n} redefined"));
            self.placeholder(span);
            return;
        }
        if self.macros.contains_key(n) {
            self.warning(span, format!("{n} redefined"));
        }
        self.macros.insert(n.to_string(), binding);
        self.placeholder(span);
    }

    fn eval_block(&mut self, block: &'t Block) {
        for stmt in &block.stmts {
            self.eval_stmt(stmt);
        }
    }

    // ========================================================================
    // Conditionals
    // ========================================================================

    fn eval_conditional(&mut self, head: &'t IfStmt) {
        let mut taken = false;
        let mut cur = head;

        loop {
            // The directive line(s) holding this link's condition.
            self.placeholder(Span::new(cur.span.lo, cur.cond_span.hi));

            let take_branch = !taken && self.eval_cond(cur);
            if take_branch {
                taken = true;
                self.eval_block(&cur.then);
            } else {
                let after = match &cur.els {
                    Some(ElseArm::Elif(next)) => next.span.lo,
                    Some(ElseArm::Else { span, .. }) => span.lo,
                    None => cur.endif_span.lo,
                };
                let start = self.file.lookup_line(cur.cond_span.hi) + 1;
                let end_line = self.file.lookup_line(after);
                if end_line > 0 && start <= end_line - 1 {
                    self.pad_lines(start, end_line - 1);
                }
            }

            match &cur.els {
                Some(ElseArm::Elif(next)) => cur = next.as_ref(),
                Some(ElseArm::Else { span, body }) => {
                    self.placeholder(*span);
                    if taken {
                        let start = self.file.lookup_line(span.hi) + 1;
                        let end_line = self.file.lookup_line(cur.endif_span.lo);
                        if end_line > 0 && start <= end_line - 1 {
                            self.pad_lines(start, end_line - 1);
                        }
                    } else {
                        self.eval_block(body);
                    }
                    break;
                }
                None => break,
            }
        }

        self.placeholder(head.endif_span);
    }

    fn eval_cond(&mut self, link: &IfStmt) -> bool {
        match &link.cond {
            Cond::Expr(expr) => {
                self.expr_depth = 0;
                self.eval_expr(expr).truthy()
            }
            Cond::Name(name) => {
                let defined = self.macros.contains_key(&name.name);
                match link.kind {
                    IfKind::Ifndef => !defined,
                    _ => defined,
                }
            }
        }
    }

    // ========================================================================
    // Newline padding
    // ========================================================================

    /// Replace a statement's source span with newlines, one per terminated
    /// source line the span covers.
    fn placeholder(&mut self, span: Span) {
        let from = self.file.lookup_line(span.lo);
        let to = self.file.lookup_line(span.hi);
        self.pad_lines(from, to);
    }

    /// Emit one newline per terminated line in the 0-indexed inclusive range.
    fn pad_lines(&mut self, from: usize, to: usize) {
        for line in from..=to {
            if self.file.line_terminated(line) {
                self.out.push('\n');
            }
        }
    }

    /// 1-indexed line number for a position (what `__LINE__` reports).
    fn line_number(&self, pos: cpre_span::BytePos) -> u32 {
        self.file.lookup_line_col(pos).line
    }
}

/// Evaluate a statement tree against its source file, returning the output
/// bytes and evaluation diagnostics.
pub fn evaluate(tree: &Block, file: &SourceFile) -> (String, Vec<Diagnostic>) {
    let mut evaluator = Evaluator::new(file);
    let out = evaluator.run(tree);
    (out, evaluator.take_diagnostics())
}

#[cfg(test)]
mod tests;
