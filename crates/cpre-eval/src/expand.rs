//! The recursive macro expansion engine.
//!
//! Expansion turns a body element into output text under an expansion
//! environment: the stack of macro names currently being expanded (which
//! suppresses self-reference), the parameter bindings of the innermost
//! function-like expansion, and the anchor position `__LINE__` resolves
//! against.
//!
//! Two textual renderings exist side by side. `expand` is the full
//! expansion; [`string_form`] is the *unexpanded* rendering used for the
//! operands of `#` and `##`, which reproduces call forms with their
//! original name-to-parenthesis gap so calls round-trip through paste and
//! stringize contexts.

use crate::{Binding, Evaluator};
use cpre_ast::{CallElem, Elem, IdentElem, PasteElem, StringizeElem};
use cpre_lexer::TokenKind;
use cpre_span::{BytePos, Span};
use rustc_hash::FxHashMap;

/// The per-expansion context threaded through recursive expansion.
#[derive(Clone, Debug, Default)]
pub(crate) struct ExpandEnv {
    /// Anchor position for `__LINE__`; filled in by the outermost expansion.
    pub anchor: Option<BytePos>,
    /// Names of macros currently being expanded.
    pub stack: Vec<String>,
    /// Parameter bindings of the current function-like expansion.
    pub vals: FxHashMap<String, Elem>,
}

impl ExpandEnv {
    /// A fresh environment with no parameters and an empty stack.
    pub fn global(anchor: Option<BytePos>) -> Self {
        Self {
            anchor,
            ..Self::default()
        }
    }

    /// Whether `name` is somewhere on the expansion stack.
    pub fn in_stack(&self, name: &str) -> bool {
        self.stack.iter().any(|n| n == name)
    }
}

/// What an identifier resolves to in the macro environment, with the
/// borrow of the environment map already released.
enum Resolved<'t> {
    Text(String),
    Object(&'t cpre_ast::ObjectDef),
    Function,
    Unbound,
}

impl<'t> Evaluator<'t> {
    /// Expand one body element to output text.
    pub(crate) fn expand(&mut self, elem: &Elem, env: &mut ExpandEnv) -> String {
        match elem {
            Elem::Text(text) => {
                if matches!(text.kind, TokenKind::Splice | TokenKind::BlockComment) {
                    String::new()
                } else {
                    text.text.clone()
                }
            }
            Elem::Lit(lit) => lit.text.clone(),
            Elem::Seq(elems) => elems.iter().map(|e| self.expand(e, env)).collect(),
            Elem::Ident(ident) => self.expand_ident(ident, env),
            Elem::Call(call) => self.expand_call(call, env),
            Elem::Stringize(stringize) => self.expand_stringize(stringize, env),
            Elem::Paste(paste) => self.expand_paste(paste, env),
        }
    }

    fn resolve(&self, name: &str) -> Resolved<'t> {
        match self.macros.get(name) {
            Some(Binding::Text(s)) => Resolved::Text(s.clone()),
            Some(Binding::Object(def)) => Resolved::Object(*def),
            Some(Binding::Function(_)) => Resolved::Function,
            None => Resolved::Unbound,
        }
    }

    /// Expand an identifier occurrence.
    ///
    /// A name already on the stack is emitted literally — the
    /// self-reference suppression invariant. Parameters expand to their
    /// bound arguments; object-like macros expand their bodies with the
    /// name pushed; function-like macros expand only when called, so a
    /// bare reference stays the bare name.
    pub(crate) fn expand_ident(&mut self, ident: &IdentElem, env: &mut ExpandEnv) -> String {
        if env.in_stack(&ident.name) {
            return ident.name.clone();
        }
        if env.stack.len() >= self.max_depth {
            self.error(ident.span(), "macro expansion too deep");
            return ident.name.clone();
        }

        let saved_anchor = env.anchor;
        if env.anchor.is_none() {
            env.anchor = Some(ident.pos);
        }
        env.stack.push(ident.name.clone());

        let result = if let Some(bound) = env.vals.get(&ident.name).cloned() {
            self.expand(&bound, env)
        } else {
            match self.resolve(&ident.name) {
                Resolved::Text(s) => s,
                Resolved::Object(def) => {
                    def.body.iter().map(|e| self.expand(e, env)).collect()
                }
                Resolved::Function => ident.name.clone(),
                Resolved::Unbound => {
                    if ident.name == "__LINE__" {
                        let pos = env.anchor.unwrap_or(ident.pos);
                        self.line_number(pos).to_string()
                    } else {
                        ident.name.clone()
                    }
                }
            }
        };

        env.stack.pop();
        env.anchor = saved_anchor;
        result
    }

    /// Expand a call form. A defined function-like macro of matching arity
    /// expands its body under fresh parameter bindings; everything else —
    /// self-calls, arity mismatches, callees that are not function-like —
    /// re-emits the call as text with each argument expanded individually.
    pub(crate) fn expand_call(&mut self, call: &CallElem, env: &mut ExpandEnv) -> String {
        let name = call.name.name.as_str();
        let def = match self.macros.get(name) {
            Some(Binding::Function(def)) => Some(*def),
            _ => None,
        };
        let Some(def) = def else {
            return self.call_passthrough(call, env);
        };
        if env.in_stack(name) {
            return self.call_passthrough(call, env);
        }
        if env.stack.len() >= self.max_depth {
            self.error(call.name.span(), "macro expansion too deep");
            return self.call_passthrough(call, env);
        }
        if call.args.len() != def.params.len() {
            self.error(
                call.name.span(),
                format!(
                    "{name} expected {} params got {}",
                    def.params.len(),
                    call.args.len()
                ),
            );
            return self.call_passthrough(call, env);
        }

        let mut vals = FxHashMap::default();
        for (param, arg) in def.params.iter().zip(&call.args) {
            let bound = trim_blanks(substitute_params(arg, &env.vals));
            vals.insert(param.name.clone(), bound);
        }

        let saved_vals = std::mem::replace(&mut env.vals, vals);
        let saved_anchor = env.anchor;
        if env.anchor.is_none() {
            env.anchor = Some(call.name.pos);
        }
        env.stack.push(name.to_string());

        let result: String = def.body.iter().map(|e| self.expand(e, env)).collect();

        env.stack.pop();
        env.anchor = saved_anchor;
        env.vals = saved_vals;
        result
    }

    /// Re-emit a call as text: the callee expanded as an identifier, the
    /// original name-to-parenthesis gap, and each argument expanded.
    fn call_passthrough(&mut self, call: &CallElem, env: &mut ExpandEnv) -> String {
        let mut out = self.expand_ident(&call.name, env);
        for _ in 0..call.gap() {
            out.push(' ');
        }
        out.push('(');
        for (i, arg) in call.args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let piece = self.expand(arg, env);
            out.push_str(&piece);
        }
        out.push(')');
        out
    }

    /// `#param`: quote the parameter's unexpanded argument text.
    fn expand_stringize(&mut self, stringize: &StringizeElem, env: &mut ExpandEnv) -> String {
        match env.vals.get(&stringize.name.name) {
            Some(bound) => quote_graphic(string_form(bound).trim()),
            None => {
                self.error(
                    stringize.name.span(),
                    "'#' is not followed by a macro parameter",
                );
                String::new()
            }
        }
    }

    /// `x ## y`: atomic operands concatenate directly; anything else is
    /// glued around a literal `##`, re-parsed as a body sequence, and
    /// expanded, falling back to side-by-side expansion when the re-parse
    /// fails.
    fn expand_paste(&mut self, paste: &PasteElem, env: &mut ExpandEnv) -> String {
        let (x_text, x_atomic) = paste_operand(&paste.x, env);
        let (y_text, y_atomic) = paste_operand(&paste.y, env);
        if x_atomic && y_atomic {
            return x_text + &y_text;
        }

        let glued = format!("{x_text}##{y_text}");
        let (reparsed, diags) = cpre_parser::parse_body(&glued, paste.pos);
        if !diags.is_empty() {
            self.error(
                Span::new(paste.pos, paste.pos + 2),
                format!("cannot paste `{x_text}` and `{y_text}`"),
            );
            let mut out = self.expand(&paste.x, env);
            let rhs = self.expand(&paste.y, env);
            out.push_str(&rhs);
            return out;
        }

        match &reparsed {
            Elem::Seq(parts) => parts
                .iter()
                .map(|part| self.expand_reparsed(part, env))
                .collect(),
            single => self.expand_reparsed(single, env),
        }
    }

    /// Expand one element of a paste re-parse; nested pastes contribute
    /// their operands' string forms without further gluing.
    fn expand_reparsed(&mut self, elem: &Elem, env: &mut ExpandEnv) -> String {
        match elem {
            Elem::Paste(p) => string_form(&p.x) + &string_form(&p.y),
            other => self.expand(other, env),
        }
    }
}

/// A paste operand: its string form, and whether it is atomic (a bare
/// identifier or literal, possibly through a parameter binding).
fn paste_operand(elem: &Elem, env: &ExpandEnv) -> (String, bool) {
    if let Elem::Ident(ident) = elem {
        if let Some(bound) = env.vals.get(&ident.name) {
            return (string_form(bound), bound.is_atomic());
        }
    }
    (string_form(elem), elem.is_atomic())
}

/// The unexpanded textual rendering of an element: identifiers contribute
/// their names, calls re-assemble as `name(arg,…)` with the original gap,
/// splices and block comments vanish.
pub(crate) fn string_form(elem: &Elem) -> String {
    match elem {
        Elem::Text(text) => {
            if matches!(text.kind, TokenKind::Splice | TokenKind::BlockComment) {
                String::new()
            } else {
                text.text.clone()
            }
        }
        Elem::Ident(ident) => ident.name.clone(),
        Elem::Lit(lit) => lit.text.clone(),
        Elem::Seq(elems) => elems.iter().map(string_form).collect(),
        Elem::Call(call) => {
            let mut out = call.name.name.clone();
            for _ in 0..call.gap() {
                out.push(' ');
            }
            out.push('(');
            for (i, arg) in call.args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&string_form(arg));
            }
            out.push(')');
            out
        }
        Elem::Stringize(s) => format!("#{}", s.name.name),
        Elem::Paste(p) => format!("{}##{}", string_form(&p.x), string_form(&p.y)),
    }
}

/// Rebind caller parameters inside an argument, producing a new element;
/// the parsed tree is never mutated.
fn substitute_params(elem: &Elem, vals: &FxHashMap<String, Elem>) -> Elem {
    if vals.is_empty() {
        return elem.clone();
    }
    match elem {
        Elem::Ident(ident) => vals
            .get(&ident.name)
            .cloned()
            .unwrap_or_else(|| elem.clone()),
        Elem::Seq(elems) => Elem::Seq(elems.iter().map(|e| substitute_params(e, vals)).collect()),
        Elem::Call(call) => Elem::Call(CallElem {
            name: call.name.clone(),
            lparen: call.lparen,
            args: call
                .args
                .iter()
                .map(|arg| substitute_params(arg, vals))
                .collect(),
            rparen: call.rparen,
        }),
        Elem::Paste(p) => Elem::Paste(PasteElem {
            x: Box::new(substitute_params(&p.x, vals)),
            pos: p.pos,
            y: Box::new(substitute_params(&p.y, vals)),
        }),
        Elem::Text(_) | Elem::Lit(_) | Elem::Stringize(_) => elem.clone(),
    }
}

/// Strip leading and trailing blank text from an argument.
fn trim_blanks(elem: Elem) -> Elem {
    match elem {
        Elem::Seq(elems) => {
            let start = elems.iter().position(|e| !e.is_blank());
            let Some(start) = start else {
                return Elem::Seq(Vec::new());
            };
            let end = elems.iter().rposition(|e| !e.is_blank()).unwrap();
            let trimmed: Vec<Elem> = elems
                .into_iter()
                .skip(start)
                .take(end + 1 - start)
                .collect();
            Elem::seq_or_single(trimmed)
        }
        other => other,
    }
}

/// Quote a string with graphic-printable escaping: backslash, quote and
/// the C control escapes are escaped, other control characters become
/// hex escapes, printable text passes through.
#[must_use]
pub fn quote_graphic(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
