//! cpre: a standalone C-style preprocessor engine.
//!
//! The pipeline is a straight composition of the workspace crates:
//! bytes → atoms ([`cpre_lexer`]) → statement tree ([`cpre_parser`]) →
//! output bytes plus diagnostics ([`cpre_eval`]). Directive lines are
//! replaced by blank lines so that surviving code keeps its source line
//! numbers; macro identifiers are expanded with self-reference
//! suppression, stringize, token pasting, and conditional compilation
//! driven by a constant-expression evaluator.
//!
//! `#include` is recognized but only emits placeholder lines; resolving
//! and splicing included files is out of scope.
//!
//! ```
//! let (out, diags) = cpre::preprocess(b"#define A 1\nA+A", "demo.c");
//! assert_eq!(out, "\n1+1");
//! assert!(diags.is_empty());
//! ```

#![warn(missing_docs)]

pub use cpre_ast as ast;
pub use cpre_diagnostics::{Diagnostic, DiagnosticHandler, Severity};
pub use cpre_eval::{evaluate, Evaluator};
pub use cpre_lexer::{Lexer, Token, TokenKind};
pub use cpre_parser::{parse, parse_body, parse_expression};
pub use cpre_span::{BytePos, LineCol, SourceFile, Span};

/// Preprocess a source buffer end to end.
///
/// Invalid UTF-8 is replaced lossily with a diagnostic; the output is
/// always well-defined even when diagnostics are present.
pub fn preprocess(source: &[u8], name: &str) -> (String, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let text = match std::str::from_utf8(source) {
        Ok(text) => text.to_string(),
        Err(err) => {
            let at = err.valid_up_to() as u32;
            diagnostics.push(Diagnostic::error(
                Span::from_raw(at, at + 1),
                "illegal UTF-8 encoding",
            ));
            String::from_utf8_lossy(source).into_owned()
        }
    };

    let file = SourceFile::new(name.to_string(), text);
    let (tree, parse_diags) = parse(&file.src);
    diagnostics.extend(parse_diags);
    let (out, eval_diags) = evaluate(&tree, &file);
    diagnostics.extend(eval_diags);
    (out, diagnostics)
}

/// Preprocess a string slice end to end.
pub fn preprocess_str(source: &str, name: &str) -> (String, Vec<Diagnostic>) {
    preprocess(source.as_bytes(), name)
}
