//! Error reporting for cpre.
//!
//! Every stage of the pipeline accumulates diagnostics instead of failing
//! fast: the lexer's list is merged into the parser's, the parser's into the
//! evaluator's, and callers receive the union alongside whatever output was
//! produced. A diagnostic is a severity, a source span and a message;
//! rendering to `name:line:col` form goes through [`cpre_span::SourceFile`].

#![warn(missing_docs)]

use cpre_span::{SourceFile, Span};
use serde::{Deserialize, Serialize};

/// The severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// A problem that makes part of the output meaningless.
    Error,
    /// A problem the engine recovered from.
    Warning,
}

impl Severity {
    /// Get the label for this severity.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// A diagnostic message with a source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// The severity of this diagnostic.
    pub severity: Severity,
    /// The location the diagnostic points at.
    pub span: Span,
    /// The main message.
    pub message: String,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    #[must_use]
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            span,
            message: message.into(),
        }
    }

    /// Create a new warning diagnostic.
    #[must_use]
    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            span,
            message: message.into(),
        }
    }

    /// Check if this is an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render this diagnostic as `name:line:col: severity: message`.
    #[must_use]
    pub fn render(&self, file: &SourceFile) -> String {
        let loc = file.lookup_line_col(self.span.lo);
        format!(
            "{}:{}:{}: {}: {}",
            file.name,
            loc.line,
            loc.col,
            self.severity.label(),
            self.message
        )
    }
}

/// A handler for collecting diagnostics.
#[derive(Debug, Default)]
pub struct DiagnosticHandler {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticHandler {
    /// Create a new diagnostic handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
        }
        self.diagnostics.push(diagnostic);
    }

    /// Merge another stage's diagnostics into this handler.
    pub fn merge(&mut self, diagnostics: Vec<Diagnostic>) {
        for diagnostic in diagnostics {
            self.emit(diagnostic);
        }
    }

    /// Check if any errors have been emitted.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Get the number of errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Get the number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Get all diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take all diagnostics, leaving the handler empty.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.error_count = 0;
        self.warning_count = 0;
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpre_span::SourceFile;

    #[test]
    fn handler_counts() {
        let mut handler = DiagnosticHandler::new();

        handler.emit(Diagnostic::error(Span::DUMMY, "error 1"));
        handler.emit(Diagnostic::warning(Span::DUMMY, "warning 1"));
        handler.emit(Diagnostic::error(Span::DUMMY, "error 2"));

        assert!(handler.has_errors());
        assert_eq!(handler.error_count(), 2);
        assert_eq!(handler.warning_count(), 1);

        let taken = handler.take_diagnostics();
        assert_eq!(taken.len(), 3);
        assert!(!handler.has_errors());
    }

    #[test]
    fn render_points_at_line_and_column() {
        let file = SourceFile::new("m.c".to_string(), "a\nbcd\n".to_string());
        let diag = Diagnostic::error(Span::from_raw(4, 5), "bad escape");
        assert_eq!(diag.render(&file), "m.c:2:3: error: bad escape");
    }
}
