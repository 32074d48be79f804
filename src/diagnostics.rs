//! Diagnostic reporting for the NBCPL front end
//!
//! Four kinds of problem a stage can report, per the error-handling design:
//! lexical, syntactic, and semantic diagnostics are recoverable and
//! accumulate in a `Vec<Diagnostic>`; internal invariant violations are not
//! recoverable and propagate as `InternalError` through a `Result`.

use std::fmt;

/// The kind of problem a [`Diagnostic`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexical,
    Syntactic,
    Semantic,
    /// Non-fatal at reporting time, but downgrades to a warning rather than
    /// an error (e.g. duplicate-symbol shadowing).
    Warning,
}

/// A single reported problem, with source position.
///
/// Display format matches spec.md §6: `"[L<line> C<col>] Error: <message>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, line: usize, column: usize) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            line,
            column,
        }
    }

    pub fn lexical(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(DiagnosticKind::Lexical, message, line, column)
    }

    pub fn syntactic(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(DiagnosticKind::Syntactic, message, line, column)
    }

    pub fn semantic(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(DiagnosticKind::Semantic, message, line, column)
    }

    pub fn warning(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(DiagnosticKind::Warning, message, line, column)
    }

    /// Whether this diagnostic should assert `fatal_error_` on the pipeline.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind, DiagnosticKind::Warning)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            DiagnosticKind::Warning => "Warning",
            _ => "Error",
        };
        write!(
            f,
            "[L{} C{}] {}: {}",
            self.line + 1,
            self.column + 1,
            label,
            self.message
        )
    }
}

/// A collected set of diagnostics from a single stage or the whole pipeline.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        DiagnosticBag::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_fatal() {
            tracing::warn!(%diagnostic, "diagnostic recorded");
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, other: DiagnosticBag) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// `fatal_error_`: true if any non-warning diagnostic was recorded.
    pub fn is_fatal(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_fatal)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// An internal-invariant violation: a bug, not a user-facing diagnostic.
///
/// These terminate the compilation immediately rather than accumulating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalError {
    pub message: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        InternalError {
            message: message.into(),
        }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal error: {}", self.message)
    }
}

impl std::error::Error for InternalError {}

impl From<InternalError> for String {
    fn from(value: InternalError) -> Self {
        value.to_string()
    }
}
