#![forbid(unsafe_code)]

use std::fmt;

use horn_ast::Span;
use horn_smt::{SolverError, SortError};
use miette::{Diagnostic, LabeledSpan, Severity};
use thiserror::Error;

/// Failures that abort an analysis run. Per-assertion outcomes are never
/// reported through this type.
#[derive(Debug, Error, Diagnostic)]
pub enum ChcError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sort(#[from] SortError),

    #[error("internal encoder error: {message}")]
    #[diagnostic(code(horn::chc::internal))]
    Internal { message: String },
}

impl ChcError {
    pub fn internal(message: impl Into<String>) -> Self {
        ChcError::Internal {
            message: message.into(),
        }
    }
}

/// One message for the surrounding tool, keyed by source location.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct ChcDiagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic for ChcDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }

    fn severity(&self) -> Option<Severity> {
        Some(self.severity)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some("here".to_string()),
            span,
        ))))
    }
}

#[derive(Debug, Default)]
pub struct ErrorReporter {
    diagnostics: Vec<ChcDiagnostic>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning(&mut self, code: &'static str, span: Option<Span>, message: impl Into<String>) {
        self.push(Severity::Warning, code, span, message);
    }

    fn push(&mut self, severity: Severity, code: &'static str, span: Option<Span>, message: impl Into<String>) {
        self.diagnostics.push(ChcDiagnostic {
            severity,
            code,
            message: message.into(),
            span,
        });
    }

    pub fn diagnostics(&self) -> &[ChcDiagnostic] {
        &self.diagnostics
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ChcDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    pub fn take(&mut self) -> Vec<ChcDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

pub(crate) mod codes {
    pub const VIOLATION: &str = "horn::chc::violation";
    pub const UNPROVED: &str = "horn::chc::unproved";
    pub const SOLVER: &str = "horn::chc::solver";
    pub const UNSUPPORTED: &str = "horn::chc::unsupported";
}
