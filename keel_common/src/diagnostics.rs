//! Diagnostic message handling for the Keel compiler

use crate::source::SourceBuffer;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for diagnostic messages.
///
/// `Internal` marks invariant violations that indicate a compiler bug
/// rather than a problem with the input program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Internal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Internal => write!(f, "internal error"),
        }
    }
}

/// A diagnostic message with location and severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self { severity: Severity::Error, message: message.into(), span }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self { severity: Severity::Warning, message: message.into(), span }
    }

    pub fn internal(message: impl Into<String>, span: Span) -> Self {
        Self { severity: Severity::Internal, message: message.into(), span }
    }

    /// Render this diagnostic against the source buffer its span points into.
    pub fn render(&self, buffer: &SourceBuffer) -> String {
        match buffer.locate_span(self.span) {
            Some(location) => format!(
                "{}:{}:{}: {}: {}\n  {}",
                buffer.name(),
                location.line,
                location.column,
                self.severity,
                self.message,
                location.line_text
            ),
            None => format!("{}: {}", self.severity, self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.message, self.span)
    }
}

/// Collection of diagnostic messages; the sink every stage reports into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub messages: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Warning {
            log::warn!("{}", diagnostic.message);
        }
        self.messages.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::error(message, span));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::warning(message, span));
    }

    pub fn internal(&mut self, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::internal(message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|d| matches!(d.severity, Severity::Error | Severity::Internal))
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.messages.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(|d| d.severity == Severity::Warning)
    }
}
