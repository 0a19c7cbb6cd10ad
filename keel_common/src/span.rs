//! Source location tracking for the Keel compiler
//!
//! A span is a byte offset into the source buffer of one translation unit.
//! Line and column numbers are not stored; they are resolved on demand by
//! scanning the owning buffer (see `source::SourceBuffer::locate`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the translation unit a span points into.
pub type UnitId = u32;

/// A position in source code: a byte offset within one translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub offset: u32,
    pub unit: UnitId,
}

impl Span {
    pub fn new(offset: u32, unit: UnitId) -> Self {
        Self { offset, unit }
    }

    /// Span for synthesized nodes that have no source counterpart.
    pub fn none() -> Self {
        Self { offset: 0, unit: u32::MAX }
    }

    pub fn is_none(&self) -> bool {
        self.unit == u32::MAX
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "<builtin>")
        } else {
            write!(f, "unit {} @ byte {}", self.unit, self.offset)
        }
    }
}

/// A value with associated source location information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }

    pub fn map<U, F>(self, f: F) -> Spanned<U>
    where
        F: FnOnce(T) -> U,
    {
        Spanned::new(f(self.value), self.span)
    }

    pub fn as_ref(&self) -> Spanned<&T> {
        Spanned::new(&self.value, self.span)
    }
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.value, self.span)
    }
}
