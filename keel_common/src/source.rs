//! Source buffers and on-demand location resolution

use crate::span::{Span, UnitId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved source location, produced by scanning a source buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
    pub line_text: String,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Owns the text of one translation unit's source file.
///
/// Every token, AST node and IR instruction span points into a live
/// `SourceBuffer`. Line and column information is computed here rather than
/// stored per span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBuffer {
    name: String,
    text: String,
    unit: UnitId,
}

impl SourceBuffer {
    pub fn new(name: impl Into<String>, text: impl Into<String>, unit: UnitId) -> Self {
        Self { name: name.into(), text: text.into(), unit }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Resolve a byte offset to a line/column pair and the text of that line.
    /// Lines and columns are 1-based. Offsets past the end resolve to the
    /// final position of the buffer.
    pub fn locate(&self, offset: u32) -> Location {
        let bytes = self.text.as_bytes();
        let target = (offset as usize).min(bytes.len());

        let mut line: u32 = 1;
        let mut line_start = 0usize;

        for (i, &b) in bytes[..target].iter().enumerate() {
            if b == b'\n' {
                line += 1;
                line_start = i + 1;
            }
        }

        let line_end = bytes[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| line_start + p)
            .unwrap_or(bytes.len());

        Location {
            line,
            column: (target - line_start) as u32 + 1,
            line_text: self.text[line_start..line_end].to_string(),
        }
    }

    /// Resolve a span that points into this buffer.
    pub fn locate_span(&self, span: Span) -> Option<Location> {
        if span.is_none() || span.unit != self.unit {
            return None;
        }
        Some(self.locate(span.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_locate_first_line() {
        let buffer = SourceBuffer::new("main.keel", "func main {\n}\n", 0);
        let loc = buffer.locate(5);
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 6);
        assert_eq!(loc.line_text, "func main {");
    }

    #[test]
    fn test_locate_later_line() {
        let buffer = SourceBuffer::new("main.keel", "a\nbb\nccc\n", 0);
        let loc = buffer.locate(6);
        assert_eq!(loc.line, 3);
        assert_eq!(loc.column, 2);
        assert_eq!(loc.line_text, "ccc");
    }

    #[test]
    fn test_locate_past_end() {
        let buffer = SourceBuffer::new("main.keel", "ab", 0);
        let loc = buffer.locate(100);
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 3);
    }
}
