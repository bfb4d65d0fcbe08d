//! Source location tracking.
//!
//! Spans carry byte offsets into the text they were lexed from, so any token
//! range can be mapped back to an exact slice of the original source.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in source code (line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Byte offset from start of text
    pub offset: usize,
}

impl SourceLocation {
    /// Create a new source location.
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }

    /// Location of the first character of a text.
    pub fn start() -> Self {
        Self { line: 1, column: 1, offset: 0 }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open byte range `[start, end)` plus the position where it begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Line of the first character (1-indexed)
    pub line: usize,
    /// Column of the first character (1-indexed)
    pub column: usize,
}

impl Span {
    /// Create a span from start and end locations.
    pub fn from_locations(start: SourceLocation, end: SourceLocation) -> Self {
        Self {
            start: start.offset,
            end: end.offset,
            line: start.line,
            column: start.column,
        }
    }

    /// Span covering `self` through `other`.
    pub fn to(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: if self.start <= other.start { self.line } else { other.line },
            column: if self.start <= other.start { self.column } else { other.column },
        }
    }

    /// Get the length of this span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Slice `text` with this span. Out-of-range spans yield an empty string.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.start..self.end).unwrap_or("")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} [{}..{})", self.line, self.column, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_slice() {
        let text = "for (i = 0;;) {}";
        let span = Span { start: 0, end: 3, line: 1, column: 1 };
        assert_eq!(span.slice(text), "for");
        assert_eq!(span.len(), 3);
    }

    #[test]
    fn test_span_to() {
        let a = Span { start: 4, end: 6, line: 1, column: 5 };
        let b = Span { start: 10, end: 12, line: 2, column: 3 };
        let merged = a.to(&b);
        assert_eq!(merged.start, 4);
        assert_eq!(merged.end, 12);
        assert_eq!(merged.line, 1);
    }

    #[test]
    fn test_out_of_range_slice() {
        let span = Span { start: 5, end: 50, line: 1, column: 6 };
        assert_eq!(span.slice("short"), "");
    }
}
