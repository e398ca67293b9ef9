//! Source location tracking and span management for cpre.
//!
//! This crate provides the position model shared by the lexer, parser and
//! evaluator: byte offsets into the preprocessed source, half-open spans,
//! and a per-file line table that maps offsets back to line/column pairs.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// A byte offset into a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BytePos(pub u32);

impl BytePos {
    /// The zero position.
    pub const ZERO: Self = Self(0);

    /// Create a new byte position.
    #[must_use]
    pub const fn new(pos: u32) -> Self {
        Self(pos)
    }

    /// Get the raw byte offset.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get the raw byte offset as usize.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl std::ops::Add<u32> for BytePos {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl std::ops::Sub for BytePos {
    type Output = u32;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

/// A span of source code, represented as a half-open byte range [lo, hi).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// The start of the span (inclusive).
    pub lo: BytePos,
    /// The end of the span (exclusive).
    pub hi: BytePos,
}

impl Span {
    /// A dummy span for synthesized nodes or when location is irrelevant.
    pub const DUMMY: Self = Self {
        lo: BytePos::ZERO,
        hi: BytePos::ZERO,
    };

    /// Create a new span from byte positions.
    #[must_use]
    pub const fn new(lo: BytePos, hi: BytePos) -> Self {
        Self { lo, hi }
    }

    /// Create a span from raw byte offsets.
    #[must_use]
    pub const fn from_raw(lo: u32, hi: u32) -> Self {
        Self {
            lo: BytePos(lo),
            hi: BytePos(hi),
        }
    }

    /// Check if this is a dummy span.
    #[must_use]
    pub const fn is_dummy(self) -> bool {
        self.lo.0 == 0 && self.hi.0 == 0
    }

    /// Get the length of the span in bytes.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.hi.0 - self.lo.0
    }

    /// Check if the span is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.lo.0 == self.hi.0
    }

    /// Merge two spans into one that covers both.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            lo: BytePos(self.lo.0.min(other.lo.0)),
            hi: BytePos(self.hi.0.max(other.hi.0)),
        }
    }

    /// Create a span that covers from the start of self to the end of other.
    #[must_use]
    pub const fn to(self, other: Self) -> Self {
        Self {
            lo: self.lo,
            hi: other.hi,
        }
    }

    /// Check if this span contains the given byte position.
    #[must_use]
    pub const fn contains(self, pos: BytePos) -> bool {
        self.lo.0 <= pos.0 && pos.0 < self.hi.0
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::DUMMY
    }
}

/// Line and column information for a source location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineCol {
    /// 1-indexed line number.
    pub line: u32,
    /// 1-indexed column number (in bytes).
    pub col: u32,
}

impl LineCol {
    /// Create a new line/column pair.
    #[must_use]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// A source file: name, contents, and a lazily reusable line-offset table.
///
/// The table records the byte offset of every line start; a lookup is a
/// `partition_point` search over it.
#[derive(Clone, Debug)]
pub struct SourceFile {
    /// The file name or path.
    pub name: String,
    /// The source code content.
    pub src: String,
    /// Byte offsets of line starts.
    line_starts: Vec<BytePos>,
}

impl SourceFile {
    /// Create a new source file and build its line table.
    #[must_use]
    pub fn new(name: String, src: String) -> Self {
        let line_starts = std::iter::once(BytePos::ZERO)
            .chain(
                src.match_indices('\n')
                    .map(|(i, _)| BytePos::new(i as u32 + 1)),
            )
            .collect();

        Self {
            name,
            src,
            line_starts,
        }
    }

    /// Get the line/column for a byte position.
    #[must_use]
    pub fn lookup_line_col(&self, pos: BytePos) -> LineCol {
        let line_idx = self.lookup_line(pos);
        let line_start = self.line_starts[line_idx];
        let col = pos.0.saturating_sub(line_start.0) + 1;

        LineCol {
            line: line_idx as u32 + 1,
            col,
        }
    }

    /// Get the 0-indexed line number for a byte position.
    #[must_use]
    pub fn lookup_line(&self, pos: BytePos) -> usize {
        self.line_starts
            .partition_point(|&start| start.0 <= pos.0)
            .saturating_sub(1)
    }

    /// Get the source text for a span.
    #[must_use]
    pub fn source_text(&self, span: Span) -> &str {
        &self.src[span.lo.as_usize()..span.hi.as_usize()]
    }

    /// Get the number of lines in the file.
    #[must_use]
    pub fn num_lines(&self) -> usize {
        self.line_starts.len()
    }

    /// Get the byte offset of the start of a line (0-indexed).
    #[must_use]
    pub fn line_start(&self, line_idx: usize) -> Option<BytePos> {
        self.line_starts.get(line_idx).copied()
    }

    /// Whether the given 0-indexed line ends with a newline in the source.
    ///
    /// The last line of a file that does not end in `'\n'` is unterminated;
    /// every other line is terminated.
    #[must_use]
    pub fn line_terminated(&self, line_idx: usize) -> bool {
        line_idx + 1 < self.line_starts.len()
    }

    /// Get the content of a specific line (0-indexed), without the newline.
    #[must_use]
    pub fn line_content(&self, line_idx: usize) -> Option<&str> {
        if line_idx >= self.line_starts.len() {
            return None;
        }

        let start = self.line_starts[line_idx].as_usize();
        let end = if line_idx + 1 < self.line_starts.len() {
            self.line_starts[line_idx + 1].as_usize().saturating_sub(1)
        } else {
            self.src.len()
        };

        Some(&self.src[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_operations() {
        let span1 = Span::from_raw(10, 20);
        let span2 = Span::from_raw(15, 30);

        assert_eq!(span1.len(), 10);
        assert_eq!(span1.merge(span2), Span::from_raw(10, 30));
        assert!(span1.contains(BytePos::new(15)));
        assert!(!span1.contains(BytePos::new(25)));
    }

    #[test]
    fn line_lookup() {
        let src = "line 1\nline 2\nline 3";
        let file = SourceFile::new("test.c".to_string(), src.to_string());

        assert_eq!(file.lookup_line_col(BytePos::new(0)), LineCol::new(1, 1));
        assert_eq!(file.lookup_line_col(BytePos::new(7)), LineCol::new(2, 1));
        assert_eq!(file.lookup_line_col(BytePos::new(10)), LineCol::new(2, 4));
        assert_eq!(file.lookup_line(BytePos::new(14)), 2);
    }

    #[test]
    fn line_content() {
        let src = "first\nsecond\nthird";
        let file = SourceFile::new("test.c".to_string(), src.to_string());

        assert_eq!(file.line_content(0), Some("first"));
        assert_eq!(file.line_content(1), Some("second"));
        assert_eq!(file.line_content(2), Some("third"));
        assert_eq!(file.line_content(3), None);
    }

    #[test]
    fn line_termination() {
        let file = SourceFile::new("a.c".to_string(), "one\ntwo".to_string());
        assert!(file.line_terminated(0));
        assert!(!file.line_terminated(1));

        let file = SourceFile::new("b.c".to_string(), "one\ntwo\n".to_string());
        assert!(file.line_terminated(0));
        assert!(file.line_terminated(1));
        // the empty line after the trailing newline
        assert!(!file.line_terminated(2));
    }
}
