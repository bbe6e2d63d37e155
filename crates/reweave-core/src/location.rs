//! Span primitives shared by every pass of the engine.
//!
//! A [`Location`] is a half-open region of one document, addressed by
//! 1-based line and column. Columns count bytes, not characters, so
//! span arithmetic stays exact on multi-byte text. The all-zero value
//! is the sentinel for "no counterpart" and never addresses real text.

use std::fmt;
use std::ops::Range;

/// Half-open span `[start, end)` in a single document.
///
/// Lines and columns are 1-based. `end` points one past the last byte
/// of the region, so a span with `start == end` is a zero-width caret
/// and a splice there is a pure insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Location {
    /// Sentinel for a missing counterpart. Compares equal only to itself.
    pub const EMPTY: Location = Location {
        start_line: 0,
        start_col: 0,
        end_line: 0,
        end_col: 0,
    };

    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Location {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Zero-width span at a point. Splicing at a caret inserts.
    pub fn caret(line: u32, col: u32) -> Self {
        Location::new(line, col, line, col)
    }

    /// Out-of-band key for edits that have no natural source span.
    /// Line 0 never occurs in real text, so synthetic keys cannot
    /// collide with keys derived from parsed nodes.
    pub fn synthetic(n: u32) -> Self {
        Location::new(0, n, 0, n)
    }

    pub fn is_empty(&self) -> bool {
        *self == Location::EMPTY
    }

    pub fn is_caret(&self) -> bool {
        !self.is_empty() && self.start() == self.end()
    }

    pub fn start(&self) -> (u32, u32) {
        (self.start_line, self.start_col)
    }

    pub fn end(&self) -> (u32, u32) {
        (self.end_line, self.end_col)
    }

    /// Whether `other` lies entirely inside this span. The sentinel
    /// contains nothing and is contained by nothing.
    pub fn contains(&self, other: &Location) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.start() <= other.start() && other.end() <= self.end()
    }

    /// Half-open overlap test. Adjacent spans do not overlap, and a
    /// caret sitting exactly on a boundary does not overlap either.
    pub fn overlaps(&self, other: &Location) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        !(self.end() <= other.start() || other.end() <= self.start())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<none>")
        } else {
            write!(
                f,
                "{}:{}..{}:{}",
                self.start_line, self.start_col, self.end_line, self.end_col
            )
        }
    }
}

/// Byte-offset index for one document's text, precomputed once per
/// document so span-to-byte conversion is a lookup, not a scan.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineIndex {
            line_starts,
            len: text.len(),
        }
    }

    /// Number of lines, counting a trailing fragment after the last
    /// newline as a line. Empty text has one (empty) line.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset of a 1-based (line, col) point, clamped to the
    /// document so downstream splices never index out of bounds.
    pub fn offset(&self, line: u32, col: u32) -> usize {
        if line == 0 {
            return 0;
        }
        let line = line as usize - 1;
        if line >= self.line_starts.len() {
            return self.len;
        }
        let start = self.line_starts[line];
        let end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.len);
        (start + col.saturating_sub(1) as usize).min(end.max(start))
    }

    /// Byte range covered by a span. The sentinel maps to `0..0`.
    pub fn byte_range(&self, loc: &Location) -> Range<usize> {
        if loc.is_empty() {
            return 0..0;
        }
        let start = self.offset(loc.start_line, loc.start_col);
        let end = self.offset(loc.end_line, loc.end_col);
        start..end.max(start)
    }

    /// Full extent of a 1-based line including its newline, as byte
    /// offsets. Out-of-range lines collapse to `len..len`.
    pub fn line_range(&self, line: u32) -> Range<usize> {
        if line == 0 {
            return 0..0;
        }
        let line = line as usize - 1;
        if line >= self.line_starts.len() {
            return self.len..self.len;
        }
        let start = self.line_starts[line];
        let end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.len);
        start..end
    }

    /// 1-based (line, col) of a byte offset.
    pub fn point_of(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = offset - self.line_starts[line];
        (line as u32 + 1, col as u32 + 1)
    }

    /// Span covering a byte range.
    pub fn location_of(&self, range: Range<usize>) -> Location {
        let (sl, sc) = self.point_of(range.start);
        let (el, ec) = self.point_of(range.end);
        Location::new(sl, sc, el, ec)
    }

    /// Caret one past the final byte of the document.
    pub fn end_caret(&self) -> Location {
        let (l, c) = self.point_of(self.len);
        Location::caret(l, c)
    }
}
