//! Byte spans and source files with line lookup.

use std::path::{Path, PathBuf};

use miette::{NamedSource, SourceSpan};

/// A half-open byte range into a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `other` lies entirely within this span.
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.start.into(), span.len())
    }
}

/// A loaded source file.
///
/// Keeps the text alongside a table of line start offsets so diagnostics can
/// be turned into 1-based line/column pairs without rescanning.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    text: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            path: path.into(),
            text,
            line_starts,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path as shown in diagnostics.
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The text covered by `span`, or an empty string if out of range.
    pub fn slice(&self, span: Span) -> &str {
        self.text.get(span.start..span.end).unwrap_or("")
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .text
            .get(start..offset.min(self.text.len()))
            .map_or(offset - start, |prefix| prefix.chars().count());
        (line + 1, column + 1)
    }

    /// Create a NamedSource for miette error reporting.
    pub fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.name(), self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let file = SourceFile::new("a.strata", "resource A {\n  id: uuid!\n}\n");
        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(9), (1, 10));
        assert_eq!(file.line_col(15), (2, 3));
        assert_eq!(file.line_col(25), (3, 1));
    }

    #[test]
    fn test_line_col_counts_characters() {
        let file = SourceFile::new("a.strata", "é x");
        assert_eq!(file.line_col(3), (1, 3));
    }

    #[test]
    fn test_span_merge_and_contains() {
        let a = Span::new(4, 8);
        let b = Span::new(10, 12);
        let merged = a.to(b);
        assert_eq!(merged, Span::new(4, 12));
        assert!(merged.contains(a));
        assert!(!a.contains(b));
    }
}
