use std::collections::BTreeMap;
use std::ops::Range;

// lines are 1-based, columns count chars from 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const START: Position = Position { line: 1, column: 0 };

    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }

    pub fn advance(self, c: char) -> Self {
        if c == '\n' {
            Position {
                line: self.line + 1,
                column: 0,
            }
        } else {
            Position {
                line: self.line,
                column: self.column + 1,
            }
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::START
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    text: String,
    line_spans: Vec<Range<usize>>,
}

impl SourceText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_spans = Vec::new();
        let mut start = 0;
        for (idx, _) in text.match_indices('\n') {
            line_spans.push(start..idx);
            start = idx + 1;
        }
        line_spans.push(start..text.len());
        SourceText { text, line_spans }
    }

    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let joined = lines
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join("\n");
        SourceText::new(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.line_spans.iter().map(|span| &self.text[span.clone()])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtectedRange {
    pub start: usize,
    pub end: usize,
}

impl ProtectedRange {
    pub fn new(start: usize, end: usize) -> Self {
        ProtectedRange {
            start,
            end: end.max(start),
        }
    }

    fn overlaps(&self, other: &ProtectedRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedRanges {
    by_start: BTreeMap<usize, usize>,
}

impl ProtectedRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, range: ProtectedRange) -> bool {
        let before = self
            .by_start
            .range(..=range.start)
            .next_back()
            .map(|(&start, &end)| ProtectedRange { start, end });
        let after = self
            .by_start
            .range(range.start..)
            .next()
            .map(|(&start, &end)| ProtectedRange { start, end });
        if before.iter().chain(after.iter()).any(|r| r.overlaps(&range)) {
            return false;
        }
        self.by_start.insert(range.start, range.end);
        true
    }

    pub fn end_of_range_starting_at(&self, line: usize) -> Option<usize> {
        self.by_start.get(&line).copied()
    }

    pub fn next_start_from(&self, line: usize) -> Option<usize> {
        self.by_start.range(line..).next().map(|(&start, _)| start)
    }

    pub fn iter(&self) -> impl Iterator<Item = ProtectedRange> + '_ {
        self.by_start
            .iter()
            .map(|(&start, &end)| ProtectedRange { start, end })
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }
}

impl FromIterator<ProtectedRange> for ProtectedRanges {
    fn from_iter<I: IntoIterator<Item = ProtectedRange>>(iter: I) -> Self {
        let mut ranges = ProtectedRanges::new();
        for range in iter {
            ranges.insert(range);
        }
        ranges
    }
}

/// One entry per logical line: a multi-line string literal stays inside a single entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBuffer {
    lines: Vec<String>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_text(self) -> String {
        self.lines.concat()
    }
}

impl FromIterator<String> for OutputBuffer {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        OutputBuffer {
            lines: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for OutputBuffer {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn source_text_splits_on_newlines_and_keeps_carriage_returns() {
        let source = SourceText::new("a\r\nb\n\nc");
        let lines: Vec<&str> = source.lines().collect();
        assert_eq!(lines, vec!["a\r", "b", "", "c"]);
        assert_eq!(SourceText::new("x\n").lines().collect::<Vec<_>>(), vec!["x", ""]);
    }

    #[test]
    fn from_lines_rejoins_with_newlines() {
        let source = SourceText::new("x = 1\n\ny = 2\n");
        let lines: Vec<&str> = source.lines().collect();
        assert_eq!(SourceText::from_lines(&lines), source);
    }

    #[test]
    fn protected_ranges_reject_overlaps() {
        let mut ranges = ProtectedRanges::new();
        assert!(ranges.insert(ProtectedRange::new(2, 4)));
        assert!(!ranges.insert(ProtectedRange::new(4, 6)));
        assert!(!ranges.insert(ProtectedRange::new(1, 2)));
        assert!(ranges.insert(ProtectedRange::new(5, 5)));
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges.end_of_range_starting_at(2), Some(4));
        assert_eq!(ranges.end_of_range_starting_at(3), None);
        assert_eq!(ranges.next_start_from(3), Some(5));
        assert_eq!(ranges.next_start_from(6), None);
    }

    #[test]
    fn position_advances_over_newlines() {
        let end = "ab\nc".chars().fold(Position::START, Position::advance);
        assert_eq!(end, Position::new(2, 1));
    }
}
