use super::common::{ProtectedRanges, SourceText};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TripleQuote {
    Double,
    Single,
}

impl TripleQuote {
    fn as_str(self) -> &'static str {
        match self {
            TripleQuote::Double => "\"\"\"",
            TripleQuote::Single => "'''",
        }
    }
}

const MARKER_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleQuoteOutcome {
    pub text: SourceText,
    pub unterminated: Vec<usize>,
}

fn first_marker(line: &str) -> Option<(TripleQuote, usize)> {
    let double = line.find(TripleQuote::Double.as_str());
    let single = line.find(TripleQuote::Single.as_str());
    match (double, single) {
        (Some(d), Some(s)) if s < d => Some((TripleQuote::Single, s)),
        (Some(d), _) => Some((TripleQuote::Double, d)),
        (None, Some(s)) => Some((TripleQuote::Single, s)),
        (None, None) => None,
    }
}

fn find_closing<'a>(
    lines: &[&'a str],
    from: usize,
    marker: TripleQuote,
) -> Option<(usize, &'a str)> {
    lines.iter().enumerate().skip(from).find_map(|(idx, line)| {
        line.find(marker.as_str())
            .map(|pos| (idx, &line[pos + MARKER_LEN..]))
    })
}

// index of the first line a closing marker may not be taken from
fn search_limit(protected: &ProtectedRanges, opening_line: usize, line_count: usize) -> usize {
    protected
        .next_start_from(opening_line + 1)
        .map_or(line_count, |start| (start - 1).min(line_count))
}

/// Purely textual: any triple-quoted span whose first line does not open a protected
/// range is removed, string literals in code included. A closing marker is never
/// searched for past the start of the next protected range.
pub fn strip_triple_quoted(source: &SourceText, protected: &ProtectedRanges) -> TripleQuoteOutcome {
    let lines: Vec<&str> = source.lines().collect();
    let mut kept: Vec<String> = Vec::with_capacity(lines.len());
    let mut unterminated = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let number = index + 1;
        if let Some(end) = protected.end_of_range_starting_at(number) {
            let stop = end.clamp(number, lines.len());
            kept.extend(lines[index..stop].iter().map(|line| line.to_string()));
            index = stop;
            continue;
        }

        let line = lines[index];
        match first_marker(line) {
            None => kept.push(line.to_string()),
            Some((marker, start)) => {
                let body = start + MARKER_LEN;
                if let Some(close) = line[body..].find(marker.as_str()) {
                    let after = body + close + MARKER_LEN;
                    kept.push(format!("{}{}", &line[..start], &line[after..]));
                } else if let Some((closing, rest)) = find_closing(
                    &lines[..search_limit(protected, number, lines.len())],
                    index + 1,
                    marker,
                ) {
                    if !rest.trim().is_empty() {
                        kept.push(rest.to_string());
                    }
                    index = closing;
                } else {
                    tracing::debug!(
                        "unterminated {} block opened at line {}; line left unchanged",
                        marker.as_str(),
                        number
                    );
                    unterminated.push(number);
                    kept.push(line.to_string());
                }
            }
        }
        index += 1;
    }

    TripleQuoteOutcome {
        text: SourceText::from_lines(&kept),
        unterminated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stripper::common::ProtectedRange;
    use pretty_assertions::assert_eq;

    fn strip(source: &str, protected: &[(usize, usize)]) -> TripleQuoteOutcome {
        let ranges = protected
            .iter()
            .map(|&(s, e)| ProtectedRange::new(s, e))
            .collect();
        strip_triple_quoted(&SourceText::new(source), &ranges)
    }

    #[test]
    fn multi_line_block_is_removed() {
        let source = "x = 1\n\"\"\"\nnotes\nmore notes\n\"\"\"\ny = 2\n";
        assert_eq!(strip(source, &[]).text.as_str(), "x = 1\ny = 2\n");
    }

    #[test]
    fn same_line_span_is_cut_out() {
        let source = "x = 1  '''inline''' \ny = 2\n";
        assert_eq!(strip(source, &[]).text.as_str(), "x = 1   \ny = 2\n");
    }

    #[test]
    fn text_after_the_closing_marker_survives() {
        let source = "'''start\nend'''  z = 3\nw = 4\n";
        assert_eq!(strip(source, &[]).text.as_str(), "  z = 3\nw = 4\n");
    }

    #[test]
    fn the_first_marker_in_the_line_decides() {
        let source = "'''a \"\"\" b'''\nc = 1\n";
        assert_eq!(strip(source, &[]).text.as_str(), "\nc = 1\n");
    }

    #[test]
    fn protected_ranges_are_copied_verbatim() {
        let source = "def f():\n    \"\"\"Doc.\n\n    Details.\n    \"\"\"\n    \"\"\"\n    stray\n    \"\"\"\n    return 1\n";
        let outcome = strip(source, &[(2, 5)]);
        assert_eq!(
            outcome.text.as_str(),
            "def f():\n    \"\"\"Doc.\n\n    Details.\n    \"\"\"\n    return 1\n"
        );
        assert!(outcome.unterminated.is_empty());
    }

    #[test]
    fn unterminated_block_is_left_alone_and_reported() {
        let source = "a = 1\n\"\"\"never closed\nb = 2\nc = 3\n";
        let outcome = strip(source, &[]);
        assert_eq!(outcome.text.as_str(), source);
        assert_eq!(outcome.unterminated, vec![2]);
    }

    #[test]
    fn scanning_resumes_after_an_unterminated_block() {
        let source = "'''open\nx = 1\ny = \"\"\"gone\"\"\"\n";
        let outcome = strip(source, &[]);
        assert_eq!(outcome.text.as_str(), "'''open\nx = 1\ny = \n");
        assert_eq!(outcome.unterminated, vec![1]);
    }

    #[test]
    fn closing_marker_is_not_taken_from_a_docstring() {
        let source = "SEP = \"'''\"\ndef f():\n    '''doc'''\n    return 1\n";
        let outcome = strip(source, &[(3, 3)]);
        assert_eq!(outcome.text.as_str(), source);
        assert_eq!(outcome.unterminated, vec![1]);
    }

    #[test]
    fn blocks_closing_before_a_docstring_are_still_removed() {
        let source = "'''\nnotes\n'''\ndef f():\n    '''doc'''\n";
        let outcome = strip(source, &[(5, 5)]);
        assert_eq!(outcome.text.as_str(), "def f():\n    '''doc'''\n");
        assert!(outcome.unterminated.is_empty());
    }

    #[test]
    fn range_past_end_of_file_is_clamped() {
        let source = "\"\"\"doc\"\"\"";
        assert_eq!(strip(source, &[(1, 9)]).text.as_str(), source);
    }
}
