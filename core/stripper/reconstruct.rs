use super::common::{OutputBuffer, Position};
use super::tokenizer::{Token, TokenKind, TokenizeError, tokenize};

struct Cursor {
    position: Position,
    offset: usize,
}

struct Replay<'a> {
    source: &'a str,
    cursor: Cursor,
    line: String,
    dropped_comment: bool,
    output: OutputBuffer,
}

impl<'a> Replay<'a> {
    fn new(source: &'a str) -> Self {
        Replay {
            source,
            cursor: Cursor {
                position: Position::START,
                offset: 0,
            },
            line: String::new(),
            dropped_comment: false,
            output: OutputBuffer::new(),
        }
    }

    fn advance_to(&mut self, target: Position, target_offset: usize) {
        let gap = &self.source[self.cursor.offset..target_offset];
        for c in gap.chars() {
            self.line.push(c);
            self.cursor.position = self.cursor.position.advance(c);
        }
        self.cursor.offset = target_offset;
        debug_assert_eq!(self.cursor.position, target);
    }

    fn jump_past(&mut self, token: &Token) {
        self.cursor.position = token.end;
        self.cursor.offset = token.span.end;
    }

    fn emit(&mut self, token: &Token) {
        self.advance_to(token.start, token.span.start);
        self.line.push_str(token.text);
        self.jump_past(token);
        if matches!(token.kind, TokenKind::Newline | TokenKind::EndMarker) {
            self.flush();
        }
    }

    fn drop_token(&mut self, token: &Token) {
        self.jump_past(token);
        self.dropped_comment = true;
    }

    fn flush(&mut self) {
        let line = std::mem::take(&mut self.line);
        let comment_only = self.dropped_comment && line.trim().is_empty();
        self.dropped_comment = false;
        if !comment_only && !line.is_empty() {
            self.output.push(line);
        }
    }

    fn finish(mut self) -> OutputBuffer {
        self.flush();
        self.output
    }
}

/// Kept tokens are replayed at their input columns with the input's own whitespace in
/// between. Lines that held only a removed comment disappear.
pub fn filter_comments(source: &str, strip_comments: bool) -> Result<OutputBuffer, TokenizeError> {
    let tokens = tokenize(source)?;
    for token in tokens.iter().filter(|t| t.unterminated) {
        tracing::warn!(
            "unterminated triple-quoted string at line {} kept as is",
            token.start.line
        );
    }

    let mut replay = Replay::new(source);
    let mut at_line_start = true;
    for token in &tokens {
        let removable = token.kind == TokenKind::Comment && !(at_line_start && is_directive(token));
        if strip_comments && removable {
            replay.drop_token(token);
        } else {
            replay.emit(token);
        }
        at_line_start = token.kind == TokenKind::Newline;
    }
    Ok(replay.finish())
}

/// A leading `#!` interpreter line or a source encoding declaration on line 1 or 2.
fn is_directive(comment: &Token) -> bool {
    match comment.start.line {
        1 if comment.text.starts_with("#!") => true,
        1 | 2 => is_coding_declaration(comment.text),
        _ => false,
    }
}

fn is_coding_declaration(comment: &str) -> bool {
    comment.match_indices("coding").any(|(idx, m)| {
        let Some(rest) = comment[idx + m.len()..].strip_prefix([':', '=']) else {
            return false;
        };
        rest.trim_start_matches([' ', '\t'])
            .starts_with(|c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn strip(source: &str) -> String {
        filter_comments(source, true).unwrap().into_text()
    }

    #[test]
    fn inline_comment_and_its_padding_are_removed() {
        assert_eq!(strip("x = 1  # inline\ny = 2\n"), "x = 1\ny = 2\n");
    }

    #[test]
    fn comment_only_lines_vanish() {
        let source = "def f():\n    # explain\n    return 1\n";
        assert_eq!(strip(source), "def f():\n    return 1\n");
    }

    #[test]
    fn blank_lines_are_kept_for_the_compactor() {
        assert_eq!(strip("a = 1\n\n\nb = 2\n"), "a = 1\n\n\nb = 2\n");
    }

    #[rstest]
    #[case::tabs("if x:\n\tif y:\n\t\tz = 1\t# c\n")]
    #[case::mixed("class A:\n    def f(self):\n    \treturn  1 # c\n")]
    #[case::trailing_space("x = 1   \ny = 2\n")]
    #[case::continuation("total = 1 + \\\n        2\n")]
    #[case::crlf("a = 1  # c\r\nb = 2\r\n")]
    #[case::no_final_newline("a = 1\nb = 2")]
    fn code_whitespace_is_reproduced_exactly(#[case] source: &str) {
        assert_eq!(filter_comments(source, false).unwrap().into_text(), source);
    }

    #[test]
    fn tabs_survive_comment_removal() {
        assert_eq!(
            strip("if x:\n\tif y:\n\t\tz = 1\t# c\n"),
            "if x:\n\tif y:\n\t\tz = 1\n"
        );
    }

    #[test]
    fn crlf_line_endings_survive_comment_removal() {
        assert_eq!(strip("a = 1  # c\r\n# only\r\nb = 2\r\n"), "a = 1\r\nb = 2\r\n");
    }

    #[test]
    fn trailing_whitespace_without_comment_is_kept() {
        assert_eq!(strip("x = 1   \n"), "x = 1   \n");
    }

    #[test]
    fn comments_inside_brackets() {
        let source = "values = [\n    1,  # one\n    # gap\n    2,\n]\n";
        assert_eq!(strip(source), "values = [\n    1,\n    2,\n]\n");
    }

    #[test]
    fn comment_at_end_of_input_without_newline() {
        assert_eq!(strip("x = 1\n# bye"), "x = 1\n");
        assert_eq!(strip("x = 1  # bye"), "x = 1");
    }

    #[test]
    fn hash_inside_string_is_untouched() {
        assert_eq!(strip("s = '# not a comment'  # real\n"), "s = '# not a comment'\n");
    }

    #[test]
    fn multi_line_string_is_one_logical_line() {
        let source = "s = \"\"\"a\n\n\nb\"\"\"  # c\nx = 1\n";
        let buffer = filter_comments(source, true).unwrap();
        assert_eq!(
            buffer.lines(),
            &["s = \"\"\"a\n\n\nb\"\"\"\n".to_string(), "x = 1\n".to_string()]
        );
    }

    #[test]
    fn retained_tokens_keep_their_columns() {
        let source = "def f(a,  b):  # sig\n    return a  +  b  # sum\n";
        let output = strip(source);
        let before: Vec<_> = tokenize(source)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TokenKind::Other)
            .map(|t| (t.text.to_string(), t.start))
            .collect();
        let after: Vec<_> = tokenize(&output)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TokenKind::Other)
            .map(|t| (t.text.to_string(), t.start))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn shebang_and_coding_lines_are_kept() {
        let source = "#!/usr/bin/env python\n# -*- coding: latin-1 -*-\n# coding: utf-8\nx = 1  # vim: set fileencoding=utf-8\n";
        assert_eq!(
            strip(source),
            "#!/usr/bin/env python\n# -*- coding: latin-1 -*-\nx = 1\n"
        );
        assert_eq!(strip("x = 1\n#!/bin/sh\n"), "x = 1\n");
    }

    #[test]
    fn coding_declaration_forms() {
        assert!(is_coding_declaration("# -*- coding: utf-8 -*-"));
        assert!(is_coding_declaration("# vim: set fileencoding=utf-8 :"));
        assert!(!is_coding_declaration("# decoding is hard"));
        assert!(!is_coding_declaration("# coding: "));
    }

    #[test]
    fn tokenizer_errors_are_reported() {
        assert!(filter_comments("s = 'open\n", true).is_err());
    }
}
