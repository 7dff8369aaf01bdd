use super::common::Position;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Comment,
    Newline,
    EndMarker,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: Position,
    pub end: Position,
    pub span: Range<usize>,
    pub unterminated: bool,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("unterminated string literal starting at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Single,
    Double,
}

impl Quote {
    fn of(c: char) -> Option<Quote> {
        match c {
            '\'' => Some(Quote::Single),
            '"' => Some(Quote::Double),
            _ => None,
        }
    }

    fn is(self, c: char) -> bool {
        Quote::of(c) == Some(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Between,
    Code,
    Comment,
    Continuation,
    ContinuationCr,
    SawQuote(Quote),
    SawTwoQuotes(Quote),
    Short(Quote),
    ShortEsc(Quote),
    // count = closing quotes seen so far
    Long(Quote, u8),
    LongEsc(Quote),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexAction {
    Nothing,
    Begin(TokenKind),
    Single(TokenKind),
    // pending token ends before the current char; the char is fed again
    FinishBefore,
    Reprocess,
    Abandon,
    FinishUnterminated,
    Fail,
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c' | '\r')
}

fn state_transition(from: LexState, current_char: Option<char>) -> (LexState, LexAction) {
    match current_char {
        Some(c) => match from {
            LexState::Between => match c {
                '\n' => (LexState::Between, LexAction::Single(TokenKind::Newline)),
                '#' => (LexState::Comment, LexAction::Begin(TokenKind::Comment)),
                '\\' => (LexState::Continuation, LexAction::Begin(TokenKind::Other)),
                c if is_blank(c) => (LexState::Between, LexAction::Nothing),
                c => match Quote::of(c) {
                    Some(q) => (LexState::SawQuote(q), LexAction::Begin(TokenKind::Other)),
                    None => (LexState::Code, LexAction::Begin(TokenKind::Other)),
                },
            },
            LexState::Code => match c {
                '\n' | '#' | '\\' => (LexState::Between, LexAction::FinishBefore),
                c if is_blank(c) => (LexState::Between, LexAction::FinishBefore),
                c => match Quote::of(c) {
                    Some(q) => (LexState::SawQuote(q), LexAction::Nothing),
                    None => (LexState::Code, LexAction::Nothing),
                },
            },
            LexState::Comment => match c {
                '\n' | '\r' => (LexState::Between, LexAction::FinishBefore),
                _ => (LexState::Comment, LexAction::Nothing),
            },
            LexState::Continuation => match c {
                '\n' => (LexState::Between, LexAction::Abandon),
                '\r' => (LexState::ContinuationCr, LexAction::Nothing),
                _ => (LexState::Code, LexAction::Reprocess),
            },
            LexState::ContinuationCr => match c {
                '\n' => (LexState::Between, LexAction::Abandon),
                _ => (LexState::Code, LexAction::Reprocess),
            },

            LexState::SawQuote(q) => match c {
                c if q.is(c) => (LexState::SawTwoQuotes(q), LexAction::Nothing),
                '\\' => (LexState::ShortEsc(q), LexAction::Nothing),
                '\n' | '\r' => (LexState::End, LexAction::Fail),
                _ => (LexState::Short(q), LexAction::Nothing),
            },
            LexState::SawTwoQuotes(q) => match c {
                c if q.is(c) => (LexState::Long(q, 0), LexAction::Nothing),
                _ => (LexState::Code, LexAction::Reprocess),
            },
            LexState::Short(q) => match c {
                c if q.is(c) => (LexState::Code, LexAction::Nothing),
                '\\' => (LexState::ShortEsc(q), LexAction::Nothing),
                '\n' | '\r' => (LexState::End, LexAction::Fail),
                _ => (LexState::Short(q), LexAction::Nothing),
            },
            LexState::ShortEsc(q) => match c {
                '\r' => (LexState::ShortEsc(q), LexAction::Nothing),
                _ => (LexState::Short(q), LexAction::Nothing),
            },
            LexState::Long(q, seen) => match c {
                c if q.is(c) && seen == 2 => (LexState::Code, LexAction::Nothing),
                c if q.is(c) => (LexState::Long(q, seen + 1), LexAction::Nothing),
                '\\' => (LexState::LongEsc(q), LexAction::Nothing),
                _ => (LexState::Long(q, 0), LexAction::Nothing),
            },
            LexState::LongEsc(q) => (LexState::Long(q, 0), LexAction::Nothing),

            LexState::End => (LexState::End, LexAction::Nothing),
        },
        None => match from {
            LexState::Code
            | LexState::Comment
            | LexState::Continuation
            | LexState::ContinuationCr
            | LexState::SawTwoQuotes(_) => (LexState::End, LexAction::FinishBefore),
            LexState::Long(..) | LexState::LongEsc(_) => {
                (LexState::End, LexAction::FinishUnterminated)
            }
            LexState::SawQuote(_) | LexState::Short(_) | LexState::ShortEsc(_) => {
                (LexState::End, LexAction::Fail)
            }
            LexState::Between | LexState::End => (LexState::End, LexAction::Nothing),
        },
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: TokenKind,
    start: Position,
    offset: usize,
}

struct TokenSink<'a> {
    input: &'a str,
    tokens: Vec<Token<'a>>,
    pending: Option<Pending>,
}

impl<'a> TokenSink<'a> {
    fn begin(&mut self, kind: TokenKind, start: Position, offset: usize) {
        self.pending = Some(Pending {
            kind,
            start,
            offset,
        });
    }

    fn finish(&mut self, end: Position, end_offset: usize, unterminated: bool) {
        if let Some(p) = self.pending.take() {
            self.push(p.kind, p.start, p.offset, end, end_offset, unterminated);
        }
    }

    fn push(
        &mut self,
        kind: TokenKind,
        start: Position,
        offset: usize,
        end: Position,
        end_offset: usize,
        unterminated: bool,
    ) {
        self.tokens.push(Token {
            kind,
            text: &self.input[offset..end_offset],
            start,
            end,
            span: offset..end_offset,
            unterminated,
        });
    }

    fn unterminated_string(&self) -> TokenizeError {
        let start = self.pending.map_or(Position::START, |p| p.start);
        TokenizeError::UnterminatedString {
            line: start.line,
            column: start.column,
        }
    }
}

/// A `\r\n` pair is one newline token; a lone `\r` is whitespace.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, TokenizeError> {
    let mut sink = TokenSink {
        input,
        tokens: Vec::new(),
        pending: None,
    };
    let mut state = LexState::Between;
    let mut position = Position::START;
    let mut previous: Option<char> = None;

    for (offset, c) in input.char_indices() {
        loop {
            let (next_state, action) = state_transition(state, Some(c));
            state = next_state;
            match action {
                LexAction::Nothing => {}
                LexAction::Begin(kind) => sink.begin(kind, position, offset),
                LexAction::Single(kind) => {
                    let (start, start_offset) =
                        if kind == TokenKind::Newline && previous == Some('\r') {
                            (Position::new(position.line, position.column - 1), offset - 1)
                        } else {
                            (position, offset)
                        };
                    sink.push(
                        kind,
                        start,
                        start_offset,
                        position.advance(c),
                        offset + c.len_utf8(),
                        false,
                    );
                }
                LexAction::FinishBefore => {
                    sink.finish(position, offset, false);
                    continue;
                }
                LexAction::Reprocess => continue,
                LexAction::Abandon => sink.pending = None,
                LexAction::FinishUnterminated => sink.finish(position, offset, true),
                LexAction::Fail => return Err(sink.unterminated_string()),
            }
            break;
        }
        position = position.advance(c);
        previous = Some(c);
    }

    let (_, action) = state_transition(state, None);
    match action {
        LexAction::FinishBefore => sink.finish(position, input.len(), false),
        LexAction::FinishUnterminated => sink.finish(position, input.len(), true),
        LexAction::Fail => return Err(sink.unterminated_string()),
        _ => {}
    }
    sink.push(
        TokenKind::EndMarker,
        position,
        input.len(),
        position,
        input.len(),
        false,
    );
    Ok(sink.tokens)
}
