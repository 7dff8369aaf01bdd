pub mod common;
pub mod compact;
pub mod docstrings;
pub mod reconstruct;
pub mod tokenizer;
pub mod triple_quote;

pub use common::{OutputBuffer, Position, ProtectedRange, ProtectedRanges, SourceText};
pub use docstrings::{LocateError, locate_docstrings};
pub use tokenizer::{Token, TokenKind, TokenizeError, tokenize};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub strip_single_line_comments: bool,
    pub strip_multi_line_comments: bool,
    pub compact_blank_lines: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            strip_single_line_comments: true,
            strip_multi_line_comments: true,
            compact_blank_lines: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseFailurePolicy {
    /// Carry on without docstring protection; docstrings become removable blocks.
    #[default]
    FailOpen,
    FailClosed,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StripError {
    #[error("docstrings could not be located: {0}")]
    ParseRejected(#[source] LocateError),

    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    pub text: String,
    pub protected_docstrings: usize,
    /// Why the source ran without docstring protection, if it did.
    pub parse_failure: Option<LocateError>,
    pub unterminated_blocks: Vec<usize>,
}

/// `FailClosed` only rejects input when multi-line removal is enabled.
pub fn strip_source(
    source: &str,
    config: &PipelineConfig,
    on_parse_failure: ParseFailurePolicy,
) -> Result<Stripped, StripError> {
    let source = SourceText::new(source);

    let (protected, parse_failure) = match locate_docstrings(source.as_str()) {
        Ok(ranges) => {
            for range in ranges.iter() {
                debug!("protecting docstring lines {}-{}", range.start, range.end);
            }
            (ranges, None)
        }
        Err(err) if config.strip_multi_line_comments => match on_parse_failure {
            ParseFailurePolicy::FailOpen => (ProtectedRanges::new(), Some(err)),
            ParseFailurePolicy::FailClosed => return Err(StripError::ParseRejected(err)),
        },
        Err(err) => {
            debug!("{}; not needed without multi-line removal", err);
            (ProtectedRanges::new(), Some(err))
        }
    };

    let (text, unterminated_blocks) = if config.strip_multi_line_comments {
        let outcome = triple_quote::strip_triple_quoted(&source, &protected);
        (outcome.text, outcome.unterminated)
    } else {
        (source, Vec::new())
    };

    let buffer = reconstruct::filter_comments(text.as_str(), config.strip_single_line_comments)?;
    let buffer = if config.compact_blank_lines {
        compact::compact_blank_lines(buffer)
    } else {
        buffer
    };

    Ok(Stripped {
        text: buffer.into_text(),
        protected_docstrings: protected.len(),
        parse_failure,
        unterminated_blocks,
    })
}
