//! Source positions, spans and parse errors for the markup front end.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A position inside a markup source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseLocation {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

impl ParseLocation {
    pub fn new(offset: usize, line: usize, col: usize) -> Self {
        ParseLocation { offset, line, col }
    }

    pub fn start() -> Self {
        ParseLocation { offset: 0, line: 0, col: 0 }
    }
}

impl fmt::Display for ParseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A half-open `[start, end)` region of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseSourceSpan {
    pub start: ParseLocation,
    pub end: ParseLocation,
}

impl ParseSourceSpan {
    pub fn new(start: ParseLocation, end: ParseLocation) -> Self {
        ParseSourceSpan { start, end }
    }

    pub fn empty(at: ParseLocation) -> Self {
        ParseSourceSpan { start: at, end: at }
    }

    /// The source text covered by this span.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start.offset..self.end.offset]
    }
}

impl fmt::Display for ParseSourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

/// Malformed markup. Fatal to the compile attempt that produced it; a parse
/// never yields a partially populated tree alongside one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{msg} at {span}")]
pub struct ParseError {
    pub span: ParseSourceSpan,
    pub msg: String,
}

impl ParseError {
    pub fn new(span: ParseSourceSpan, msg: impl Into<String>) -> Self {
        ParseError { span, msg: msg.into() }
    }

    /// Render the error with the source text around the failure position,
    /// e.g. `unexpected character ("<Window [ERROR ->]=></Window>")`.
    pub fn contextual_message(&self, source: &str) -> String {
        let offset = self.span.start.offset.min(source.len());
        let before_start = offset.saturating_sub(CONTEXT_CHARS);
        let after_end = (offset + CONTEXT_CHARS).min(source.len());
        let before = nearest_boundary(source, before_start);
        let after = nearest_boundary(source, after_end);
        format!(
            "{} (\"{}[ERROR ->]{}\")",
            self.msg,
            &source[before..offset],
            &source[offset..after]
        )
    }
}

const CONTEXT_CHARS: usize = 30;

fn nearest_boundary(source: &str, mut offset: usize) -> usize {
    while offset < source.len() && !source.is_char_boundary(offset) {
        offset += 1;
    }
    offset
}
