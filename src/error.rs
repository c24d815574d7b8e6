//! Compile-time error taxonomy for format templates.
//!
//! Runtime evaluation never fails (see [`crate::format`]); everything that
//! can go wrong happens at compile time and is represented here.

use thiserror::Error;

/// Failure compiling a format template or JSON template.
///
/// Mirrors the exception taxonomy thrown by `AccessLogFormatParser::parse`
/// in the Envoy access logger this crate is modeled on: a grammar error
/// carries the parser's own message (or a fallback), an unknown directive
/// name is reported separately, and so are malformed length caps, illegal
/// `START_TIME` patterns, and KEYs with more than one fallback separator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The template does not parse: an unterminated `%`, a malformed
    /// directive shape, or any other grammar violation.
    #[error("{0}")]
    Grammar(String),

    /// A bare or parameterized directive named something outside the
    /// catalog.
    #[error("Not supported field in StreamInfo: {0}")]
    UnknownDirective(String),

    /// The `:N` length cap was present but not a decimal integer.
    #[error("Length must be an integer, given: {0}")]
    BadLengthSpec(String),

    /// A `START_TIME(...)` pattern contains a subpattern that would emit a
    /// literal newline into the log line.
    #[error("Invalid header configuration. Format string contains newline.")]
    IllegalTimePattern,

    /// A parameterized KEY contained more than one `?` fallback separator.
    #[error("Invalid header configuration. Too many fallback separators in key")]
    TooManyFallbacks,
}

impl CompileError {
    /// Build a [`CompileError::Grammar`] from a parser message, falling
    /// back to the same default text the original parser uses when its own
    /// error listener produced nothing.
    pub(crate) fn grammar(msg: impl Into<String>) -> Self {
        Self::Grammar(msg.into())
    }
}
