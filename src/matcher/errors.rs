//! Matcher error types
//!
//! Parse failures surface to the caller before any storage is touched;
//! evaluation itself never fails, unmatched attributes simply evaluate false.

use thiserror::Error;

/// Result type for matcher parsing
pub type MatcherResult<T> = Result<T, MatcherError>;

/// Matcher parsing errors
#[derive(Debug, Clone, Error)]
pub enum MatcherError {
    /// The `type` part of a `type:expr` clause is not a registered matcher
    #[error("unknown matcher type: {0}")]
    UnknownType(String),

    /// A clause subexpression could not be parsed
    #[error("cannot parse matcher clause {clause:?}: {message}")]
    Parse {
        /// The offending clause text
        clause: String,
        /// What went wrong
        message: String,
    },
}

impl MatcherError {
    /// Create a parse error for the given clause
    pub fn parse(clause: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            clause: clause.into(),
            message: message.into(),
        }
    }
}
