//! Codec error types

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Binary framing violations.
///
/// A malformed record is fatal to that record only: batch operations
/// collect these into a report instead of aborting.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Framing violation: truncated payload, length overrun, bad UTF-8
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Type code not part of the closed code enumeration
    #[error("malformed record: unrecognized type code {0}")]
    UnknownTypeCode(u16),

    /// Style byte not valid for the attribute type
    #[error("malformed record: unknown style {style} for {attribute}")]
    UnknownStyle {
        /// Attribute type name
        attribute: &'static str,
        /// Style discriminant found
        style: u8,
    },
}

impl CodecError {
    /// Create a malformed record error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord(message.into())
    }
}
