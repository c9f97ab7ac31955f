//! Index error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;

/// Errors from index operations
#[derive(Debug, Error)]
pub enum IndexError {
    /// Underlying filesystem failure
    #[error("index I/O error on {path}: {source}")]
    Io {
        /// The index file involved
        path: PathBuf,
        /// The underlying error
        #[source]
        source: io::Error,
    },

    /// An insert collided with an existing unique key under the reject
    /// policy. Recoverable; the caller decides whether to skip or replace.
    #[error("an entry with the same unique key already exists")]
    DuplicateKey,

    /// Operation on a closed index
    #[error("index is closed")]
    Closed,

    /// The on-disk index log is damaged from the given offset onwards.
    ///
    /// Recovery truncates the log there and rebuilds from a segment
    /// rescan.
    #[error("index corruption at offset {offset}: {message}")]
    Corruption {
        /// Byte offset of the first damaged record
        offset: u64,
        /// What was wrong with it
        message: String,
    },

    /// A stored metadata encoding failed to decode
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl IndexError {
    /// Wraps an I/O error with the index path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;
