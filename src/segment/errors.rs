//! Segment error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from segment file operations
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Underlying filesystem failure
    #[error("segment I/O error on {path}: {source}")]
    Io {
        /// The segment file involved
        path: PathBuf,
        /// The underlying error
        #[source]
        source: io::Error,
    },

    /// A read reached past the end of the segment.
    ///
    /// This indicates index/segment desync; a dataset check is advised.
    #[error("read of {size} bytes at offset {offset} exceeds segment length {len}")]
    OutOfRange {
        /// Requested offset
        offset: u64,
        /// Requested size
        size: u64,
        /// Current segment length
        len: u64,
    },
}

impl SegmentError {
    /// Wraps an I/O error with the segment path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SegmentError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for segment operations
pub type SegmentResult<T> = Result<T, SegmentError>;
