//! Dataset error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::index::IndexError;
use crate::matcher::MatcherError;
use crate::scan::ScanError;
use crate::segment::SegmentError;
use crate::transaction::TransactionError;

/// Errors from dataset operations
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A dataset configuration value is missing or invalid
    #[error("dataset configuration error: {0}")]
    Config(String),

    /// The metadata to acquire carries no reference time, so it cannot be
    /// routed to a segment
    #[error("metadata has no reference time")]
    MissingReftime,

    /// Another writer holds the dataset lock
    #[error("dataset is locked by another writer: {path}")]
    Locked {
        /// The lock file path
        path: PathBuf,
    },

    /// Filesystem failure outside segment and index files
    #[error("dataset I/O error on {path}: {source}")]
    Io {
        /// The path involved
        path: PathBuf,
        /// The underlying error
        #[source]
        source: io::Error,
    },

    /// A transaction commit failed
    #[error("commit failed: {0}")]
    Commit(#[source] TransactionError),

    /// Segment operation failed
    #[error(transparent)]
    Segment(#[from] SegmentError),

    /// Index operation failed
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Match expression rejected
    #[error(transparent)]
    Matcher(#[from] MatcherError),

    /// Scanner failure during rebuild
    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl DatasetError {
    /// Wraps an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DatasetError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;
