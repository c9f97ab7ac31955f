//! Format scanner contract
//!
//! Format-specific parsers (grib, bufr, vm2, netcdf) live outside this
//! crate; the engine talks to them through [`Scanner`]. A scanner turns
//! raw bytes into [`Metadata`] on ingest and, during maintenance, walks a
//! whole segment re-deriving the metadata of every record so a damaged
//! index can be rebuilt.

use thiserror::Error;

use crate::metadata::Metadata;
use crate::segment::{SegmentError, SegmentReader};

/// Errors from scanning raw data
#[derive(Debug, Error)]
pub enum ScanError {
    /// The bytes are not a well-formed record of the scanner's format
    #[error("malformed {format} data: {message}")]
    Malformed {
        /// The scanner's format
        format: String,
        /// What was wrong
        message: String,
    },

    /// The scanner cannot rebuild raw bytes for this metadata
    #[error("cannot reconstruct {format} data: {message}")]
    Reconstruct {
        /// The scanner's format
        format: String,
        /// What was missing
        message: String,
    },

    /// Segment access failed while scanning
    #[error(transparent)]
    Segment(#[from] SegmentError),
}

/// Result alias for scanner operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Format-specific metadata extraction, provided by the embedding
/// application.
pub trait Scanner {
    /// The format this scanner handles (grib, bufr, vm2, ...)
    fn format(&self) -> &str;

    /// Extracts metadata from one raw record
    fn scan_data(&self, data: &[u8]) -> ScanResult<Metadata>;

    /// Walks a whole segment, yielding each record's metadata and span.
    ///
    /// The sink returning false stops the walk early; the return value is
    /// false if the walk was stopped. Used to rebuild an index from the
    /// segment's actual content.
    fn scan_segment(
        &self,
        reader: &mut SegmentReader,
        sink: &mut dyn FnMut(Metadata, u64, u64) -> bool,
    ) -> ScanResult<bool>;

    /// Rebuilds the original raw bytes from decoded metadata, for formats
    /// that support it (e.g. vm2 line records)
    fn reconstruct(&self, _md: &Metadata) -> ScanResult<Vec<u8>> {
        Err(ScanError::Reconstruct {
            format: self.format().to_string(),
            message: "format does not support reconstruction".to_string(),
        })
    }
}
