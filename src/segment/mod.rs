//! Append-only segment files
//!
//! A segment is a flat file of concatenated raw records, one per ingested
//! item. Records carry no framing of their own inside the segment; their
//! position and size live in the dataset index. Three roles operate on a
//! segment:
//!
//! - [`SegmentWriter`] appends bytes, with commit/rollback semantics driven
//!   by the enclosing transaction
//! - [`SegmentReader`] serves positional reads for query results
//! - [`SegmentChecker`] performs maintenance: repack, fix, remove

mod checker;
mod errors;
mod reader;
mod writer;

pub use checker::{CheckOutcome, RepackResult, SegmentChecker, Span};
pub use errors::{SegmentError, SegmentResult};
pub use reader::SegmentReader;
pub use writer::SegmentWriter;

use std::path::{Path, PathBuf};

/// Identity of one segment file within a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Data format of the records inside (grib, bufr, vm2, ...)
    pub format: String,
    /// Dataset root directory
    pub root: PathBuf,
    /// Path of the segment file relative to the root
    pub relpath: PathBuf,
}

impl Segment {
    /// Creates a segment identity
    pub fn new(format: impl Into<String>, root: impl Into<PathBuf>, relpath: impl Into<PathBuf>) -> Self {
        Self {
            format: format.into(),
            root: root.into(),
            relpath: relpath.into(),
        }
    }

    /// The absolute path of the segment file
    pub fn abspath(&self) -> PathBuf {
        self.root.join(&self.relpath)
    }

    /// The absolute path of the per-segment index file
    pub fn index_abspath(&self) -> PathBuf {
        let mut path = self.abspath().into_os_string();
        path.push(".index");
        PathBuf::from(path)
    }

    /// The relative path as a displayable string
    pub fn relpath_str(&self) -> String {
        self.relpath.display().to_string()
    }

    /// Current length of the segment file, zero if it does not exist yet
    pub fn len(&self) -> SegmentResult<u64> {
        let abspath = self.abspath();
        match std::fs::metadata(&abspath) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(SegmentError::io(abspath, e)),
        }
    }

    /// True if the segment file does not exist or is empty
    pub fn is_empty(&self) -> SegmentResult<bool> {
        Ok(self.len()? == 0)
    }
}

pub(crate) fn fsync_dir(dir: &Path) -> SegmentResult<()> {
    let handle = std::fs::File::open(dir).map_err(|e| SegmentError::io(dir, e))?;
    handle.sync_all().map_err(|e| SegmentError::io(dir, e))
}
