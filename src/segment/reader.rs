//! Positional reads from a segment file

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use super::errors::{SegmentError, SegmentResult};
use super::Segment;

/// Read handle for one segment file.
///
/// The length is sampled at open time: a query sees the segment as it was
/// when the reader was created, and later appends are invisible to it.
pub struct SegmentReader {
    abspath: PathBuf,
    file: File,
    len: u64,
}

impl SegmentReader {
    /// Opens the segment file for reading
    pub fn open(segment: &Segment) -> SegmentResult<Self> {
        let abspath = segment.abspath();
        let file = File::open(&abspath).map_err(|e| SegmentError::io(&abspath, e))?;
        let len = file
            .metadata()
            .map_err(|e| SegmentError::io(&abspath, e))?
            .len();
        Ok(Self { abspath, file, len })
    }

    /// The segment length observed at open time
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if the segment was empty at open time
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads `size` bytes starting at `offset`.
    ///
    /// Fails with [`SegmentError::OutOfRange`] if the span reaches past
    /// the length observed at open time, which signals index/segment
    /// desync.
    pub fn read_at(&mut self, offset: u64, size: u64) -> SegmentResult<Vec<u8>> {
        if offset.checked_add(size).map_or(true, |end| end > self.len) {
            return Err(SegmentError::OutOfRange {
                offset,
                size,
                len: self.len,
            });
        }
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| SegmentError::io(&self.abspath, e))?;
        let mut buf = vec![0u8; size as usize];
        self.file
            .read_exact(&mut buf)
            .map_err(|e| SegmentError::io(&self.abspath, e))?;
        Ok(buf)
    }
}
