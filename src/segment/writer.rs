//! Segment writer with transactional append semantics
//!
//! Appends are staged: bytes land in the file immediately, but the
//! committed length only advances on [`SegmentWriter::commit`]. A rollback
//! truncates the file back to the committed length, so a failure between
//! segment append and index insert leaves no orphan bytes behind.
//!
//! Durability: commit fsyncs the file unless the dataset is configured
//! with `eatmydata`, which trades crash safety for throughput.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::errors::{SegmentError, SegmentResult};
use super::Segment;

/// Append handle for one segment file.
pub struct SegmentWriter {
    segment: Segment,
    abspath: PathBuf,
    file: File,
    /// Length the last commit made durable
    committed_len: u64,
    /// Length including staged, uncommitted appends
    written_len: u64,
    eatmydata: bool,
}

impl SegmentWriter {
    /// Opens or creates the segment file for appending.
    ///
    /// Parent directories are created if missing.
    pub fn open(segment: Segment, eatmydata: bool) -> SegmentResult<Self> {
        let abspath = segment.abspath();
        if let Some(parent) = abspath.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| SegmentError::io(parent, e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&abspath)
            .map_err(|e| SegmentError::io(&abspath, e))?;

        let committed_len = file
            .metadata()
            .map_err(|e| SegmentError::io(&abspath, e))?
            .len();

        Ok(Self {
            segment,
            abspath,
            file,
            committed_len,
            written_len: committed_len,
            eatmydata,
        })
    }

    /// The segment this writer appends to
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// The absolute path of the segment file
    pub fn path(&self) -> &Path {
        &self.abspath
    }

    /// Length made durable by the last commit
    pub fn committed_len(&self) -> u64 {
        self.committed_len
    }

    /// Length including staged appends
    pub fn written_len(&self) -> u64 {
        self.written_len
    }

    /// True if appends are staged but not yet committed
    pub fn is_dirty(&self) -> bool {
        self.written_len != self.committed_len
    }

    /// Stages an append, returning the offset the bytes start at.
    ///
    /// The bytes become part of the segment only once [`commit`] runs;
    /// until then a [`rollback`] discards them.
    ///
    /// [`commit`]: SegmentWriter::commit
    /// [`rollback`]: SegmentWriter::rollback
    pub fn append(&mut self, data: &[u8]) -> SegmentResult<u64> {
        let offset = self.written_len;
        self.file
            .write_all(data)
            .map_err(|e| SegmentError::io(&self.abspath, e))?;
        self.written_len += data.len() as u64;
        Ok(offset)
    }

    /// Makes staged appends durable and advances the committed length
    pub fn commit(&mut self) -> SegmentResult<()> {
        if self.written_len == self.committed_len {
            return Ok(());
        }
        if !self.eatmydata {
            self.file
                .sync_all()
                .map_err(|e| SegmentError::io(&self.abspath, e))?;
        }
        self.committed_len = self.written_len;
        Ok(())
    }

    /// Truncates the file back to the committed length, discarding staged
    /// appends
    pub fn rollback(&mut self) -> SegmentResult<()> {
        if self.written_len == self.committed_len {
            return Ok(());
        }
        self.file
            .set_len(self.committed_len)
            .map_err(|e| SegmentError::io(&self.abspath, e))?;
        self.written_len = self.committed_len;
        Ok(())
    }
}
