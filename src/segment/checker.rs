//! Segment maintenance: check, repack, fix, remove
//!
//! The checker works from the index's view of the segment: a list of live
//! spans (offset, size). It never decides what is live by itself; repack
//! reports the offset remapping so the caller can update the index
//! atomically with the rewrite.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use super::errors::{SegmentError, SegmentResult};
use super::{fsync_dir, Segment};

/// One live record span inside a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the record
    pub offset: u64,
    /// Byte size of the record
    pub size: u64,
}

/// Result of a consistency check of one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// All spans fit and every byte is accounted for
    Ok,
    /// Spans fit but some bytes belong to no live record.
    ///
    /// A repack would reclaim them.
    Dirty {
        /// Bytes not covered by any live span
        unaccounted: u64,
    },
    /// At least one span reaches past the end of the file.
    ///
    /// The index refers to data the segment no longer has; the segment
    /// needs a rebuild from a full rescan.
    Truncated {
        /// Current file length
        len: u64,
        /// The first offending span
        span: Span,
    },
}

/// Result of a repack of one segment
#[derive(Debug, Clone)]
pub struct RepackResult {
    /// (old offset, new offset) for every live span, in rewrite order
    pub remap: Vec<(u64, u64)>,
    /// Bytes the rewrite reclaimed
    pub bytes_reclaimed: u64,
}

/// Maintenance operations on one segment file.
pub struct SegmentChecker {
    segment: Segment,
}

impl SegmentChecker {
    /// Creates a checker for the given segment
    pub fn new(segment: Segment) -> Self {
        Self { segment }
    }

    /// The segment under maintenance
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Verifies that the live spans fit the file and account for all of it
    pub fn check(&self, spans: &[Span]) -> SegmentResult<CheckOutcome> {
        let len = self.segment.len()?;
        let mut accounted = 0u64;
        for span in spans {
            let end = span.offset.checked_add(span.size);
            match end {
                Some(end) if end <= len => accounted += span.size,
                _ => {
                    return Ok(CheckOutcome::Truncated { len, span: *span });
                }
            }
        }
        if accounted < len {
            Ok(CheckOutcome::Dirty {
                unaccounted: len - accounted,
            })
        } else {
            Ok(CheckOutcome::Ok)
        }
    }

    /// Rewrites the segment keeping only the given live spans.
    ///
    /// Live records are copied in span order into a temporary file which
    /// then atomically replaces the segment. The caller must hold the
    /// dataset write lock and apply the returned remapping to the index
    /// in the same maintenance step.
    pub fn repack(&self, spans: &[Span]) -> SegmentResult<RepackResult> {
        let abspath = self.segment.abspath();
        let old_len = self.segment.len()?;

        let mut source = File::open(&abspath).map_err(|e| SegmentError::io(&abspath, e))?;

        let mut tmp_path = abspath.clone().into_os_string();
        tmp_path.push(".repack");
        let tmp_path = std::path::PathBuf::from(tmp_path);
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| SegmentError::io(&tmp_path, e))?;

        let mut remap = Vec::with_capacity(spans.len());
        let mut new_offset = 0u64;
        for span in spans {
            source
                .seek(SeekFrom::Start(span.offset))
                .map_err(|e| SegmentError::io(&abspath, e))?;
            let mut buf = vec![0u8; span.size as usize];
            source
                .read_exact(&mut buf)
                .map_err(|e| SegmentError::io(&abspath, e))?;
            tmp.write_all(&buf)
                .map_err(|e| SegmentError::io(&tmp_path, e))?;
            remap.push((span.offset, new_offset));
            new_offset += span.size;
        }

        tmp.sync_all().map_err(|e| SegmentError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &abspath).map_err(|e| SegmentError::io(&abspath, e))?;
        if let Some(parent) = abspath.parent() {
            fsync_dir(parent)?;
        }

        Ok(RepackResult {
            remap,
            bytes_reclaimed: old_len - new_offset,
        })
    }

    /// Truncates the segment to the last valid record boundary.
    ///
    /// Returns the number of bytes discarded.
    pub fn fix(&self, valid_len: u64) -> SegmentResult<u64> {
        let abspath = self.segment.abspath();
        let len = self.segment.len()?;
        if valid_len >= len {
            return Ok(0);
        }
        let file = OpenOptions::new()
            .write(true)
            .open(&abspath)
            .map_err(|e| SegmentError::io(&abspath, e))?;
        file.set_len(valid_len)
            .map_err(|e| SegmentError::io(&abspath, e))?;
        file.sync_all().map_err(|e| SegmentError::io(&abspath, e))?;
        Ok(len - valid_len)
    }

    /// Deletes the segment file and its index file
    pub fn remove(&self) -> SegmentResult<()> {
        let abspath = self.segment.abspath();
        fs::remove_file(&abspath).map_err(|e| SegmentError::io(&abspath, e))?;
        let index_path = self.segment.index_abspath();
        match fs::remove_file(&index_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SegmentError::io(index_path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentWriter;
    use tempfile::TempDir;

    fn segment_with(dir: &std::path::Path, chunks: &[&[u8]]) -> Segment {
        let seg = Segment::new("grib", dir, "data.grib");
        let mut writer = SegmentWriter::open(seg.clone(), false).unwrap();
        for chunk in chunks {
            writer.append(chunk).unwrap();
        }
        writer.commit().unwrap();
        seg
    }

    #[test]
    fn test_check_clean_segment() {
        let temp_dir = TempDir::new().unwrap();
        let seg = segment_with(temp_dir.path(), &[b"aaaa", b"bbbb"]);
        let checker = SegmentChecker::new(seg);
        let spans = [
            Span { offset: 0, size: 4 },
            Span { offset: 4, size: 4 },
        ];
        assert_eq!(checker.check(&spans).unwrap(), CheckOutcome::Ok);
    }

    #[test]
    fn test_check_reports_unaccounted_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let seg = segment_with(temp_dir.path(), &[b"aaaa", b"dead", b"bbbb"]);
        let checker = SegmentChecker::new(seg);
        let spans = [
            Span { offset: 0, size: 4 },
            Span { offset: 8, size: 4 },
        ];
        assert_eq!(
            checker.check(&spans).unwrap(),
            CheckOutcome::Dirty { unaccounted: 4 }
        );
    }

    #[test]
    fn test_check_detects_truncation() {
        let temp_dir = TempDir::new().unwrap();
        let seg = segment_with(temp_dir.path(), &[b"aaaa"]);
        let checker = SegmentChecker::new(seg);
        let spans = [Span { offset: 2, size: 4 }];
        assert!(matches!(
            checker.check(&spans).unwrap(),
            CheckOutcome::Truncated { len: 4, .. }
        ));
    }

    #[test]
    fn test_repack_drops_dead_bytes_and_remaps() {
        let temp_dir = TempDir::new().unwrap();
        let seg = segment_with(temp_dir.path(), &[b"aaaa", b"dead", b"bbbb"]);
        let checker = SegmentChecker::new(seg.clone());
        let live = [
            Span { offset: 0, size: 4 },
            Span { offset: 8, size: 4 },
        ];

        let result = checker.repack(&live).unwrap();
        assert_eq!(result.bytes_reclaimed, 4);
        assert_eq!(result.remap, vec![(0, 0), (8, 4)]);
        assert_eq!(fs::read(seg.abspath()).unwrap(), b"aaaabbbb");
    }

    #[test]
    fn test_fix_truncates_corrupt_tail() {
        let temp_dir = TempDir::new().unwrap();
        let seg = segment_with(temp_dir.path(), &[b"aaaa", b"garbage"]);
        let checker = SegmentChecker::new(seg.clone());

        let discarded = checker.fix(4).unwrap();
        assert_eq!(discarded, 7);
        assert_eq!(seg.len().unwrap(), 4);

        // Already short enough, nothing to discard
        assert_eq!(checker.fix(10).unwrap(), 0);
    }

    #[test]
    fn test_remove_deletes_segment() {
        let temp_dir = TempDir::new().unwrap();
        let seg = segment_with(temp_dir.path(), &[b"aaaa"]);
        SegmentChecker::new(seg.clone()).remove().unwrap();
        assert!(!seg.abspath().exists());
    }
}
