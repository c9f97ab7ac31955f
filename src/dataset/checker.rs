//! Dataset maintenance: check, repack, fix
//!
//! Maintenance never mutates silently: every operation returns a report
//! of what it found or did. Data problems are findings, not errors; only
//! filesystem failures propagate.

use std::path::PathBuf;

use serde::Serialize;

use crate::index::{DuplicatePolicy, Index, IndexError};
use crate::observability::Logger;
use crate::scan::Scanner;
use crate::segment::{CheckOutcome, Segment, SegmentChecker, SegmentReader};

use super::errors::DatasetResult;
use super::reader::DatasetReader;
use super::DatasetConfig;

/// Condition of one segment and its index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SegmentState {
    /// Segment and index agree and every byte is live
    Ok,
    /// The segment carries bytes no live index entry references
    Dirty {
        /// Reclaimable bytes
        unaccounted: u64,
    },
    /// The index references bytes past the end of the segment
    Truncated {
        /// Current segment length
        len: u64,
    },
    /// The index log is damaged and needs recovery
    IndexDamaged {
        /// Offset of the first damaged record
        offset: u64,
    },
}

/// Findings of a dataset check
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    /// Per-segment condition, in path order
    pub segments: Vec<(PathBuf, SegmentState)>,
}

impl CheckReport {
    /// True if every segment checked out clean
    pub fn is_clean(&self) -> bool {
        self.segments
            .iter()
            .all(|(_, state)| *state == SegmentState::Ok)
    }
}

/// Actions taken by a repack
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepackReport {
    /// Segments rewritten, with bytes reclaimed from each
    pub segments: Vec<(PathBuf, u64)>,
}

impl RepackReport {
    /// Total bytes reclaimed
    pub fn bytes_reclaimed(&self) -> u64 {
        self.segments.iter().map(|(_, bytes)| bytes).sum()
    }
}

/// Actions taken fixing one segment
#[derive(Debug, Clone, Serialize)]
pub struct SegmentFix {
    /// The segment's path relative to the dataset root
    pub relpath: PathBuf,
    /// Damaged index log bytes discarded
    pub index_bytes_discarded: u64,
    /// Corrupt segment tail bytes discarded
    pub segment_bytes_discarded: u64,
    /// Records reindexed from the segment rescan
    pub records: u64,
}

/// Actions taken by a fix pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct FixReport {
    /// Per-segment fixes, in path order
    pub segments: Vec<SegmentFix>,
}

/// Maintenance handle for one dataset.
pub struct DatasetChecker {
    config: DatasetConfig,
}

impl DatasetChecker {
    /// Opens the dataset for maintenance.
    ///
    /// The caller must ensure no writer targets the dataset while repack
    /// or fix runs.
    pub fn open(config: DatasetConfig) -> Self {
        Self { config }
    }

    fn segments(&self) -> DatasetResult<Vec<Segment>> {
        DatasetReader::open(self.config.clone()).segments()
    }

    /// Examines every segment and its index without mutating anything
    pub fn check(&self) -> DatasetResult<CheckReport> {
        let mut report = CheckReport::default();
        for segment in self.segments()? {
            let state = match Index::open(segment.index_abspath(), self.config.index_config()) {
                Ok(index) => {
                    let checker = SegmentChecker::new(segment.clone());
                    match checker.check(&index.live_spans())? {
                        CheckOutcome::Ok => SegmentState::Ok,
                        CheckOutcome::Dirty { unaccounted } => {
                            SegmentState::Dirty { unaccounted }
                        }
                        CheckOutcome::Truncated { len, .. } => SegmentState::Truncated { len },
                    }
                }
                Err(IndexError::Corruption { offset, .. }) => {
                    SegmentState::IndexDamaged { offset }
                }
                Err(e) => return Err(e.into()),
            };
            report.segments.push((segment.relpath, state));
        }
        Ok(report)
    }

    /// Rewrites dirty segments, dropping bytes no live entry references.
    ///
    /// Each rewrite updates the segment and its index in one maintenance
    /// step: the segment is atomically replaced, then the index entries
    /// are remapped to the new offsets and the index log compacted.
    pub fn repack(&self) -> DatasetResult<RepackReport> {
        let mut report = RepackReport::default();
        for segment in self.segments()? {
            let mut index = Index::open(segment.index_abspath(), self.config.index_config())?;
            let checker = SegmentChecker::new(segment.clone());
            let spans = index.live_spans();
            match checker.check(&spans)? {
                CheckOutcome::Dirty { .. } => {
                    let result = checker.repack(&spans)?;
                    index.apply_repack(&result.remap)?;
                    Logger::info(
                        "segment_repacked",
                        &[
                            ("dataset", &self.config.name),
                            ("segment", &segment.relpath_str()),
                            ("bytes_reclaimed", &result.bytes_reclaimed.to_string()),
                        ],
                    );
                    report
                        .segments
                        .push((segment.relpath, result.bytes_reclaimed));
                }
                CheckOutcome::Ok => {
                    // Segment is clean; still drop dead index log records
                    if index.dead_records() > 0 {
                        index.compact()?;
                    }
                }
                // Repack cannot help a truncated segment; fix handles it
                CheckOutcome::Truncated { .. } => {}
            }
        }
        Ok(report)
    }

    /// Best-effort recovery of damaged segments and indexes.
    ///
    /// Damaged index logs are truncated at the corruption point, then the
    /// index is rebuilt from a full segment rescan through the scanner.
    /// Corrupt segment tails (bytes the scanner cannot parse) are
    /// truncated, reporting how much was discarded.
    pub fn fix(&self, scanner: &dyn Scanner) -> DatasetResult<FixReport> {
        let mut report = FixReport::default();
        for segment in self.segments()? {
            let index_path = segment.index_abspath();
            let (_, index_bytes_discarded) =
                Index::recover(&index_path, self.config.index_config())?;

            // Rebuild the index from what the segment actually holds
            let mut scanned: Vec<(crate::metadata::Metadata, u64, u64)> = Vec::new();
            {
                let mut reader = SegmentReader::open(&segment)?;
                scanner.scan_segment(&mut reader, &mut |md, offset, size| {
                    scanned.push((md, offset, size));
                    true
                })?;
            }

            let valid_len = scanned
                .iter()
                .map(|(_, offset, size)| offset + size)
                .max()
                .unwrap_or(0);
            let checker = SegmentChecker::new(segment.clone());
            let segment_bytes_discarded = checker.fix(valid_len)?;

            std::fs::remove_file(&index_path)
                .map_err(|e| IndexError::io(&index_path, e))?;
            // Rescan may legitimately contain replaced duplicates; keep
            // the last occurrence like the replace policy would
            let mut rebuild_config = self.config.index_config();
            rebuild_config.on_duplicate = DuplicatePolicy::Replace;
            let mut index = Index::open(&index_path, rebuild_config)?;
            let records = scanned.len() as u64;
            for (md, offset, size) in scanned {
                index.insert(&md, offset, size)?;
            }
            index.compact()?;

            if index_bytes_discarded > 0 || segment_bytes_discarded > 0 {
                Logger::warn(
                    "segment_fixed",
                    &[
                        ("dataset", &self.config.name),
                        ("segment", &segment.relpath_str()),
                        ("index_bytes_discarded", &index_bytes_discarded.to_string()),
                        (
                            "segment_bytes_discarded",
                            &segment_bytes_discarded.to_string(),
                        ),
                        ("records_reindexed", &records.to_string()),
                    ],
                );
            }
            report.segments.push(SegmentFix {
                relpath: segment.relpath,
                index_bytes_discarded,
                segment_bytes_discarded,
                records,
            });
        }
        Ok(report)
    }
}
