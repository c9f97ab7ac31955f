//! Transactional ingest path
//!
//! One writer per dataset, enforced by an advisory lock file at the
//! dataset root. Each acquire routes the record to its segment by
//! reference time, appends the raw bytes, and inserts the index entry,
//! all inside one [`Pending`] so a failure between the steps leaves
//! neither half behind.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::rc::Rc;

use chrono::{Duration, Utc};

use crate::index::{Index, IndexError};
use crate::metadata::{Metadata, Source};
use crate::observability::Logger;
use crate::segment::{Segment, SegmentWriter};
use crate::transaction::{Pending, Transaction, TransactionError, TransactionResult};

use super::errors::{DatasetError, DatasetResult};
use super::{AcquireOutcome, DatasetConfig};

const LOCK_FILE: &str = ".lock";

/// Advisory write lock on a dataset root.
///
/// Held for the writer's lifetime; the lock file disappears on drop. A
/// crashed writer leaves a stale lock behind, removed by a dataset check.
struct WriteLock {
    path: PathBuf,
}

impl WriteLock {
    fn acquire(root: &PathBuf) -> DatasetResult<Self> {
        if !root.exists() {
            fs::create_dir_all(root).map_err(|e| DatasetError::io(root, e))?;
        }
        let path = root.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(DatasetError::Locked { path })
            }
            Err(e) => Err(DatasetError::io(path, e)),
        }
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// The segment append plus index insert of one acquire, as a single
/// committable unit.
///
/// Commit order matters: the segment bytes are made durable first, then
/// the index entry is written. A crash between the two leaves an
/// unreferenced tail in the segment, which a repack reclaims; the reverse
/// order could leave the index pointing at bytes that never hit disk.
pub struct AcquireTransaction {
    segment: Rc<RefCell<SegmentWriter>>,
    index: Rc<RefCell<Index>>,
    metadata: Metadata,
    offset: u64,
    size: u64,
}

impl AcquireTransaction {
    /// Wraps one staged append for commit or rollback
    pub fn new(
        segment: Rc<RefCell<SegmentWriter>>,
        index: Rc<RefCell<Index>>,
        metadata: Metadata,
        offset: u64,
        size: u64,
    ) -> Self {
        Self {
            segment,
            index,
            metadata,
            offset,
            size,
        }
    }
}

impl Transaction for AcquireTransaction {
    fn commit(&mut self) -> TransactionResult<()> {
        self.segment
            .borrow_mut()
            .commit()
            .map_err(|e| Box::new(e) as TransactionError)?;
        self.index
            .borrow_mut()
            .insert(&self.metadata, self.offset, self.size)
            .map_err(|e| Box::new(e) as TransactionError)?;
        Ok(())
    }

    fn rollback(&mut self) {
        // Best effort; a failed truncate leaves an unreferenced tail that
        // repack reclaims
        let _ = self.segment.borrow_mut().rollback();
    }
}

/// Ingest handle for one dataset.
pub struct DatasetWriter {
    config: DatasetConfig,
    _lock: WriteLock,
    segments: HashMap<PathBuf, (Rc<RefCell<SegmentWriter>>, Rc<RefCell<Index>>)>,
}

impl DatasetWriter {
    /// Opens the dataset for writing, taking the write lock
    pub fn open(config: DatasetConfig) -> DatasetResult<Self> {
        let lock = WriteLock::acquire(&config.path)?;
        Logger::trace(
            "dataset_write_lock_acquired",
            &[("dataset", &config.name)],
        );
        Ok(Self {
            config,
            _lock: lock,
            segments: HashMap::new(),
        })
    }

    /// The dataset configuration
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    fn segment(
        &mut self,
        relpath: PathBuf,
    ) -> DatasetResult<(Rc<RefCell<SegmentWriter>>, Rc<RefCell<Index>>)> {
        if let Some(pair) = self.segments.get(&relpath) {
            return Ok(pair.clone());
        }
        let segment = Segment::new(
            self.config.format.clone(),
            self.config.path.clone(),
            relpath.clone(),
        );
        let index_path = segment.index_abspath();
        let writer = SegmentWriter::open(segment, self.config.eatmydata)?;
        let index = Index::open(index_path, self.config.index_config())?;
        let pair = (Rc::new(RefCell::new(writer)), Rc::new(RefCell::new(index)));
        self.segments.insert(relpath, pair.clone());
        Ok(pair)
    }

    /// Ingests one record.
    ///
    /// On success the metadata's source is set to the stored blob.
    /// Duplicate keys under the reject policy and records refused by the
    /// `delete age` policy are ordinary outcomes, not errors.
    pub fn acquire(&mut self, md: &mut Metadata, data: &[u8]) -> DatasetResult<AcquireOutcome> {
        let reftime = md.reftime().ok_or(DatasetError::MissingReftime)?;

        if let Some(days) = self.config.delete_age {
            let cutoff = Utc::now().naive_utc() - Duration::days(days);
            if reftime < cutoff {
                return Ok(AcquireOutcome::Filtered);
            }
        }

        let relpath = self.config.step.relpath(reftime, &self.config.format);
        let (segment, index) = self.segment(relpath.clone())?;

        // Policy check before touching the segment
        match index.borrow().check_insert(md) {
            Ok(_) => {}
            Err(IndexError::DuplicateKey) => return Ok(AcquireOutcome::Duplicate),
            Err(e) => return Err(e.into()),
        }

        let offset = {
            let mut writer = segment.borrow_mut();
            match writer.append(data) {
                Ok(offset) => offset,
                Err(e) => {
                    let _ = writer.rollback();
                    return Err(e.into());
                }
            }
        };

        let pending = Pending::new(Box::new(AcquireTransaction::new(
            Rc::clone(&segment),
            Rc::clone(&index),
            md.clone(),
            offset,
            data.len() as u64,
        )));
        pending.commit().map_err(DatasetError::Commit)?;

        md.set_source(Source::blob(
            self.config.format.clone(),
            self.config.path.clone(),
            relpath,
            offset,
            data.len() as u64,
        ));
        Ok(AcquireOutcome::Acquired)
    }

    /// Closes all cached segment handles
    pub fn close(&mut self) {
        for (_, index) in self.segments.values() {
            index.borrow_mut().close();
        }
        self.segments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attribute, Code, Origin};
    use chrono::{Datelike, NaiveDate};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    use crate::index::DuplicatePolicy;
    use crate::dataset::Step;

    fn config(root: &std::path::Path, on_duplicate: DuplicatePolicy) -> DatasetConfig {
        DatasetConfig {
            name: "test".to_string(),
            path: root.join("ds"),
            format: "grib".to_string(),
            step: Step::Daily,
            unique: [Code::Origin, Code::Reftime].into_iter().collect(),
            index: BTreeSet::new(),
            on_duplicate,
            delete_age: None,
            eatmydata: false,
        }
    }

    fn md(day: u32) -> Metadata {
        let mut md = Metadata::new();
        md.set(Attribute::Origin(Origin::Grib1 {
            centre: 200,
            subcentre: 0,
            process: 1,
        }));
        md.set(Attribute::Reftime(
            NaiveDate::from_ymd_opt(2007, 4, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        ));
        md
    }

    #[test]
    fn test_acquire_sets_blob_source() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = DatasetWriter::open(config(temp_dir.path(), DuplicatePolicy::Reject))
            .unwrap();

        let mut item = md(15);
        let outcome = writer.acquire(&mut item, b"GRIB-payload").unwrap();
        assert_eq!(outcome, AcquireOutcome::Acquired);

        match item.source().unwrap() {
            Source::Blob {
                filename,
                offset,
                size,
                ..
            } => {
                assert_eq!(filename, &PathBuf::from("2007/04-15.grib"));
                assert_eq!((*offset, *size), (0, 12));
            }
            other => panic!("unexpected source: {:?}", other),
        }
        assert!(temp_dir.path().join("ds/2007/04-15.grib").exists());
        assert!(temp_dir.path().join("ds/2007/04-15.grib.index").exists());
    }

    #[test]
    fn test_duplicate_is_an_outcome_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = DatasetWriter::open(config(temp_dir.path(), DuplicatePolicy::Reject))
            .unwrap();

        assert_eq!(
            writer.acquire(&mut md(15), b"first").unwrap(),
            AcquireOutcome::Acquired
        );
        assert_eq!(
            writer.acquire(&mut md(15), b"again").unwrap(),
            AcquireOutcome::Duplicate
        );

        // The duplicate's bytes were rolled back
        let segment = temp_dir.path().join("ds/2007/04-15.grib");
        assert_eq!(fs::read(segment).unwrap(), b"first");
    }

    #[test]
    fn test_replace_policy_appends_and_remaps() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = DatasetWriter::open(config(temp_dir.path(), DuplicatePolicy::Replace))
            .unwrap();

        writer.acquire(&mut md(15), b"first").unwrap();
        let mut second = md(15);
        writer.acquire(&mut second, b"second").unwrap();

        match second.source().unwrap() {
            Source::Blob { offset, .. } => assert_eq!(*offset, 5),
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn test_missing_reftime_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = DatasetWriter::open(config(temp_dir.path(), DuplicatePolicy::Reject))
            .unwrap();
        let mut item = Metadata::new();
        assert!(matches!(
            writer.acquire(&mut item, b"x"),
            Err(DatasetError::MissingReftime)
        ));
    }

    #[test]
    fn test_delete_age_filters_old_records() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(temp_dir.path(), DuplicatePolicy::Reject);
        config.delete_age = Some(30);
        let mut writer = DatasetWriter::open(config).unwrap();

        // A 2007 record is far older than 30 days
        assert_eq!(
            writer.acquire(&mut md(15), b"old").unwrap(),
            AcquireOutcome::Filtered
        );

        let mut fresh = Metadata::new();
        fresh.set(Attribute::Origin(Origin::Grib1 {
            centre: 200,
            subcentre: 0,
            process: 1,
        }));
        fresh.set(Attribute::Reftime(Utc::now().naive_utc()));
        assert_eq!(
            writer.acquire(&mut fresh, b"new").unwrap(),
            AcquireOutcome::Acquired
        );
        let now = Utc::now().naive_utc();
        let expected = format!("{:04}/{:02}-{:02}.grib", now.year(), now.month(), now.day());
        assert!(temp_dir.path().join("ds").join(expected).exists());
    }

    #[test]
    fn test_second_writer_is_locked_out() {
        let temp_dir = TempDir::new().unwrap();
        let writer = DatasetWriter::open(config(temp_dir.path(), DuplicatePolicy::Reject))
            .unwrap();
        assert!(matches!(
            DatasetWriter::open(config(temp_dir.path(), DuplicatePolicy::Reject)),
            Err(DatasetError::Locked { .. })
        ));
        drop(writer);
        // Lock released on drop
        DatasetWriter::open(config(temp_dir.path(), DuplicatePolicy::Reject)).unwrap();
    }
}
