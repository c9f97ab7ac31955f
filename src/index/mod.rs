//! Per-segment index (iseg)
//!
//! Each segment file has a sibling index file: an append-only log of
//! checksummed insert/tombstone records ([`entry::LogRecord`]) replayed
//! into memory on open. The in-memory state maps unique-key bytes to the
//! live slot for that key; replaced and tombstoned slots stay in the log
//! as dead weight until [`Index::compact`] rewrites it.
//!
//! Visibility follows the transaction protocol: an insert hits the log
//! only when the enclosing transaction commits, so concurrent readers
//! never observe uncommitted entries. Queries work on a sorted snapshot
//! taken at call time.

mod entry;
mod errors;
mod summary;

pub use entry::LogRecord;
pub use errors::{IndexError, IndexResult};
pub use summary::Summary;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::matcher::Matcher;
use crate::metadata::Metadata;
use crate::segment::Span;
use crate::types::Code;

/// What to do when an insert collides with an existing unique key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail the insert with [`IndexError::DuplicateKey`]
    #[default]
    Reject,
    /// Replace the existing entry, tombstoning its segment slot
    Replace,
}

impl DuplicatePolicy {
    /// Parses the `on duplicate` configuration value
    pub fn from_config(value: &str) -> Option<Self> {
        match value {
            "reject" => Some(DuplicatePolicy::Reject),
            "replace" => Some(DuplicatePolicy::Replace),
            _ => None,
        }
    }
}

/// Index configuration, from the dataset's `unique`, `index`,
/// `on duplicate` and `eatmydata` settings
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Attribute types forming the unique key
    pub unique: BTreeSet<Code>,
    /// Attribute types the dataset declares queryable; informational,
    /// every stored attribute is matchable
    pub index: BTreeSet<Code>,
    /// Conflict policy for unique-key collisions
    pub on_duplicate: DuplicatePolicy,
    /// Skip fsync barriers; only safe for disposable datasets
    pub eatmydata: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            unique: [Code::Reftime].into_iter().collect(),
            index: BTreeSet::new(),
            on_duplicate: DuplicatePolicy::Reject,
            eatmydata: false,
        }
    }
}

/// One live index entry
#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    offset: u64,
    size: u64,
    metadata: Metadata,
}

/// One query result: the stored metadata plus the segment span holding
/// the raw bytes
#[derive(Debug, Clone)]
pub struct IndexHit {
    /// The stored metadata
    pub metadata: Metadata,
    /// Record offset in the segment
    pub offset: u64,
    /// Record size in the segment
    pub size: u64,
}

/// Per-segment index over unique metadata keys.
pub struct Index {
    path: PathBuf,
    config: IndexConfig,
    /// None once closed
    file: Option<File>,
    entries: BTreeMap<Vec<u8>, Slot>,
    next_seq: u64,
    /// Log records with no live in-memory entry; compact reclaims them
    dead_records: u64,
    dirty: bool,
}

impl Index {
    /// Opens the index file, replaying its log into memory.
    ///
    /// A missing file is an empty index. Damaged log content fails with
    /// [`IndexError::Corruption`] carrying the offset of the first bad
    /// record; [`Index::recover`] truncates there.
    pub fn open(path: impl Into<PathBuf>, config: IndexConfig) -> IndexResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| IndexError::io(&path, e))?;

        let mut log = Vec::new();
        file.read_to_end(&mut log)
            .map_err(|e| IndexError::io(&path, e))?;

        let mut index = Self {
            path,
            config,
            file: Some(file),
            entries: BTreeMap::new(),
            next_seq: 0,
            dead_records: 0,
            dirty: false,
        };
        index.replay(&log)?;
        Ok(index)
    }

    /// Opens the index, truncating damaged trailing log content first.
    ///
    /// Returns the index and the number of bytes discarded. Entries before
    /// the corruption point survive; the caller should rebuild the rest
    /// from a segment rescan.
    pub fn recover(path: impl Into<PathBuf>, config: IndexConfig) -> IndexResult<(Self, u64)> {
        let path = path.into();
        match Self::open(&path, config.clone()) {
            Ok(index) => Ok((index, 0)),
            Err(IndexError::Corruption { offset, .. }) => {
                let len = fs::metadata(&path)
                    .map_err(|e| IndexError::io(&path, e))?
                    .len();
                let file = OpenOptions::new()
                    .write(true)
                    .open(&path)
                    .map_err(|e| IndexError::io(&path, e))?;
                file.set_len(offset).map_err(|e| IndexError::io(&path, e))?;
                file.sync_all().map_err(|e| IndexError::io(&path, e))?;
                let index = Self::open(&path, config)?;
                Ok((index, len - offset))
            }
            Err(e) => Err(e),
        }
    }

    fn replay(&mut self, log: &[u8]) -> IndexResult<()> {
        let mut pos = 0usize;
        while pos < log.len() {
            let (record, consumed) = LogRecord::deserialize(&log[pos..]).map_err(|e| match e {
                IndexError::Corruption { message, .. } => IndexError::Corruption {
                    offset: pos as u64,
                    message,
                },
                other => other,
            })?;
            self.apply(record);
            pos += consumed;
        }
        Ok(())
    }

    fn apply(&mut self, record: LogRecord) {
        match record {
            LogRecord::Insert {
                seq,
                key,
                offset,
                size,
                metadata,
            } => {
                // Decoding failures here mean a bug in our own encoder;
                // replay keeps the entry only if it decodes
                if let Ok(metadata) = Metadata::decode_binary(&metadata) {
                    if self.entries.insert(key, Slot { seq, offset, size, metadata }).is_some() {
                        self.dead_records += 1;
                    }
                    self.next_seq = self.next_seq.max(seq + 1);
                }
            }
            LogRecord::Tombstone { seq, key } => {
                if self.entries.remove(&key).is_some() {
                    // The killed insert and the tombstone itself
                    self.dead_records += 2;
                }
                self.next_seq = self.next_seq.max(seq + 1);
            }
        }
    }

    /// The index file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The index configuration
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no live entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if a write is in flight that has not reached the log yet
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of log records a compact would drop
    pub fn dead_records(&self) -> u64 {
        self.dead_records
    }

    fn file(&mut self) -> IndexResult<&mut File> {
        self.file.as_mut().ok_or(IndexError::Closed)
    }

    /// Computes the unique key and checks the conflict policy.
    ///
    /// Under the reject policy an existing key fails with
    /// [`IndexError::DuplicateKey`]; under replace it succeeds and the
    /// later [`Index::insert`] displaces the old entry. Called before the
    /// segment append so policy rejections touch no storage.
    pub fn check_insert(&self, md: &Metadata) -> IndexResult<Vec<u8>> {
        if self.file.is_none() {
            return Err(IndexError::Closed);
        }
        let key = md.encode_key(&self.config.unique);
        if self.entries.contains_key(&key) && self.config.on_duplicate == DuplicatePolicy::Reject {
            return Err(IndexError::DuplicateKey);
        }
        Ok(key)
    }

    /// Inserts a committed record.
    ///
    /// Runs at transaction commit time, after the segment bytes are
    /// durable. The log write is fsynced unless `eatmydata` is set. Under
    /// the replace policy an existing entry for the key is displaced and
    /// its segment slot becomes dead.
    pub fn insert(&mut self, md: &Metadata, offset: u64, size: u64) -> IndexResult<()> {
        let key = self.check_insert(md)?;
        let seq = self.next_seq;
        let record = LogRecord::Insert {
            seq,
            key: key.clone(),
            offset,
            size,
            metadata: md.encode_binary(),
        };

        self.dirty = true;
        self.write_record(&record)?;

        if self
            .entries
            .insert(
                key,
                Slot {
                    seq,
                    offset,
                    size,
                    metadata: md.clone(),
                },
            )
            .is_some()
        {
            self.dead_records += 1;
        }
        self.next_seq = seq + 1;
        self.dirty = false;
        Ok(())
    }

    /// Removes the entry with the given unique key, if present.
    ///
    /// Returns the removed segment span, so the caller can account the
    /// bytes as reclaimable.
    pub fn remove(&mut self, key: &[u8]) -> IndexResult<Option<Span>> {
        if self.file.is_none() {
            return Err(IndexError::Closed);
        }
        if !self.entries.contains_key(key) {
            return Ok(None);
        }
        let seq = self.next_seq;
        let record = LogRecord::Tombstone {
            seq,
            key: key.to_vec(),
        };

        self.dirty = true;
        self.write_record(&record)?;

        let slot = self.entries.remove(key);
        self.dead_records += 2;
        self.next_seq = seq + 1;
        self.dirty = false;
        Ok(slot.map(|s| Span {
            offset: s.offset,
            size: s.size,
        }))
    }

    fn write_record(&mut self, record: &LogRecord) -> IndexResult<()> {
        let bytes = record.serialize();
        let eatmydata = self.config.eatmydata;
        let path = self.path.clone();
        let file = self.file()?;
        file.write_all(&bytes)
            .map_err(|e| IndexError::io(&path, e))?;
        if !eatmydata {
            file.sync_all().map_err(|e| IndexError::io(&path, e))?;
        }
        Ok(())
    }

    /// Queries the index with a matcher.
    ///
    /// Works on a snapshot of the live entries at call time, ordered by
    /// reference time then insertion sequence, so repeated queries over an
    /// unchanged index return identical sequences. The matcher's reftime
    /// bounds prune entries before full evaluation.
    pub fn query(&self, matcher: &Matcher) -> IndexResult<Vec<IndexHit>> {
        if self.file.is_none() {
            return Err(IndexError::Closed);
        }
        let (lower, upper) = matcher.reftime_extremes();
        let mut hits: Vec<&Slot> = self
            .entries
            .values()
            .filter(|slot| match slot.metadata.reftime() {
                Some(time) => {
                    lower.map_or(true, |bound| time >= bound)
                        && upper.map_or(true, |bound| time <= bound)
                }
                // No reftime: not prunable; a reftime clause will reject
                // it during full evaluation anyway
                None => true,
            })
            .filter(|slot| matcher.matches(&slot.metadata))
            .collect();
        hits.sort_by_key(|slot| (slot.metadata.reftime(), slot.seq));
        Ok(hits
            .into_iter()
            .map(|slot| IndexHit {
                metadata: slot.metadata.clone(),
                offset: slot.offset,
                size: slot.size,
            })
            .collect())
    }

    /// Aggregates the matched subset without materializing records
    pub fn summary(&self, matcher: &Matcher) -> IndexResult<Summary> {
        if self.file.is_none() {
            return Err(IndexError::Closed);
        }
        let mut summary = Summary::new();
        for slot in self.entries.values() {
            if matcher.matches(&slot.metadata) {
                summary.add(slot.size, slot.metadata.reftime());
            }
        }
        Ok(summary)
    }

    /// All live entries as (unique key, segment span), sorted by offset.
    ///
    /// This is the checker's view of which segment bytes are live.
    pub fn live_spans(&self) -> Vec<Span> {
        let mut spans: Vec<Span> = self
            .entries
            .values()
            .map(|slot| Span {
                offset: slot.offset,
                size: slot.size,
            })
            .collect();
        spans.sort_by_key(|span| span.offset);
        spans
    }

    /// Reference times of live entries, min and max
    pub fn reftime_extremes(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        let mut min = None;
        let mut max = None;
        for slot in self.entries.values() {
            if let Some(time) = slot.metadata.reftime() {
                min = Some(min.map_or(time, |cur: NaiveDateTime| cur.min(time)));
                max = Some(max.map_or(time, |cur: NaiveDateTime| cur.max(time)));
            }
        }
        (min, max)
    }

    /// Iterates live entries as (key, metadata, span), in key order
    pub fn iter_live(&self) -> impl Iterator<Item = (&[u8], &Metadata, Span)> {
        self.entries.iter().map(|(key, slot)| {
            (
                key.as_slice(),
                &slot.metadata,
                Span {
                    offset: slot.offset,
                    size: slot.size,
                },
            )
        })
    }

    /// Rewrites the log keeping only live entries.
    ///
    /// The new log is written to a temporary file, fsynced, and renamed
    /// over the old one. Dead record bookkeeping resets to zero.
    pub fn compact(&mut self) -> IndexResult<()> {
        if self.file.is_none() {
            return Err(IndexError::Closed);
        }

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".compact");
        let tmp_path = PathBuf::from(tmp_path);
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| IndexError::io(&tmp_path, e))?;

        let mut slots: Vec<(&Vec<u8>, &Slot)> = self.entries.iter().collect();
        slots.sort_by_key(|(_, slot)| slot.seq);
        for (key, slot) in slots {
            let record = LogRecord::Insert {
                seq: slot.seq,
                key: key.clone(),
                offset: slot.offset,
                size: slot.size,
                metadata: slot.metadata.encode_binary(),
            };
            tmp.write_all(&record.serialize())
                .map_err(|e| IndexError::io(&tmp_path, e))?;
        }
        tmp.sync_all().map_err(|e| IndexError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| IndexError::io(&self.path, e))?;

        // Reopen the log handle on the new file
        self.file = Some(
            OpenOptions::new()
                .read(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| IndexError::io(&self.path, e))?,
        );
        self.dead_records = 0;
        Ok(())
    }

    /// Applies a segment repack's offset remapping, then compacts.
    ///
    /// Entries whose offset is not in the remapping were dropped by the
    /// repack and are removed.
    pub fn apply_repack(&mut self, remap: &[(u64, u64)]) -> IndexResult<()> {
        if self.file.is_none() {
            return Err(IndexError::Closed);
        }
        let remap: BTreeMap<u64, u64> = remap.iter().copied().collect();
        self.entries.retain(|_, slot| match remap.get(&slot.offset) {
            Some(new_offset) => {
                slot.offset = *new_offset;
                true
            }
            None => false,
        });
        self.compact()
    }

    /// Closes the index; further operations fail with
    /// [`IndexError::Closed`]
    pub fn close(&mut self) {
        self.file = None;
    }
}
