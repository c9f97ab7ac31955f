//! Dataset orchestration
//!
//! A dataset is a directory of segment files plus their per-segment
//! indexes, described by one configuration section. Three roles operate
//! on it:
//!
//! - [`DatasetWriter`] ingests records through the transactional acquire
//!   path
//! - [`DatasetReader`] answers matcher queries with metadata and raw
//!   bytes
//! - [`DatasetChecker`] runs maintenance: check, repack, fix
//!
//! [`DatasetPool`] opens them on demand from a parsed configuration.

mod checker;
mod errors;
mod pool;
mod reader;
mod step;
mod writer;

pub use checker::{CheckReport, DatasetChecker, FixReport, RepackReport, SegmentState};
pub use errors::{DatasetError, DatasetResult};
pub use pool::DatasetPool;
pub use reader::DatasetReader;
pub use step::Step;
pub use writer::{AcquireTransaction, DatasetWriter};

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::ConfigFile;
use crate::index::DuplicatePolicy;
use crate::types::Code;

/// Outcome of one acquire call.
///
/// Policy outcomes are values, not errors; only I/O and corruption
/// surface as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The record was stored and indexed
    Acquired,
    /// An entry with the same unique key exists and the policy is reject
    Duplicate,
    /// The record was refused by a dataset policy (e.g. older than
    /// `delete age`)
    Filtered,
}

/// Configuration of one dataset, parsed from its section
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Section name
    pub name: String,
    /// Dataset root directory
    pub path: PathBuf,
    /// Data format of ingested records
    pub format: String,
    /// Segment layout granularity
    pub step: Step,
    /// Attribute types forming the unique key; reference time is always
    /// part of it
    pub unique: BTreeSet<Code>,
    /// Attribute types declared queryable
    pub index: BTreeSet<Code>,
    /// Conflict policy for unique-key collisions
    pub on_duplicate: DuplicatePolicy,
    /// Refuse records older than this many days, if set
    pub delete_age: Option<i64>,
    /// Skip fsync barriers; only safe for disposable datasets
    pub eatmydata: bool,
}

impl DatasetConfig {
    /// Builds a dataset configuration from one configuration section.
    ///
    /// Recognized keys: `path`, `format`, `step`, `unique`, `index`,
    /// `on duplicate`, `delete age`, `eatmydata`.
    pub fn from_section(name: &str, section: &ConfigFile) -> DatasetResult<Self> {
        let path = section
            .value("path")
            .ok_or_else(|| DatasetError::Config(format!("dataset {}: missing path", name)))?;
        let format = section.value("format").unwrap_or("grib").to_string();
        let step = match section.value("step") {
            Some(value) => Step::from_config(value)?,
            None => Step::default(),
        };

        let mut unique = parse_code_list(name, "unique", section.value("unique"))?;
        unique.insert(Code::Reftime);
        let index = parse_code_list(name, "index", section.value("index"))?;

        let on_duplicate = match section.value("on duplicate") {
            Some(value) => DuplicatePolicy::from_config(value).ok_or_else(|| {
                DatasetError::Config(format!(
                    "dataset {}: unknown on duplicate policy {:?}",
                    name, value
                ))
            })?,
            None => DuplicatePolicy::default(),
        };

        let delete_age = match section.value("delete age") {
            Some(value) => Some(value.parse::<i64>().map_err(|_| {
                DatasetError::Config(format!(
                    "dataset {}: delete age must be a number of days, got {:?}",
                    name, value
                ))
            })?),
            None => None,
        };

        let eatmydata = matches!(section.value("eatmydata"), Some("yes") | Some("true") | Some("1"));

        Ok(Self {
            name: name.to_string(),
            path: PathBuf::from(path),
            format,
            step,
            unique,
            index,
            on_duplicate,
            delete_age,
            eatmydata,
        })
    }

    pub(crate) fn index_config(&self) -> crate::index::IndexConfig {
        crate::index::IndexConfig {
            unique: self.unique.clone(),
            index: self.index.clone(),
            on_duplicate: self.on_duplicate,
            eatmydata: self.eatmydata,
        }
    }
}

fn parse_code_list(
    dataset: &str,
    key: &str,
    value: Option<&str>,
) -> DatasetResult<BTreeSet<Code>> {
    let mut codes = BTreeSet::new();
    if let Some(value) = value {
        for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let code = Code::from_name(&name.to_lowercase()).ok_or_else(|| {
                DatasetError::Config(format!(
                    "dataset {}: unknown attribute type {:?} in {}",
                    dataset, name, key
                ))
            })?;
            codes.insert(code);
        }
    }
    Ok(codes)
}
