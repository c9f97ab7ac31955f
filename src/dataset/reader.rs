//! Matcher queries over a dataset
//!
//! A reader enumerates the dataset's segments, queries each per-segment
//! index, and streams matching records through a sink. Each query opens
//! its own index and segment handles, so readers can run concurrently
//! with a writer: entries committed after the query opened an index are
//! simply not part of its snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use crate::index::{Index, Summary};
use crate::matcher::Matcher;
use crate::metadata::{Metadata, Source};
use crate::segment::{Segment, SegmentReader};

use super::errors::{DatasetError, DatasetResult};
use super::DatasetConfig;

const INDEX_SUFFIX: &str = ".index";

/// Query handle for one dataset.
pub struct DatasetReader {
    config: DatasetConfig,
}

impl DatasetReader {
    /// Opens the dataset for querying
    pub fn open(config: DatasetConfig) -> Self {
        Self { config }
    }

    /// The dataset configuration
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// The dataset's segments, in path order for deterministic results
    pub fn segments(&self) -> DatasetResult<Vec<Segment>> {
        let mut relpaths = Vec::new();
        if self.config.path.exists() {
            collect_segments(&self.config.path, &self.config.path, &mut relpaths)?;
        }
        relpaths.sort();
        Ok(relpaths
            .into_iter()
            .map(|relpath| {
                Segment::new(
                    self.config.format.clone(),
                    self.config.path.clone(),
                    relpath,
                )
            })
            .collect())
    }

    /// Streams matching records to the sink as (metadata, raw bytes).
    ///
    /// The metadata's source is set to the record's blob position. The
    /// sink returning false stops the query promptly; the return value
    /// says whether the query ran to completion.
    pub fn query_data(
        &self,
        matcher: &Matcher,
        sink: &mut dyn FnMut(Metadata, Vec<u8>) -> bool,
    ) -> DatasetResult<bool> {
        for segment in self.segments()? {
            let index = Index::open(segment.index_abspath(), self.config.index_config())?;
            let hits = index.query(matcher)?;
            if hits.is_empty() {
                continue;
            }
            let mut reader = SegmentReader::open(&segment)?;
            for hit in hits {
                let data = reader.read_at(hit.offset, hit.size)?;
                let mut md = hit.metadata;
                md.set_source(Source::blob(
                    self.config.format.clone(),
                    self.config.path.clone(),
                    segment.relpath.clone(),
                    hit.offset,
                    hit.size,
                ));
                if !sink(md, data) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Aggregates the matched subset across all segments
    pub fn query_summary(&self, matcher: &Matcher) -> DatasetResult<Summary> {
        let mut total = Summary::new();
        for segment in self.segments()? {
            let index = Index::open(segment.index_abspath(), self.config.index_config())?;
            total.merge(&index.summary(matcher)?);
        }
        Ok(total)
    }
}

fn collect_segments(
    root: &Path,
    dir: &Path,
    relpaths: &mut Vec<PathBuf>,
) -> DatasetResult<()> {
    for entry in fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))? {
        let entry = entry.map_err(|e| DatasetError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| DatasetError::io(&path, e))?;
        if file_type.is_dir() {
            collect_segments(root, &path, relpaths)?;
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.ends_with(INDEX_SUFFIX) {
            continue;
        }
        if let Ok(relpath) = path.strip_prefix(root) {
            relpaths.push(relpath.to_path_buf());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DatasetWriter, Step};
    use crate::index::DuplicatePolicy;
    use crate::matcher::Parser;
    use crate::types::{Attribute, Code, Origin};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn config(root: &Path) -> DatasetConfig {
        DatasetConfig {
            name: "test".to_string(),
            path: root.join("ds"),
            format: "grib".to_string(),
            step: Step::Monthly,
            unique: [Code::Origin, Code::Reftime].into_iter().collect(),
            index: BTreeSet::new(),
            on_duplicate: DuplicatePolicy::Reject,
            delete_age: None,
            eatmydata: false,
        }
    }

    fn md(month: u32, day: u32, process: u8) -> Metadata {
        let mut md = Metadata::new();
        md.set(Attribute::Origin(Origin::Grib1 {
            centre: 200,
            subcentre: 0,
            process,
        }));
        md.set(Attribute::Reftime(
            NaiveDate::from_ymd_opt(2007, month, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        ));
        md
    }

    fn populated(root: &Path) -> DatasetConfig {
        let config = config(root);
        let mut writer = DatasetWriter::open(config.clone()).unwrap();
        writer.acquire(&mut md(4, 1, 1), b"april-one").unwrap();
        writer.acquire(&mut md(4, 2, 2), b"april-two").unwrap();
        writer.acquire(&mut md(5, 1, 1), b"may-one").unwrap();
        config
    }

    #[test]
    fn test_query_data_streams_in_reftime_order() {
        let temp_dir = TempDir::new().unwrap();
        let reader = DatasetReader::open(populated(temp_dir.path()));

        let mut seen = Vec::new();
        let completed = reader
            .query_data(&Parser::new().parse("").unwrap(), &mut |md, data| {
                seen.push((md.reftime().unwrap(), data));
                true
            })
            .unwrap();
        assert!(completed);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].1, b"april-one");
        assert_eq!(seen[1].1, b"april-two");
        assert_eq!(seen[2].1, b"may-one");
    }

    #[test]
    fn test_query_data_applies_matcher() {
        let temp_dir = TempDir::new().unwrap();
        let reader = DatasetReader::open(populated(temp_dir.path()));

        let matcher = Parser::new().parse("origin:GRIB1,200,0,2").unwrap();
        let mut seen = Vec::new();
        reader
            .query_data(&matcher, &mut |_, data| {
                seen.push(data);
                true
            })
            .unwrap();
        assert_eq!(seen, vec![b"april-two".to_vec()]);
    }

    #[test]
    fn test_sink_stops_iteration_early() {
        let temp_dir = TempDir::new().unwrap();
        let reader = DatasetReader::open(populated(temp_dir.path()));

        let mut count = 0;
        let completed = reader
            .query_data(&Parser::new().parse("").unwrap(), &mut |_, _| {
                count += 1;
                false
            })
            .unwrap();
        assert!(!completed);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_query_sets_blob_source() {
        let temp_dir = TempDir::new().unwrap();
        let reader = DatasetReader::open(populated(temp_dir.path()));

        let matcher = Parser::new().parse("reftime:=2007-05-01").unwrap();
        let mut sources = Vec::new();
        reader
            .query_data(&matcher, &mut |md, _| {
                sources.push(md.source().cloned());
                true
            })
            .unwrap();
        assert_eq!(sources.len(), 1);
        match sources[0].as_ref().unwrap() {
            Source::Blob {
                filename, offset, ..
            } => {
                assert_eq!(filename, &PathBuf::from("2007/05.grib"));
                assert_eq!(*offset, 0);
            }
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn test_query_summary_spans_segments() {
        let temp_dir = TempDir::new().unwrap();
        let reader = DatasetReader::open(populated(temp_dir.path()));

        let summary = reader
            .query_summary(&Parser::new().parse("").unwrap())
            .unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.total_bytes, 9 + 9 + 7);
        assert_eq!(summary.reftime_start, md(4, 1, 1).reftime());
        assert_eq!(summary.reftime_end, md(5, 1, 1).reftime());
    }

    #[test]
    fn test_empty_dataset_queries_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let reader = DatasetReader::open(config(temp_dir.path()));
        let summary = reader
            .query_summary(&Parser::new().parse("").unwrap())
            .unwrap();
        assert!(summary.is_empty());
    }
}
