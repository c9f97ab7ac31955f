//! End-to-end dataset lifecycle tests
//!
//! Everything here goes through the public surface: configuration text
//! parsed into a pool, records ingested through a writer, queried back
//! through a reader, and maintenance run through a checker. Records use a
//! toy fixed-width format so the rebuild path can rescan segments.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use tempfile::TempDir;

use metarc::config::ConfigFile;
use metarc::dataset::{AcquireOutcome, DatasetPool, SegmentState};
use metarc::matcher::{Matcher, Parser};
use metarc::metadata::Metadata;
use metarc::scan::{ScanError, ScanResult, Scanner};
use metarc::segment::SegmentReader;
use metarc::types::{Attribute, Origin};

// Toy format: every record is exactly 8 bytes, byte 0 is the day of
// April 2007 and byte 1 the generating process.
const RECORD_SIZE: u64 = 8;

fn record(day: u8, process: u8) -> Vec<u8> {
    let mut data = vec![0u8; RECORD_SIZE as usize];
    data[0] = day;
    data[1] = process;
    data
}

fn decode(data: &[u8]) -> ScanResult<Metadata> {
    if data.len() != RECORD_SIZE as usize || data[0] == 0 {
        return Err(ScanError::Malformed {
            format: "grib".to_string(),
            message: format!("expected an 8 byte record, got {} bytes", data.len()),
        });
    }
    let mut md = Metadata::new();
    md.set(Attribute::Origin(Origin::Grib1 {
        centre: 200,
        subcentre: 0,
        process: data[1],
    }));
    md.set(Attribute::Reftime(
        NaiveDate::from_ymd_opt(2007, 4, data[0] as u32)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    ));
    Ok(md)
}

struct ToyScanner;

impl Scanner for ToyScanner {
    fn format(&self) -> &str {
        "grib"
    }

    fn scan_data(&self, data: &[u8]) -> ScanResult<Metadata> {
        decode(data)
    }

    fn scan_segment(
        &self,
        reader: &mut SegmentReader,
        sink: &mut dyn FnMut(Metadata, u64, u64) -> bool,
    ) -> ScanResult<bool> {
        let mut offset = 0;
        while offset + RECORD_SIZE <= reader.len() {
            let data = reader.read_at(offset, RECORD_SIZE)?;
            let md = decode(&data)?;
            if !sink(md, offset, RECORD_SIZE) {
                return Ok(false);
            }
            offset += RECORD_SIZE;
        }
        Ok(true)
    }
}

fn pool(root: &Path, extra: &str) -> DatasetPool {
    let text = format!(
        "[cosmo]\n\
         path = {}\n\
         format = grib\n\
         step = daily\n\
         unique = origin\n\
         index = origin\n\
         {}\n",
        root.join("cosmo").display(),
        extra
    );
    let config = ConfigFile::parse(&text, "datasets.conf").unwrap();
    DatasetPool::from_config(&config).unwrap()
}

fn match_all() -> Matcher {
    Parser::new().parse("").unwrap()
}

fn collect(pool: &DatasetPool, matcher: &Matcher) -> Vec<Vec<u8>> {
    let reader = pool.reader("cosmo").unwrap();
    let mut seen = Vec::new();
    reader
        .query_data(matcher, &mut |_, data| {
            seen.push(data);
            true
        })
        .unwrap();
    seen
}

#[test]
fn test_acquire_then_query_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let mut pool = pool(temp_dir.path(), "");

    {
        let writer = pool.writer("cosmo").unwrap();
        // Out of ingest order on purpose
        for (day, process) in [(3, 1), (1, 1), (2, 1)] {
            let mut md = decode(&record(day, process)).unwrap();
            assert_eq!(
                writer.acquire(&mut md, &record(day, process)).unwrap(),
                AcquireOutcome::Acquired
            );
        }
    }
    pool.close_writers();

    // Query order follows reference time, not ingest order
    let seen = collect(&pool, &match_all());
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0][0], 1);
    assert_eq!(seen[1][0], 2);
    assert_eq!(seen[2][0], 3);

    let bounded = Parser::new().parse("reftime:>=2007-04-02").unwrap();
    assert_eq!(collect(&pool, &bounded).len(), 2);

    let summary = pool
        .reader("cosmo")
        .unwrap()
        .query_summary(&match_all())
        .unwrap();
    assert_eq!(summary.count, 3);
    assert_eq!(summary.total_bytes, 3 * RECORD_SIZE);
}

#[test]
fn test_reject_policy_keeps_the_first_record() {
    let temp_dir = TempDir::new().unwrap();
    let mut pool = pool(temp_dir.path(), "");

    let writer = pool.writer("cosmo").unwrap();
    let mut first = decode(&record(1, 7)).unwrap();
    let mut again = decode(&record(1, 7)).unwrap();
    assert_eq!(
        writer.acquire(&mut first, &record(1, 7)).unwrap(),
        AcquireOutcome::Acquired
    );
    assert_eq!(
        writer.acquire(&mut again, &record(1, 9)).unwrap(),
        AcquireOutcome::Duplicate
    );
    pool.close_writers();

    let seen = collect(&pool, &match_all());
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0][1], 7);
}

#[test]
fn test_replace_policy_keeps_the_second_record() {
    let temp_dir = TempDir::new().unwrap();
    let mut pool = pool(temp_dir.path(), "on duplicate = replace");

    let writer = pool.writer("cosmo").unwrap();
    // Same origin and reference time, different payload padding
    let mut first = decode(&record(1, 7)).unwrap();
    let mut second = decode(&record(1, 7)).unwrap();
    let mut replacement = record(1, 7);
    replacement[2] = 0xff;
    writer.acquire(&mut first, &record(1, 7)).unwrap();
    assert_eq!(
        writer.acquire(&mut second, &replacement).unwrap(),
        AcquireOutcome::Acquired
    );
    pool.close_writers();

    let seen = collect(&pool, &match_all());
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], replacement);
}

#[test]
fn test_repack_reclaims_replaced_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let mut pool = pool(temp_dir.path(), "on duplicate = replace");

    {
        let writer = pool.writer("cosmo").unwrap();
        let mut md = decode(&record(1, 7)).unwrap();
        writer.acquire(&mut md, &record(1, 7)).unwrap();
        let mut md = decode(&record(1, 7)).unwrap();
        writer.acquire(&mut md, &record(1, 7)).unwrap();
    }
    pool.close_writers();

    let checker = pool.checker("cosmo").unwrap();
    let report = checker.check().unwrap();
    assert_eq!(report.segments.len(), 1);
    assert_eq!(
        report.segments[0].1,
        SegmentState::Dirty {
            unaccounted: RECORD_SIZE
        }
    );

    let repacked = checker.repack().unwrap();
    assert_eq!(repacked.bytes_reclaimed(), RECORD_SIZE);
    assert!(checker.check().unwrap().is_clean());

    // The surviving record is still queryable after the rewrite
    assert_eq!(collect(&pool, &match_all()).len(), 1);
}

#[test]
fn test_check_reports_truncated_segment() {
    let temp_dir = TempDir::new().unwrap();
    let mut pool = pool(temp_dir.path(), "");

    {
        let writer = pool.writer("cosmo").unwrap();
        let mut md = decode(&record(1, 1)).unwrap();
        writer.acquire(&mut md, &record(1, 1)).unwrap();
    }
    pool.close_writers();

    let segment = temp_dir.path().join("cosmo/2007/04-01.grib");
    let file = OpenOptions::new().write(true).open(&segment).unwrap();
    file.set_len(RECORD_SIZE / 2).unwrap();
    drop(file);

    let report = pool.checker("cosmo").unwrap().check().unwrap();
    assert_eq!(
        report.segments[0].1,
        SegmentState::Truncated {
            len: RECORD_SIZE / 2
        }
    );
}

#[test]
fn test_fix_rebuilds_a_damaged_index() {
    let temp_dir = TempDir::new().unwrap();
    let mut pool = pool(temp_dir.path(), "");

    {
        let writer = pool.writer("cosmo").unwrap();
        for process in [1, 2, 3] {
            let mut md = decode(&record(1, process)).unwrap();
            writer.acquire(&mut md, &record(1, process)).unwrap();
        }
    }
    pool.close_writers();

    // Clobber the index tail with garbage
    let index_path = temp_dir.path().join("cosmo/2007/04-01.grib.index");
    let mut file = OpenOptions::new().append(true).open(&index_path).unwrap();
    file.write_all(&[0xde, 0xad]).unwrap();
    drop(file);

    let checker = pool.checker("cosmo").unwrap();
    let report = checker.check().unwrap();
    assert!(matches!(
        report.segments[0].1,
        SegmentState::IndexDamaged { .. }
    ));

    let fixed = checker.fix(&ToyScanner).unwrap();
    assert_eq!(fixed.segments.len(), 1);
    assert_eq!(fixed.segments[0].records, 3);
    assert_eq!(fixed.segments[0].index_bytes_discarded, 2);
    assert_eq!(fixed.segments[0].segment_bytes_discarded, 0);

    assert!(pool.checker("cosmo").unwrap().check().unwrap().is_clean());
    let seen = collect(&pool, &match_all());
    assert_eq!(seen.len(), 3);
    let processes: Vec<u8> = seen.iter().map(|data| data[1]).collect();
    assert_eq!(processes, vec![1, 2, 3]);
}

#[test]
fn test_fix_discards_a_torn_segment_tail() {
    let temp_dir = TempDir::new().unwrap();
    let mut pool = pool(temp_dir.path(), "");

    {
        let writer = pool.writer("cosmo").unwrap();
        for process in [1, 2] {
            let mut md = decode(&record(2, process)).unwrap();
            writer.acquire(&mut md, &record(2, process)).unwrap();
        }
    }
    pool.close_writers();

    // A torn append: bytes in the segment no index entry covers, too
    // short to be a record
    let segment = temp_dir.path().join("cosmo/2007/04-02.grib");
    let mut file = OpenOptions::new().append(true).open(&segment).unwrap();
    file.write_all(&[0x47, 0x52, 0x49]).unwrap();
    drop(file);

    let checker = pool.checker("cosmo").unwrap();
    let fixed = checker.fix(&ToyScanner).unwrap();
    assert_eq!(fixed.segments[0].records, 2);
    assert_eq!(fixed.segments[0].segment_bytes_discarded, 3);
    assert_eq!(fs::metadata(&segment).unwrap().len(), 2 * RECORD_SIZE);
    assert_eq!(collect(&pool, &match_all()).len(), 2);
}
