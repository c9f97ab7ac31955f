//! Aggregate statistics over matched index entries

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::structured::Emitter;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Counts, byte totals and reference time extremes of a matched subset.
///
/// Built without materializing individual records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Number of matched records
    pub count: u64,
    /// Total raw bytes of matched records
    pub total_bytes: u64,
    /// Earliest reference time seen
    pub reftime_start: Option<NaiveDateTime>,
    /// Latest reference time seen
    pub reftime_end: Option<NaiveDateTime>,
}

impl Summary {
    /// An empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// True if nothing was aggregated
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Folds one record into the summary
    pub fn add(&mut self, size: u64, reftime: Option<NaiveDateTime>) {
        self.count += 1;
        self.total_bytes += size;
        if let Some(time) = reftime {
            self.reftime_start = Some(self.reftime_start.map_or(time, |cur| cur.min(time)));
            self.reftime_end = Some(self.reftime_end.map_or(time, |cur| cur.max(time)));
        }
    }

    /// Merges another summary into this one
    pub fn merge(&mut self, other: &Summary) {
        self.count += other.count;
        self.total_bytes += other.total_bytes;
        for time in [other.reftime_start, other.reftime_end].into_iter().flatten() {
            self.reftime_start = Some(self.reftime_start.map_or(time, |cur| cur.min(time)));
            self.reftime_end = Some(self.reftime_end.map_or(time, |cur| cur.max(time)));
        }
    }

    /// Serializes the summary to a structured sink
    pub fn emit(&self, emitter: &mut dyn Emitter) {
        emitter.start_mapping();
        emitter.add_key("count");
        emitter.add_int(self.count as i64);
        emitter.add_key("bytes");
        emitter.add_int(self.total_bytes as i64);
        emitter.add_key("reftime_start");
        match self.reftime_start {
            Some(time) => emitter.add_string(&time.format(TIME_FORMAT).to_string()),
            None => emitter.add_null(),
        }
        emitter.add_key("reftime_end");
        match self.reftime_end {
            Some(time) => emitter.add_string(&time.format(TIME_FORMAT).to_string()),
            None => emitter.add_null(),
        }
        emitter.end_mapping();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::JsonEmitter;
    use chrono::NaiveDate;

    fn time(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2007, 4, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_add_tracks_extremes() {
        let mut summary = Summary::new();
        summary.add(100, Some(time(10)));
        summary.add(50, Some(time(2)));
        summary.add(25, None);

        assert_eq!(summary.count, 3);
        assert_eq!(summary.total_bytes, 175);
        assert_eq!(summary.reftime_start, Some(time(2)));
        assert_eq!(summary.reftime_end, Some(time(10)));
    }

    #[test]
    fn test_merge() {
        let mut left = Summary::new();
        left.add(10, Some(time(5)));
        let mut right = Summary::new();
        right.add(20, Some(time(1)));
        right.add(30, Some(time(9)));

        left.merge(&right);
        assert_eq!(left.count, 3);
        assert_eq!(left.total_bytes, 60);
        assert_eq!(left.reftime_start, Some(time(1)));
        assert_eq!(left.reftime_end, Some(time(9)));
    }

    #[test]
    fn test_emit_json() {
        let mut summary = Summary::new();
        summary.add(42, Some(time(1)));

        let mut emitter = JsonEmitter::new();
        summary.emit(&mut emitter);
        let value = emitter.into_value().unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["bytes"], 42);
        assert_eq!(value["reftime_start"], "2007-04-01 00:00:00");
    }
}
