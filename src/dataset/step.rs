//! Segment layout steps
//!
//! The `step` setting decides how records are spread over segment files
//! by their reference time. Finer steps keep segments small at the cost
//! of more files.

use std::path::PathBuf;

use chrono::{Datelike, NaiveDateTime};

use super::errors::{DatasetError, DatasetResult};

/// Time granularity of segment files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    /// Everything in one segment
    Single,
    /// One segment per year, under a century directory: `CC/YYYY.<format>`
    Yearly,
    /// One segment per month: `YYYY/MM.<format>`
    #[default]
    Monthly,
    /// Two segments per month, days 1-14 and 15 onward:
    /// `YYYY/MM-H.<format>`
    Biweekly,
    /// One segment per seven-day slice of the month: `YYYY/MM-W.<format>`
    Weekly,
    /// One segment per day: `YYYY/MM-DD.<format>`
    Daily,
}

impl Step {
    /// Parses the `step` configuration value
    pub fn from_config(value: &str) -> DatasetResult<Step> {
        match value {
            "single" => Ok(Step::Single),
            "yearly" => Ok(Step::Yearly),
            "monthly" => Ok(Step::Monthly),
            "biweekly" => Ok(Step::Biweekly),
            "weekly" => Ok(Step::Weekly),
            "daily" => Ok(Step::Daily),
            other => Err(DatasetError::Config(format!(
                "unknown step {:?}; valid values are single, yearly, monthly, \
                 biweekly, weekly and daily",
                other
            ))),
        }
    }

    /// The configuration name of this step
    pub fn name(&self) -> &'static str {
        match self {
            Step::Single => "single",
            Step::Yearly => "yearly",
            Step::Monthly => "monthly",
            Step::Biweekly => "biweekly",
            Step::Weekly => "weekly",
            Step::Daily => "daily",
        }
    }

    /// The segment path, relative to the dataset root, for a record with
    /// the given reference time
    pub fn relpath(&self, reftime: NaiveDateTime, format: &str) -> PathBuf {
        let date = reftime.date();
        match self {
            Step::Single => PathBuf::from(format!("all.{}", format)),
            Step::Yearly => PathBuf::from(format!(
                "{:02}/{:04}.{}",
                date.year() / 100,
                date.year(),
                format
            )),
            Step::Monthly => {
                PathBuf::from(format!("{:04}/{:02}.{}", date.year(), date.month(), format))
            }
            Step::Biweekly => PathBuf::from(format!(
                "{:04}/{:02}-{}.{}",
                date.year(),
                date.month(),
                if date.day() > 15 { 2 } else { 1 },
                format
            )),
            Step::Weekly => PathBuf::from(format!(
                "{:04}/{:02}-{}.{}",
                date.year(),
                date.month(),
                (date.day() - 1) / 7 + 1,
                format
            )),
            Step::Daily => PathBuf::from(format!(
                "{:04}/{:02}-{:02}.{}",
                date.year(),
                date.month(),
                date.day(),
                format
            )),
        }
    }
}
