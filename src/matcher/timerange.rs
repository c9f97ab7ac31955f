//! Timerange sub-matcher
//!
//! Patterns: `GRIB1,type,unit,p1,p2`, `GRIB2,type,unit,p1,p2`.

use std::fmt;

use super::errors::{MatcherError, MatcherResult};
use super::utils::{CommaJoiner, OptionalCommaList};
use crate::types::{Attribute, Timerange};

/// Matches timerange attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTimerange {
    /// Which GRIB edition the attribute must carry (1 or 2)
    pub edition: u8,
    /// Time range indicator, None for any
    pub range_type: Option<i64>,
    /// Time unit, None for any
    pub unit: Option<i64>,
    /// First period, None for any
    pub p1: Option<i64>,
    /// Second period, None for any
    pub p2: Option<i64>,
}

fn opt(args: &OptionalCommaList, pos: usize) -> MatcherResult<Option<i64>> {
    if args.has(pos) {
        Ok(Some(args.get_int(pos, 0)?))
    } else {
        Ok(None)
    }
}

fn accepts(want: Option<i64>, have: i64) -> bool {
    want.map(|w| w == have).unwrap_or(true)
}

impl MatchTimerange {
    /// Parse a timerange pattern
    pub fn parse(pattern: &str) -> MatcherResult<MatchTimerange> {
        let args = OptionalCommaList::new(pattern);
        let style = args.get(0, "").to_uppercase();
        let edition = match style.as_str() {
            "GRIB1" => 1,
            "GRIB2" => 2,
            other => {
                return Err(MatcherError::parse(
                    pattern,
                    format!("unknown timerange style {:?}", other),
                ))
            }
        };
        Ok(MatchTimerange {
            edition,
            range_type: opt(&args, 1)?,
            unit: opt(&args, 2)?,
            p1: opt(&args, 3)?,
            p2: opt(&args, 4)?,
        })
    }

    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        let (edition, range_type, unit, p1, p2) = match attr {
            Attribute::Timerange(Timerange::Grib1 {
                range_type,
                unit,
                p1,
                p2,
            }) => (1u8, *range_type, *unit, *p1, *p2),
            Attribute::Timerange(Timerange::Grib2 {
                range_type,
                unit,
                p1,
                p2,
            }) => (2u8, *range_type, *unit, *p1, *p2),
            _ => return false,
        };
        edition == self.edition
            && accepts(self.range_type, range_type as i64)
            && accepts(self.unit, unit as i64)
            && accepts(self.p1, p1 as i64)
            && accepts(self.p2, p2 as i64)
    }
}

impl fmt::Display for MatchTimerange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut joiner = CommaJoiner::new();
        joiner.add(if self.edition == 1 { "GRIB1" } else { "GRIB2" });
        for field in [self.range_type, self.unit, self.p1, self.p2] {
            match field {
                Some(v) => joiner.add(v),
                None => joiner.add_undef(),
            };
        }
        write!(f, "{}", joiner.join())
    }
}
