//! Level sub-matcher
//!
//! Patterns: `GRIB1,type,l1,l2`, `GRIB2S,type,scale,value`.

use std::fmt;

use super::errors::{MatcherError, MatcherResult};
use super::utils::{CommaJoiner, OptionalCommaList};
use crate::types::{Attribute, Level};

/// Matches level attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchLevel {
    /// Match GRIB1-style levels
    Grib1 {
        /// Level type, None for any
        level_type: Option<i64>,
        /// First level value, None for any
        l1: Option<i64>,
        /// Second level value, None for any
        l2: Option<i64>,
    },
    /// Match GRIB2 single levels
    Grib2Single {
        /// Level type, None for any
        level_type: Option<i64>,
        /// Decimal scale factor, None for any
        scale: Option<i64>,
        /// Scaled level value, None for any
        value: Option<i64>,
    },
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

impl MatchLevel {
    /// Parse a level pattern
    pub fn parse(pattern: &str) -> MatcherResult<MatchLevel> {
        let args = OptionalCommaList::new(pattern);
        let style = args.get(0, "").to_uppercase();
        match style.as_str() {
            "GRIB1" => Ok(MatchLevel::Grib1 {
                level_type: opt(&args, 1)?,
                l1: opt(&args, 2)?,
                l2: opt(&args, 3)?,
            }),
            "GRIB2S" => Ok(MatchLevel::Grib2Single {
                level_type: opt(&args, 1)?,
                scale: opt(&args, 2)?,
                value: opt(&args, 3)?,
            }),
            other => Err(MatcherError::parse(
                pattern,
                format!("unknown level style {:?}", other),
            )),
        }
    }

    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        let level = match attr {
            Attribute::Level(level) => level,
            _ => return false,
        };
        match (self, level) {
            (
                MatchLevel::Grib1 { level_type, l1, l2 },
                Level::Grib1 {
                    level_type: lt,
                    l1: v1,
                    l2: v2,
                },
            ) => {
                accepts(*level_type, *lt as i64)
                    && accepts(*l1, *v1 as i64)
                    && accepts(*l2, *v2 as i64)
            }
            (
                MatchLevel::Grib2Single {
                    level_type,
                    scale,
                    value,
                },
                Level::Grib2Single {
                    level_type: lt,
                    scale: s,
                    value: v,
                },
            ) => {
                accepts(*level_type, *lt as i64)
                    && accepts(*scale, *s as i64)
                    && accepts(*value, *v as i64)
            }
            _ => false,
        }
    }
}

impl fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut joiner = CommaJoiner::new();
        let fields = match self {
            MatchLevel::Grib1 { level_type, l1, l2 } => {
                joiner.add("GRIB1");
                [*level_type, *l1, *l2]
            }
            MatchLevel::Grib2Single {
                level_type,
                scale,
                value,
            } => {
                joiner.add("GRIB2S");
                [*level_type, *scale, *value]
            }
        };
        for field in fields {
            match field {
                Some(v) => joiner.add(v),
                None => joiner.add_undef(),
            };
        }
        write!(f, "{}", joiner.join())
    }
}
