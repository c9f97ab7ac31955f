//! Origin sub-matcher
//!
//! Patterns: `GRIB1,centre,subcentre,process`, `GRIB2,centre,subcentre,
//! processtype,bgprocessid,processid`, `BUFR,centre,subcentre`. Every
//! position past the style may be left empty for "don't care".

use std::fmt;

use super::errors::{MatcherError, MatcherResult};
use super::utils::{CommaJoiner, OptionalCommaList};
use crate::types::{Attribute, Origin};

/// Matches origin attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOrigin {
    /// Match GRIB1-style origins
    Grib1 {
        /// Originating centre, None for any
        centre: Option<i64>,
        /// Originating subcentre, None for any
        subcentre: Option<i64>,
        /// Generating process, None for any
        process: Option<i64>,
    },
    /// Match GRIB2-style origins
    Grib2 {
        /// Originating centre, None for any
        centre: Option<i64>,
        /// Originating subcentre, None for any
        subcentre: Option<i64>,
        /// Type of generating process, None for any
        process_type: Option<i64>,
        /// Background process identifier, None for any
        background_id: Option<i64>,
        /// Generating process identifier, None for any
        process_id: Option<i64>,
    },
    /// Match BUFR-style origins
    Bufr {
        /// Originating centre, None for any
        centre: Option<i64>,
        /// Originating subcentre, None for any
        subcentre: Option<i64>,
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

impl MatchOrigin {
    /// Parse an origin pattern
    pub fn parse(pattern: &str) -> MatcherResult<MatchOrigin> {
        let args = OptionalCommaList::new(pattern);
        let style = args.get(0, "").to_uppercase();
        match style.as_str() {
            "GRIB1" => Ok(MatchOrigin::Grib1 {
                centre: opt(&args, 1)?,
                subcentre: opt(&args, 2)?,
                process: opt(&args, 3)?,
            }),
            "GRIB2" => Ok(MatchOrigin::Grib2 {
                centre: opt(&args, 1)?,
                subcentre: opt(&args, 2)?,
                process_type: opt(&args, 3)?,
                background_id: opt(&args, 4)?,
                process_id: opt(&args, 5)?,
            }),
            "BUFR" => Ok(MatchOrigin::Bufr {
                centre: opt(&args, 1)?,
                subcentre: opt(&args, 2)?,
            }),
            other => Err(MatcherError::parse(
                pattern,
                format!("unknown origin style {:?}", other),
            )),
        }
    }

    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        let origin = match attr {
            Attribute::Origin(origin) => origin,
            _ => return false,
        };
        match (self, origin) {
            (
                MatchOrigin::Grib1 {
                    centre,
                    subcentre,
                    process,
                },
                Origin::Grib1 {
                    centre: c,
                    subcentre: s,
                    process: p,
                },
            ) => {
                accepts(*centre, *c as i64)
                    && accepts(*subcentre, *s as i64)
                    && accepts(*process, *p as i64)
            }
            (
                MatchOrigin::Grib2 {
                    centre,
                    subcentre,
                    process_type,
                    background_id,
                    process_id,
                },
                Origin::Grib2 {
                    centre: c,
                    subcentre: s,
                    process_type: pt,
                    background_id: bg,
                    process_id: pid,
                },
            ) => {
                accepts(*centre, *c as i64)
                    && accepts(*subcentre, *s as i64)
                    && accepts(*process_type, *pt as i64)
                    && accepts(*background_id, *bg as i64)
                    && accepts(*process_id, *pid as i64)
            }
            (
                MatchOrigin::Bufr { centre, subcentre },
                Origin::Bufr {
                    centre: c,
                    subcentre: s,
                },
            ) => accepts(*centre, *c as i64) && accepts(*subcentre, *s as i64),
            _ => false,
        }
    }
}

fn join_opts(style: &str, fields: &[Option<i64>]) -> String {
    let mut joiner = CommaJoiner::new();
    joiner.add(style);
    for field in fields {
        match field {
            Some(v) => joiner.add(v),
            None => joiner.add_undef(),
        };
    }
    joiner.join()
}

impl fmt::Display for MatchOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchOrigin::Grib1 {
                centre,
                subcentre,
                process,
            } => join_opts("GRIB1", &[*centre, *subcentre, *process]),
            MatchOrigin::Grib2 {
                centre,
                subcentre,
                process_type,
                background_id,
                process_id,
            } => join_opts(
                "GRIB2",
                &[*centre, *subcentre, *process_type, *background_id, *process_id],
            ),
            MatchOrigin::Bufr { centre, subcentre } => join_opts("BUFR", &[*centre, *subcentre]),
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grib1(centre: u8, subcentre: u8, process: u8) -> Attribute {
        Attribute::Origin(Origin::Grib1 {
            centre,
            subcentre,
            process,
        })
    }

    #[test]
    fn test_exact_match() {
        let m = MatchOrigin::parse("GRIB1,98,0,12").unwrap();
        assert!(m.matches(&grib1(98, 0, 12)));
        assert!(!m.matches(&grib1(98, 0, 13)));
    }

    #[test]
    fn test_gap_positions_are_wildcards() {
        let m = MatchOrigin::parse("GRIB1,98,,12").unwrap();
        assert!(m.matches(&grib1(98, 0, 12)));
        assert!(m.matches(&grib1(98, 200, 12)));
        assert!(!m.matches(&grib1(97, 0, 12)));
    }

    #[test]
    fn test_style_mismatch() {
        let m = MatchOrigin::parse("GRIB2,98").unwrap();
        assert!(!m.matches(&grib1(98, 0, 12)));
    }

    #[test]
    fn test_display_roundtrip() {
        for pattern in ["GRIB1,98,,12", "GRIB2,200", "BUFR,98,0"] {
            let m = MatchOrigin::parse(pattern).unwrap();
            assert_eq!(m.to_string(), pattern);
            assert_eq!(MatchOrigin::parse(&m.to_string()).unwrap(), m);
        }
    }

    #[test]
    fn test_bad_style_rejected() {
        assert!(MatchOrigin::parse("NONSENSE,1").is_err());
    }
}
