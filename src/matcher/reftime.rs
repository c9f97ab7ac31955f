//! Reference time sub-matcher
//!
//! A comma-separated conjunction of bounds: `>=2007-04-01,<=2007-05-10`.
//! Partial timestamps complete towards the start of the period for lower
//! bounds and equality, and towards the end of the period for upper bounds,
//! so `reftime:=2007-04` matches the whole month.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use super::errors::{MatcherError, MatcherResult};
use crate::types::Attribute;

/// Comparison operator for one reftime bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundOp {
    /// Strictly before
    Less,
    /// At or before
    LessEqual,
    /// Exactly within the (possibly partial) timestamp
    Equal,
    /// At or after
    GreaterEqual,
    /// Strictly after
    Greater,
}

impl BoundOp {
    fn symbol(&self) -> &'static str {
        match self {
            BoundOp::Less => "<",
            BoundOp::LessEqual => "<=",
            BoundOp::Equal => "=",
            BoundOp::GreaterEqual => ">=",
            BoundOp::Greater => ">",
        }
    }
}

/// One parsed bound: operator plus the interval covered by the (possibly
/// partial) timestamp it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    /// The comparison operator
    pub op: BoundOp,
    /// Period start implied by the timestamp
    pub begin: NaiveDateTime,
    /// Period end (inclusive) implied by the timestamp
    pub end: NaiveDateTime,
    text: String,
}

impl Bound {
    fn accepts(&self, time: NaiveDateTime) -> bool {
        match self.op {
            BoundOp::Less => time < self.begin,
            BoundOp::LessEqual => time <= self.end,
            BoundOp::Equal => time >= self.begin && time <= self.end,
            BoundOp::GreaterEqual => time >= self.begin,
            BoundOp::Greater => time > self.end,
        }
    }
}

/// Matches reference time attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReftime {
    bounds: Vec<Bound>,
}

/// Parses `YYYY[-MM[-DD[ HH[:MM[:SS]]]]]` into the period it denotes.
fn parse_period(text: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let text = text.trim();
    let (date_part, time_part) = match text.split_once(|c| c == ' ' || c == 'T') {
        Some((d, t)) => (d, Some(t)),
        None => (text, None),
    };

    let mut date_fields = date_part.split('-');
    let year: i32 = date_fields.next()?.parse().ok()?;
    let month: Option<u32> = match date_fields.next() {
        Some(m) => Some(m.parse().ok()?),
        None => None,
    };
    let day: Option<u32> = match date_fields.next() {
        Some(d) => Some(d.parse().ok()?),
        None => None,
    };
    if date_fields.next().is_some() {
        return None;
    }

    let (hour, minute, second) = match time_part {
        Some(t) => {
            let mut time_fields = t.split(':');
            let hour: u32 = time_fields.next()?.parse().ok()?;
            let minute: Option<u32> = match time_fields.next() {
                Some(m) => Some(m.parse().ok()?),
                None => None,
            };
            let second: Option<u32> = match time_fields.next() {
                Some(s) => Some(s.parse().ok()?),
                None => None,
            };
            if time_fields.next().is_some() {
                return None;
            }
            (Some(hour), minute, second)
        }
        None => (None, None, None),
    };

    // Completion towards the start of the period
    let begin = NaiveDate::from_ymd_opt(year, month.unwrap_or(1), day.unwrap_or(1))?.and_hms_opt(
        hour.unwrap_or(0),
        minute.unwrap_or(0),
        second.unwrap_or(0),
    )?;

    // Completion towards the end of the period
    let end = match (month, day, hour, minute, second) {
        (None, ..) => NaiveDate::from_ymd_opt(year, 12, 31)?.and_hms_opt(23, 59, 59)?,
        (Some(m), None, ..) => {
            let next = if m == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(year, m + 1, 1)?
            };
            (next - chrono::Duration::days(1)).and_hms_opt(23, 59, 59)?
        }
        (Some(m), Some(d), None, ..) => NaiveDate::from_ymd_opt(year, m, d)?.and_hms_opt(23, 59, 59)?,
        (Some(m), Some(d), Some(h), None, _) => {
            NaiveDate::from_ymd_opt(year, m, d)?.and_hms_opt(h, 59, 59)?
        }
        (Some(m), Some(d), Some(h), Some(mi), None) => {
            NaiveDate::from_ymd_opt(year, m, d)?.and_hms_opt(h, mi, 59)?
        }
        (Some(m), Some(d), Some(h), Some(mi), Some(s)) => {
            NaiveDate::from_ymd_opt(year, m, d)?.and_hms_opt(h, mi, s)?
        }
    };

    Some((begin, end))
}

impl MatchReftime {
    /// Parse a reftime pattern
    pub fn parse(pattern: &str) -> MatcherResult<MatchReftime> {
        let mut bounds = Vec::new();
        for piece in pattern.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let (op, rest) = if let Some(rest) = piece.strip_prefix(">=") {
                (BoundOp::GreaterEqual, rest)
            } else if let Some(rest) = piece.strip_prefix("<=") {
                (BoundOp::LessEqual, rest)
            } else if let Some(rest) = piece.strip_prefix("==") {
                (BoundOp::Equal, rest)
            } else if let Some(rest) = piece.strip_prefix('>') {
                (BoundOp::Greater, rest)
            } else if let Some(rest) = piece.strip_prefix('<') {
                (BoundOp::Less, rest)
            } else if let Some(rest) = piece.strip_prefix('=') {
                (BoundOp::Equal, rest)
            } else {
                return Err(MatcherError::parse(
                    piece,
                    "expected one of <, <=, =, >=, > before the timestamp",
                ));
            };
            let (begin, end) = parse_period(rest).ok_or_else(|| {
                MatcherError::parse(piece, "cannot parse timestamp")
            })?;
            bounds.push(Bound {
                op,
                begin,
                end,
                text: rest.trim().to_string(),
            });
        }
        if bounds.is_empty() {
            return Err(MatcherError::parse(pattern, "no bounds in reftime clause"));
        }
        Ok(MatchReftime { bounds })
    }

    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        let time = match attr {
            Attribute::Reftime(time) => *time,
            _ => return false,
        };
        self.bounds.iter().all(|b| b.accepts(time))
    }

    /// The interval implied by the bounds, for index pruning.
    ///
    /// Returns (lower inclusive, upper inclusive); None means unbounded on
    /// that side.
    pub fn date_extremes(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        let mut lower: Option<NaiveDateTime> = None;
        let mut upper: Option<NaiveDateTime> = None;
        for bound in &self.bounds {
            match bound.op {
                BoundOp::GreaterEqual | BoundOp::Greater => {
                    let candidate = bound.begin;
                    lower = Some(lower.map_or(candidate, |cur| cur.max(candidate)));
                }
                BoundOp::LessEqual | BoundOp::Less => {
                    let candidate = bound.end;
                    upper = Some(upper.map_or(candidate, |cur| cur.min(candidate)));
                }
                BoundOp::Equal => {
                    lower = Some(lower.map_or(bound.begin, |cur| cur.max(bound.begin)));
                    upper = Some(upper.map_or(bound.end, |cur| cur.min(bound.end)));
                }
            }
        }
        (lower, upper)
    }
}

impl fmt::Display for MatchReftime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .bounds
            .iter()
            .map(|b| format!("{}{}", b.op.symbol(), b.text))
            .collect();
        write!(f, "{}", rendered.join(","))
    }
}
