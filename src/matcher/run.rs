//! Run sub-matcher
//!
//! Pattern: `MINUTE,HH[:MM]` for an exact run minute; `MINUTE` alone
//! accepts any run.

use std::fmt;

use super::errors::{MatcherError, MatcherResult};
use crate::types::Attribute;

/// Matches model run attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRun {
    /// Exact run as minutes from midnight; None accepts any run
    pub minute: Option<u32>,
}

impl MatchRun {
    /// Parse a run pattern
    pub fn parse(pattern: &str) -> MatcherResult<MatchRun> {
        let mut pieces = pattern.splitn(2, ',');
        let style = pieces.next().unwrap_or("").trim().to_uppercase();
        if style != "MINUTE" {
            return Err(MatcherError::parse(
                pattern,
                format!("unknown run style {:?}", style),
            ));
        }
        let minute = match pieces.next().map(str::trim).filter(|s| !s.is_empty()) {
            Some(time_text) => {
                let (hour_text, minute_text) = match time_text.split_once(':') {
                    Some((h, m)) => (h, m),
                    None => (time_text, "0"),
                };
                let hour: u32 = hour_text
                    .trim()
                    .parse()
                    .map_err(|_| MatcherError::parse(pattern, "cannot parse run hour"))?;
                let min: u32 = minute_text
                    .trim()
                    .parse()
                    .map_err(|_| MatcherError::parse(pattern, "cannot parse run minute"))?;
                if hour > 23 || min > 59 {
                    return Err(MatcherError::parse(pattern, "run time out of range"));
                }
                Some(hour * 60 + min)
            }
            None => None,
        };
        Ok(MatchRun { minute })
    }

    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        match attr {
            Attribute::Run { minute } => self.minute.map(|m| m == *minute).unwrap_or(true),
            _ => false,
        }
    }
}

impl fmt::Display for MatchRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minute {
            Some(minute) => write!(f, "MINUTE,{:02}:{:02}", minute / 60, minute % 60),
            None => write!(f, "MINUTE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_minute() {
        let m = MatchRun::parse("MINUTE,12").unwrap();
        assert!(m.matches(&Attribute::Run { minute: 720 }));
        assert!(!m.matches(&Attribute::Run { minute: 721 }));
    }

    #[test]
    fn test_hour_and_minute() {
        let m = MatchRun::parse("MINUTE,12:30").unwrap();
        assert!(m.matches(&Attribute::Run { minute: 750 }));
    }

    #[test]
    fn test_wildcard_when_unset() {
        let m = MatchRun::parse("MINUTE").unwrap();
        assert!(m.matches(&Attribute::Run { minute: 0 }));
        assert!(m.matches(&Attribute::Run { minute: 1439 }));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(MatchRun::parse("MINUTE,25").is_err());
        assert!(MatchRun::parse("MINUTE,12:75").is_err());
    }
}
