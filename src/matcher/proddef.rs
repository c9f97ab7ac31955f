//! Proddef sub-matcher
//!
//! `GRIB:key=value,...` — every listed key must be present in the product
//! definition value bag with an equal value.

use std::fmt;

use super::errors::{MatcherError, MatcherResult};
use crate::types::{Attribute, ValueBag};

/// Matches product definition attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchProddef {
    wanted: ValueBag,
}

impl MatchProddef {
    /// Parse a proddef pattern
    pub fn parse(pattern: &str) -> MatcherResult<MatchProddef> {
        let rest = pattern
            .trim()
            .strip_prefix("GRIB:")
            .or_else(|| pattern.trim().strip_prefix("grib:"))
            .ok_or_else(|| MatcherError::parse(pattern, "expected 'GRIB:key=value,...'"))?;
        let wanted =
            ValueBag::parse(rest).map_err(|message| MatcherError::parse(pattern, message))?;
        if wanted.is_empty() {
            return Err(MatcherError::parse(pattern, "empty proddef value list"));
        }
        Ok(MatchProddef { wanted })
    }

    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        match attr {
            Attribute::Proddef(bag) => bag.contains(&self.wanted),
            _ => false,
        }
    }
}

impl fmt::Display for MatchProddef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GRIB:{}", self.wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_match() {
        let m = MatchProddef::parse("GRIB:mc=ti,mt=9").unwrap();
        let attr = Attribute::Proddef(ValueBag::parse("mc=ti, mt=9, pf=1, tf=16").unwrap());
        assert!(m.matches(&attr));

        let other = Attribute::Proddef(ValueBag::parse("mc=ti, mt=10").unwrap());
        assert!(!m.matches(&other));
    }
}
