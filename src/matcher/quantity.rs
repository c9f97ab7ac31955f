//! Quantity sub-matcher
//!
//! Comma-list membership: every requested quantity must be present in the
//! attribute's value set.

use std::collections::BTreeSet;
use std::fmt;

use super::errors::{MatcherError, MatcherResult};
use crate::types::Attribute;

/// Matches measured-quantity attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchQuantity {
    wanted: BTreeSet<String>,
}

impl MatchQuantity {
    /// Parse a quantity pattern
    pub fn parse(pattern: &str) -> MatcherResult<MatchQuantity> {
        let wanted: BTreeSet<String> = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if wanted.is_empty() {
            return Err(MatcherError::parse(pattern, "empty quantity pattern"));
        }
        Ok(MatchQuantity { wanted })
    }

    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        match attr {
            Attribute::Quantity(values) => self.wanted.iter().all(|q| values.contains(q)),
            _ => false,
        }
    }
}

impl fmt::Display for MatchQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.wanted.iter().map(|s| s.as_str()).collect();
        write!(f, "{}", joined.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quantity(values: &[&str]) -> Attribute {
        Attribute::Quantity(values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_all_requested_must_be_present() {
        let m = MatchQuantity::parse("B13011,B13215").unwrap();
        assert!(m.matches(&quantity(&["B13011", "B13215", "B12101"])));
        assert!(!m.matches(&quantity(&["B13011"])));
    }

    #[test]
    fn test_single_value() {
        let m = MatchQuantity::parse("B13011").unwrap();
        assert!(m.matches(&quantity(&["B13011"])));
        assert!(!m.matches(&quantity(&["B12101"])));
    }
}
