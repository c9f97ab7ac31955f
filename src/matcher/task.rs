//! Task sub-matcher
//!
//! Case-insensitive substring containment: the pattern is uppercased once
//! at parse time and searched for inside the uppercased task name.

use std::fmt;

use super::errors::{MatcherError, MatcherResult};
use crate::types::Attribute;

/// Matches acquisition task attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTask {
    needle: String,
}

impl MatchTask {
    /// Parse a task pattern
    pub fn parse(pattern: &str) -> MatcherResult<MatchTask> {
        let needle = pattern.trim();
        if needle.is_empty() {
            return Err(MatcherError::parse(pattern, "empty task pattern"));
        }
        Ok(MatchTask {
            needle: needle.to_uppercase(),
        })
    }

    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        match attr {
            Attribute::Task(name) => name.to_uppercase().contains(&self.needle),
            _ => false,
        }
    }
}

impl fmt::Display for MatchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str) -> Attribute {
        Attribute::Task(name.to_string())
    }

    #[test]
    fn test_exact_case_insensitive() {
        let m = MatchTask::parse("task1").unwrap();
        assert!(m.matches(&task("task1")));
        assert!(m.matches(&task("TASK1")));
    }

    #[test]
    fn test_substring() {
        let m = MatchTask::parse("ASK").unwrap();
        assert!(m.matches(&task("task1")));
    }

    #[test]
    fn test_non_matching() {
        let m = MatchTask::parse("baaaaa").unwrap();
        assert!(!m.matches(&task("task1")));
    }

    #[test]
    fn test_wrong_attribute_kind() {
        let m = MatchTask::parse("task1").unwrap();
        assert!(!m.matches(&Attribute::Run { minute: 0 }));
    }
}
