//! Comma-list helpers shared by the per-type sub-parsers
//!
//! `OptionalCommaList` splits a pattern on commas preserving empty fields as
//! explicit gaps, so position indices stay stable even with repeated empty
//! entries. `CommaJoiner` is the serialization inverse: joining the split of
//! a string reproduces it for any string of comma-separated non-comma
//! tokens.

use std::fmt::Display;

use super::errors::{MatcherError, MatcherResult};

/// A comma-separated argument list where positions may be left empty.
#[derive(Debug, Clone)]
pub struct OptionalCommaList {
    items: Vec<String>,
}

impl OptionalCommaList {
    /// Split a pattern on `,`, keeping empty fields
    pub fn new(pattern: &str) -> Self {
        let items = if pattern.is_empty() {
            Vec::new()
        } else {
            pattern.split(',').map(|s| s.trim().to_string()).collect()
        };
        Self { items }
    }

    /// The number of positions provided, including empty ones
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no positions were provided
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True only if position `pos` was provided and non-empty
    pub fn has(&self, pos: usize) -> bool {
        self.items.get(pos).map(|s| !s.is_empty()).unwrap_or(false)
    }

    /// The raw string at `pos`, or `default` if absent/empty
    pub fn get<'a>(&'a self, pos: usize, default: &'a str) -> &'a str {
        match self.items.get(pos) {
            Some(s) if !s.is_empty() => s,
            _ => default,
        }
    }

    /// Parse position `pos` as an integer, with `default` when absent/empty
    pub fn get_int(&self, pos: usize, default: i64) -> MatcherResult<i64> {
        match self.items.get(pos) {
            Some(s) if !s.is_empty() => s.parse::<i64>().map_err(|_| {
                MatcherError::parse(s.clone(), format!("position {} is not an integer", pos))
            }),
            _ => Ok(default),
        }
    }

    /// Parse position `pos` as a double, with `default` when absent/empty
    pub fn get_double(&self, pos: usize, default: f64) -> MatcherResult<f64> {
        match self.items.get(pos) {
            Some(s) if !s.is_empty() => s.parse::<f64>().map_err(|_| {
                MatcherError::parse(s.clone(), format!("position {} is not a number", pos))
            }),
            _ => Ok(default),
        }
    }
}

/// Builds a comma-joined pattern, with explicit gaps for undefined fields.
///
/// Trailing undefined fields are dropped; embedded ones are kept as empty
/// fields so positions stay aligned.
#[derive(Debug, Clone, Default)]
pub struct CommaJoiner {
    items: Vec<Option<String>>,
}

impl CommaJoiner {
    /// Creates an empty joiner
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a defined value
    pub fn add(&mut self, value: impl Display) -> &mut Self {
        self.items.push(Some(value.to_string()));
        self
    }

    /// Append an undefined (don't care) position
    pub fn add_undef(&mut self) -> &mut Self {
        self.items.push(None);
        self
    }

    /// Join into the final pattern
    pub fn join(&self) -> String {
        let mut items = self.items.as_slice();
        while let Some((None, rest)) = items.split_last() {
            items = rest;
        }
        items
            .iter()
            .map(|item| item.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_comma_list_gaps() {
        let args = OptionalCommaList::new("CIAO,,1,2,,3");
        assert_eq!(args.len(), 6);
        assert!(args.has(0));
        assert!(!args.has(1));
        assert!(args.has(2));
        assert_eq!(args.get_int(2, 100).unwrap(), 1);
        assert_eq!(args.get_int(1, 100).unwrap(), 100);
        assert_eq!(args.get_int(5, 100).unwrap(), 3);
        assert_eq!(args.get_int(9, 100).unwrap(), 100);
    }

    #[test]
    fn test_optional_comma_list_empty_pattern() {
        let args = OptionalCommaList::new("");
        assert!(args.is_empty());
        assert!(!args.has(0));
    }

    #[test]
    fn test_get_double_with_default() {
        let args = OptionalCommaList::new("1.5,,x");
        assert_eq!(args.get_double(0, 9.0).unwrap(), 1.5);
        assert_eq!(args.get_double(1, 9.0).unwrap(), 9.0);
        assert!(args.get_double(2, 9.0).is_err());
    }

    #[test]
    fn test_comma_joiner_drops_trailing_undef() {
        let mut joiner = CommaJoiner::new();
        joiner.add("ciao");
        joiner.add_undef();
        joiner.add(3);
        joiner.add(3.14);
        joiner.add_undef();
        joiner.add_undef();
        assert_eq!(joiner.join(), "ciao,,3,3.14");
    }

    #[test]
    fn test_join_split_roundtrip() {
        let original = "a,,b,c";
        let args = OptionalCommaList::new(original);
        let mut joiner = CommaJoiner::new();
        for i in 0..args.len() {
            if args.has(i) {
                joiner.add(args.get(i, ""));
            } else {
                joiner.add_undef();
            }
        }
        assert_eq!(joiner.join(), original);
    }
}
