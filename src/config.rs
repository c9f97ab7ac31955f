//! Dataset configuration files
//!
//! Key=value blocks with optional `[section]` headers:
//!
//! ```text
//! # comment
//! [errors]
//! type = iseg          ; trailing comment
//! format = grib
//! unique = origin, reftime
//! ```
//!
//! Lines are trimmed; `#` and `;` start full-line or trailing comments;
//! blank lines are ignored; whitespace around `=` is stripped, so keys may
//! contain embedded spaces after trimming. The first parsed occurrence of a
//! key is the one visible through `value()`; `set_value` overwrites.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use regex::Regex;
use thiserror::Error;

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration parsing errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A line is not a comment, a section header, or a key=value assignment
    #[error("{filename}:{line}: {message}")]
    Parse {
        /// Name used to report errors, usually the file path
        filename: String,
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// A config value has the wrong shape for its key
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// The configuration key
        key: String,
        /// What went wrong
        message: String,
    },
}

/// A parsed configuration block: values plus named subsections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    values: BTreeMap<String, String>,
    sections: BTreeMap<String, ConfigFile>,
}

impl ConfigFile {
    /// Creates an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration text.
    ///
    /// `filename` is only used in error messages.
    pub fn parse(text: &str, filename: &str) -> ConfigResult<ConfigFile> {
        // Keys may embed single spaces once outer whitespace is trimmed
        let section_re = Regex::new(r"^\[[ \t]*([a-zA-Z0-9_.-]+)[ \t]*\]$").expect("static regex");

        let mut root = ConfigFile::new();
        let mut current: Option<String> = None;

        for (lineno, raw_line) in text.lines().enumerate() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(caps) = section_re.captures(line) {
                let name = caps[1].to_string();
                root.sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if key.is_empty() {
                    return Err(ConfigError::Parse {
                        filename: filename.to_string(),
                        line: lineno + 1,
                        message: "assignment with empty key".to_string(),
                    });
                }
                let mut value = value.trim();
                // Strip double quotes, if they wrap the whole value
                if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                    value = &value[1..value.len() - 1];
                }
                let target = match &current {
                    Some(name) => root.sections.get_mut(name).expect("section exists"),
                    None => &mut root,
                };
                // First parse occurrence wins; later duplicates are ignored
                target
                    .values
                    .entry(key.to_string())
                    .or_insert_with(|| value.to_string());
                continue;
            }

            return Err(ConfigError::Parse {
                filename: filename.to_string(),
                line: lineno + 1,
                message:
                    "line is not a comment, nor a section start, nor empty, nor a key=value assignment"
                        .to_string(),
            });
        }

        Ok(root)
    }

    /// The value for a key, if set
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Set a value, overwriting any previous value for the key
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// The number of values in this block
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this block has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate key/value pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    /// A named subsection, if present
    pub fn section(&self, name: &str) -> Option<&ConfigFile> {
        self.sections.get(name)
    }

    /// Create or fetch a named subsection
    pub fn section_mut(&mut self, name: impl Into<String>) -> &mut ConfigFile {
        self.sections.entry(name.into()).or_default()
    }

    /// Iterate subsections in name order
    pub fn section_iter(&self) -> impl Iterator<Item = (&String, &ConfigFile)> {
        self.sections.iter()
    }

    /// Serialize back to the textual form
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.values {
            let _ = writeln!(out, "{} = {}", key, value);
        }
        for (name, section) in &self.sections {
            let _ = writeln!(out, "\n[{}]", name);
            out.push_str(&section.serialize());
        }
        out
    }
}

/// Cuts a trailing `#` or `;` comment, or returns the line unchanged.
fn strip_comment(line: &str) -> &str {
    match line.find(|c| c == '#' || c == ';') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_assignments() {
        let cfg = ConfigFile::parse("a = 1\nb=2\n", "test").unwrap();
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.value("a"), Some("1"));
        assert_eq!(cfg.value("b"), Some("2"));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let text = "# full-line comment\n\n; another comment\na = 1   # trailing\nb = 2 ; trailing too\n";
        let cfg = ConfigFile::parse(text, "test").unwrap();
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.value("a"), Some("1"));
        assert_eq!(cfg.value("b"), Some("2"));
    }

    #[test]
    fn test_spaced_keys_are_trimmed_not_collapsed() {
        let cfg = ConfigFile::parse("  t r e  = 3\n", "test").unwrap();
        assert_eq!(cfg.value("t r e"), Some("3"));
        assert_eq!(cfg.value("tre"), None);
    }

    #[test]
    fn test_first_parse_occurrence_wins() {
        let cfg = ConfigFile::parse("a = first\na = second\n", "test").unwrap();
        assert_eq!(cfg.value("a"), Some("first"));
    }

    #[test]
    fn test_set_value_overwrites() {
        let mut cfg = ConfigFile::parse("a = first\n", "test").unwrap();
        cfg.set_value("a", "changed");
        assert_eq!(cfg.value("a"), Some("changed"));
    }

    #[test]
    fn test_quoted_values_stripped() {
        let cfg = ConfigFile::parse("name = \"hello world\"\n", "test").unwrap();
        assert_eq!(cfg.value("name"), Some("hello world"));
    }

    #[test]
    fn test_sections() {
        let text = "[errors]\ntype = iseg\nformat = grib\n\n[duplicates]\ntype = iseg\nformat = bufr\n";
        let cfg = ConfigFile::parse(text, "test").unwrap();
        assert!(cfg.is_empty());
        assert_eq!(cfg.section("errors").unwrap().value("format"), Some("grib"));
        assert_eq!(
            cfg.section("duplicates").unwrap().value("format"),
            Some("bufr")
        );
        assert!(cfg.section("missing").is_none());
    }

    #[test]
    fn test_garbage_line_rejected() {
        let err = ConfigFile::parse("a = 1\nnot an assignment\n", "conf").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("conf:2"), "unexpected message: {}", msg);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let text = "a = 1\n\n[sec]\nb = 2\n";
        let cfg = ConfigFile::parse(text, "test").unwrap();
        let reparsed = ConfigFile::parse(&cfg.serialize(), "test").unwrap();
        assert_eq!(cfg, reparsed);
    }
}
