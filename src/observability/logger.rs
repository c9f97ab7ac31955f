//! Structured JSON logger
//!
//! One log line = one event. Fields are sorted alphabetically so output
//! is deterministic; the event name and severity always come first.

use std::fmt;
use std::io::{self, Write};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues, e.g. recovered corruption
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    /// The string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Synchronous structured logger.
pub struct Logger;

impl Logger {
    /// Logs an event with the given severity and fields.
    ///
    /// Fields are output in alphabetical key order.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity >= Severity::Error {
            Self::log_to_writer(severity, event, fields, &mut io::stderr());
        } else {
            Self::log_to_writer(severity, event, fields, &mut io::stdout());
        }
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        // Built by hand to keep field ordering deterministic
        let mut output = String::with_capacity(256);

        output.push_str("{\"event\":\"");
        Self::escape_json_string(&mut output, event);
        output.push_str("\",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted_fields: Vec<_> = fields.iter().collect();
        sorted_fields.sort_by_key(|(k, _)| *k);
        for (key, value) in sorted_fields {
            output.push_str(",\"");
            Self::escape_json_string(&mut output, key);
            output.push_str("\":\"");
            Self::escape_json_string(&mut output, value);
            output.push('"');
        }

        output.push_str("}\n");

        // One write, one flush; failures are swallowed
        let _ = writer.write_all(output.as_bytes());
        let _ = writer.flush();
    }

    fn escape_json_string(output: &mut String, text: &str) {
        use std::fmt::Write as _;
        for c in text.chars() {
            match c {
                '"' => output.push_str("\\\""),
                '\\' => output.push_str("\\\\"),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                // Remaining control characters take the \u form
                c if c.is_control() => {
                    let _ = write!(output, "\\u{:04x}", c as u32);
                }
                c => output.push(c),
            }
        }
    }

    /// Logs at TRACE level
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Logs at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Logs at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Logs at ERROR level, to stderr
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut buffer = Vec::new();
        Logger::log_to_writer(severity, event, fields, &mut buffer);
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_log_is_valid_json() {
        let output = capture(
            Severity::Info,
            "segment_repacked",
            &[("segment", "2007/04.grib"), ("bytes_reclaimed", "4096")],
        );
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "segment_repacked");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["segment"], "2007/04.grib");
        assert_eq!(parsed["bytes_reclaimed"], "4096");
    }

    #[test]
    fn test_field_order_is_deterministic() {
        let one = capture(
            Severity::Warn,
            "index_recovered",
            &[("segment", "all.grib"), ("bytes_discarded", "12")],
        );
        let two = capture(
            Severity::Warn,
            "index_recovered",
            &[("bytes_discarded", "12"), ("segment", "all.grib")],
        );
        assert_eq!(one, two);
        assert!(one.find("bytes_discarded").unwrap() < one.find("segment").unwrap());
    }

    #[test]
    fn test_one_event_one_line() {
        let output = capture(Severity::Info, "acquire", &[("path", "a\nb")]);
        assert_eq!(output.chars().filter(|c| *c == '\n').count(), 1);
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn test_escapes_special_characters() {
        let output = capture(Severity::Info, "note", &[("text", "say \"hi\"\tok")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["text"], "say \"hi\"\tok");
    }
}
