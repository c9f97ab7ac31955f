//! Dynamic scalar values and ordered value bags
//!
//! A `ValueBag` is an ordered mapping of string key to scalar value used by
//! the composite matchable attributes (area, proddef). Keys are unique and
//! comparison is lexicographic over key then value.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::codec::{CodecError, CodecResult, Decoder, Encoder};

/// A scalar value: integer, double or string.
///
/// Ordering is total and deterministic: Int < Double < String across kinds,
/// with doubles ordered by their bit-level total order so NaN does not
/// poison comparisons.
#[derive(Debug, Clone)]
pub enum Value {
    /// Signed integer
    Int(i64),
    /// IEEE754 double
    Double(f64),
    /// UTF-8 string
    String(String),
}

impl Value {
    fn kind_rank(&self) -> u8 {
        match self {
            Value::Int(_) => 0,
            Value::Double(_) => 1,
            Value::String(_) => 2,
        }
    }

    /// Parse a scalar from its textual form: integers first, then floats,
    /// then quoted or bare strings.
    pub fn parse(text: &str) -> Value {
        let text = text.trim();
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            return Value::String(text[1..text.len() - 1].to_string());
        }
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Value::Double(f);
        }
        Value::String(text.to_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => {
                // Bare identifiers stay bare so parse(to_string) round-trips
                let bare = !v.is_empty()
                    && v.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    && v.parse::<f64>().is_err();
                if bare {
                    write!(f, "{}", v)
                } else {
                    write!(f, "\"{}\"", v)
                }
            }
        }
    }
}

/// Ordered mapping of string key to scalar value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ValueBag {
    values: BTreeMap<String, Value>,
}

impl ValueBag {
    /// Creates an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of key/value pairs
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the bag holds no pairs
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Set a key to a value, replacing any previous value for the key
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Get the value for a key, if present
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Iterate pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Returns true if every pair of `other` is present in this bag with
    /// an equal value.
    pub fn contains(&self, other: &ValueBag) -> bool {
        other
            .values
            .iter()
            .all(|(k, v)| self.values.get(k) == Some(v))
    }

    /// Parse a `key=value, key=value` list.
    pub fn parse(text: &str) -> Result<ValueBag, String> {
        let mut bag = ValueBag::new();
        for piece in text.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let (key, val) = piece
                .split_once('=')
                .ok_or_else(|| format!("cannot parse value bag item {:?}: missing '='", piece))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("cannot parse value bag item {:?}: empty key", piece));
            }
            bag.set(key, Value::parse(val));
        }
        Ok(bag)
    }

    /// Encode the bag into the attribute payload layout
    pub fn encode(&self, enc: &mut Encoder) {
        enc.add_varint(self.values.len() as u64);
        for (key, value) in &self.values {
            enc.add_string(key);
            match value {
                Value::Int(v) => {
                    enc.add_u8(0);
                    enc.add_i64(*v);
                }
                Value::Double(v) => {
                    enc.add_u8(1);
                    enc.add_f64(*v);
                }
                Value::String(v) => {
                    enc.add_u8(2);
                    enc.add_string(v);
                }
            }
        }
    }

    /// Decode a bag from the attribute payload layout
    pub fn decode(dec: &mut Decoder) -> CodecResult<ValueBag> {
        let count = dec.pop_varint("value bag count")?;
        let mut bag = ValueBag::new();
        for _ in 0..count {
            let key = dec.pop_string("value bag key")?;
            let tag = dec.pop_u8("value bag tag")?;
            let value = match tag {
                0 => Value::Int(dec.pop_i64("value bag int")?),
                1 => Value::Double(dec.pop_f64("value bag double")?),
                2 => Value::String(dec.pop_string("value bag string")?),
                other => {
                    return Err(CodecError::malformed(format!(
                        "unknown value bag tag {}",
                        other
                    )))
                }
            };
            bag.set(key, value);
        }
        Ok(bag)
    }
}

impl fmt::Display for ValueBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.values {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(Value::parse("42"), Value::Int(42));
        assert_eq!(Value::parse("-7"), Value::Int(-7));
        assert_eq!(Value::parse("3.5"), Value::Double(3.5));
        assert_eq!(Value::parse("milan"), Value::String("milan".into()));
        assert_eq!(Value::parse("\"a b\""), Value::String("a b".into()));
    }

    #[test]
    fn test_bag_parse_and_display_roundtrip() {
        let bag = ValueBag::parse("lat=45000, lon=11000, name=bologna").unwrap();
        assert_eq!(bag.get("lat"), Some(&Value::Int(45000)));
        let rendered = bag.to_string();
        let reparsed = ValueBag::parse(&rendered).unwrap();
        assert_eq!(bag, reparsed);
    }

    #[test]
    fn test_bag_contains() {
        let full = ValueBag::parse("lat=45000, lon=11000").unwrap();
        let sub = ValueBag::parse("lat=45000").unwrap();
        let other = ValueBag::parse("lat=1").unwrap();
        assert!(full.contains(&sub));
        assert!(!full.contains(&other));
        assert!(!sub.contains(&full));
    }

    #[test]
    fn test_bag_codec_roundtrip() {
        let bag = ValueBag::parse("lat=45000, height=1.5, name=bologna").unwrap();
        let mut enc = Encoder::new();
        bag.encode(&mut enc);
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes);
        let decoded = ValueBag::decode(&mut dec).unwrap();
        assert_eq!(bag, decoded);
        assert_eq!(dec.remaining(), 0);
    }

    #[test]
    fn test_value_ordering_is_total() {
        let mut values = vec![
            Value::String("b".into()),
            Value::Double(2.0),
            Value::Int(10),
            Value::Int(2),
            Value::Double(f64::NAN),
        ];
        values.sort();
        assert_eq!(values[0], Value::Int(2));
        assert_eq!(values[1], Value::Int(10));
    }
}
