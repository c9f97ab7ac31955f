//! Generic structured emission
//!
//! Metadata and summaries serialize themselves to an abstract sink, so the
//! on-disk binary encoding stays decoupled from external representations.
//! A JSON emitter backed by serde_json is provided; other emitters can be
//! plugged in by implementing [`Emitter`].

use serde_json::{Map, Number, Value};

/// A structured data sink.
///
/// Keys are announced with `add_key`, followed by exactly one value (scalar,
/// mapping or list). Emitters must tolerate nested mappings and lists.
pub trait Emitter {
    /// Begin a mapping value
    fn start_mapping(&mut self);
    /// End the current mapping
    fn end_mapping(&mut self);
    /// Begin a list value
    fn start_list(&mut self);
    /// End the current list
    fn end_list(&mut self);
    /// Announce the key for the next value inside a mapping
    fn add_key(&mut self, key: &str);
    /// Emit a string value
    fn add_string(&mut self, value: &str);
    /// Emit an integer value
    fn add_int(&mut self, value: i64);
    /// Emit a floating point value
    fn add_double(&mut self, value: f64);
    /// Emit a boolean value
    fn add_bool(&mut self, value: bool);
    /// Emit a null value
    fn add_null(&mut self);
}

enum Frame {
    Mapping(Map<String, Value>),
    List(Vec<Value>),
}

/// Emitter that builds a `serde_json::Value` tree.
#[derive(Default)]
pub struct JsonEmitter {
    stack: Vec<Frame>,
    pending_key: Option<String>,
    root: Option<Value>,
}

impl JsonEmitter {
    /// Creates an empty JSON emitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the built value, if emission produced one
    pub fn into_value(self) -> Option<Value> {
        self.root
    }

    fn push_value(&mut self, value: Value) {
        match self.stack.last_mut() {
            Some(Frame::Mapping(map)) => {
                // A value without a key inside a mapping is an emitter
                // contract violation; drop it rather than panic
                if let Some(key) = self.pending_key.take() {
                    map.insert(key, value);
                }
            }
            Some(Frame::List(list)) => list.push(value),
            None => self.root = Some(value),
        }
    }
}

impl Emitter for JsonEmitter {
    fn start_mapping(&mut self) {
        self.stack.push(Frame::Mapping(Map::new()));
    }

    fn end_mapping(&mut self) {
        if let Some(Frame::Mapping(map)) = self.stack.pop() {
            self.push_value(Value::Object(map));
        }
    }

    fn start_list(&mut self) {
        self.stack.push(Frame::List(Vec::new()));
    }

    fn end_list(&mut self) {
        if let Some(Frame::List(list)) = self.stack.pop() {
            self.push_value(Value::Array(list));
        }
    }

    fn add_key(&mut self, key: &str) {
        self.pending_key = Some(key.to_string());
    }

    fn add_string(&mut self, value: &str) {
        self.push_value(Value::String(value.to_string()));
    }

    fn add_int(&mut self, value: i64) {
        self.push_value(Value::Number(value.into()));
    }

    fn add_double(&mut self, value: f64) {
        match Number::from_f64(value) {
            Some(n) => self.push_value(Value::Number(n)),
            None => self.push_value(Value::Null),
        }
    }

    fn add_bool(&mut self, value: bool) {
        self.push_value(Value::Bool(value));
    }

    fn add_null(&mut self) {
        self.push_value(Value::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_mapping() {
        let mut emitter = JsonEmitter::new();
        emitter.start_mapping();
        emitter.add_key("origin");
        emitter.start_mapping();
        emitter.add_key("style");
        emitter.add_string("GRIB1");
        emitter.add_key("centre");
        emitter.add_int(98);
        emitter.end_mapping();
        emitter.add_key("quantities");
        emitter.start_list();
        emitter.add_string("B13011");
        emitter.add_string("B13215");
        emitter.end_list();
        emitter.end_mapping();

        let value = emitter.into_value().unwrap();
        assert_eq!(
            value,
            json!({
                "origin": {"style": "GRIB1", "centre": 98},
                "quantities": ["B13011", "B13215"],
            })
        );
    }

    #[test]
    fn test_scalar_root() {
        let mut emitter = JsonEmitter::new();
        emitter.add_int(7);
        assert_eq!(emitter.into_value().unwrap(), json!(7));
    }
}
