//! Named parameter values
//!
//! A [`ValueMap`] holds one entry per declared argument plus three
//! synthetic entries describing the last run. Synthetic names start with `$`,
//! which is not legal in a filter argument name, so they never collide.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::buffer::{Buffer, WireForm};
use crate::Result;

/// Captured stdout/stderr of the last run
pub const LOG_KEY: &str = "$log";
/// Execution time of the last run in microseconds
pub const TIME_USEC_KEY: &str = "$time_usec";
/// Pixels produced by the last run, summed across outputs
pub const PIXELS_PROCESSED_KEY: &str = "$pixels_processed";

/// Value of one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Buffer(Buffer),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            Value::Buffer(b) => Some(b),
            _ => None,
        }
    }

    /// Encode for a call request, with buffers in the given wire form
    pub fn to_wire(&self, form: WireForm) -> Result<serde_json::Value> {
        match self {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Number(n) => Ok(serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null)),
            Value::Text(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Buffer(b) => b.to_wire(form),
        }
    }

    /// Parse a command-line style literal: `true`/`false` or a number
    pub fn parse_literal(text: &str) -> Option<Value> {
        match text.trim() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            other => other.parse::<f64>().ok().map(Value::Number),
        }
    }
}

/// Parameter name to value
pub type ValueMap = BTreeMap<String, Value>;

/// Insert the synthetic keys with their reset values
pub fn insert_run_defaults(values: &mut ValueMap) {
    values.insert(LOG_KEY.to_string(), Value::Text(String::new()));
    values.insert(TIME_USEC_KEY.to_string(), Value::Number(0.0));
    values.insert(PIXELS_PROCESSED_KEY.to_string(), Value::Number(0.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_defaults() {
        let mut values = ValueMap::new();
        insert_run_defaults(&mut values);
        assert_eq!(values.len(), 3);
        assert_eq!(values[LOG_KEY], Value::Text(String::new()));
        assert_eq!(values[TIME_USEC_KEY], Value::Number(0.0));
        assert_eq!(values[PIXELS_PROCESSED_KEY], Value::Number(0.0));
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(Value::parse_literal("true"), Some(Value::Bool(true)));
        assert_eq!(Value::parse_literal(" 2.5 "), Some(Value::Number(2.5)));
        assert_eq!(Value::parse_literal("bright"), None);
    }

    #[test]
    fn test_scalar_wire_encoding() {
        assert_eq!(Value::Number(0.5).to_wire(WireForm::Raw).unwrap(), json!(0.5));
        assert_eq!(Value::Bool(true).to_wire(WireForm::Base64).unwrap(), json!(true));
        assert_eq!(Value::Null.to_wire(WireForm::Raw).unwrap(), json!(null));
    }

    #[test]
    fn test_untagged_serialization() {
        let mut values = ValueMap::new();
        values.insert("a".to_string(), Value::Null);
        values.insert("b".to_string(), Value::Number(3.0));
        let encoded = serde_json::to_value(&values).unwrap();
        assert_eq!(encoded, json!({"a": null, "b": 3.0}));
    }
}
