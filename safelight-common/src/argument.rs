//! Filter argument descriptors
//!
//! An [`Argument`] describes one declared parameter of a compiled filter, as
//! reported by the filter's `describe` verb. Arguments are immutable once
//! decoded; a new description always produces a fresh list.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an argument in a filter call
///
/// Encoded on the wire as the integers 0, 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ArgumentKind {
    /// A scalar input parameter
    Scalar,
    /// A buffer the filter reads
    InputBuffer,
    /// A buffer the filter produces
    OutputBuffer,
}

impl TryFrom<u8> for ArgumentKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Scalar),
            1 => Ok(Self::InputBuffer),
            2 => Ok(Self::OutputBuffer),
            other => Err(format!("unknown argument kind {}", other)),
        }
    }
}

impl From<ArgumentKind> for u8 {
    fn from(kind: ArgumentKind) -> Self {
        match kind {
            ArgumentKind::Scalar => 0,
            ArgumentKind::InputBuffer => 1,
            ArgumentKind::OutputBuffer => 2,
        }
    }
}

/// Numeric class of an argument or buffer element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCode {
    Uint,
    Int,
    Float,
    /// Opaque pointer-like parameter; never user-facing
    Handle,
}

impl TypeCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uint => "uint",
            Self::Int => "int",
            Self::Float => "float",
            Self::Handle => "handle",
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed descriptor of one filter parameter
///
/// Field names follow the wire dictionary (`type_code`, `type_bits`, `def`),
/// so an `Argument` deserializes directly from an ArgumentDict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub kind: ArgumentKind,
    /// Scalars omit this on the wire; it decodes as zero.
    #[serde(default)]
    pub dimensions: u32,
    pub type_code: TypeCode,
    pub type_bits: u32,
    /// Declared default; kept as raw JSON since it may be a number or a boolean
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub def: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<serde_json::Value>,
}

impl Argument {
    /// Decode an ArgumentDict
    pub fn from_dict(dict: &serde_json::Value) -> crate::Result<Self> {
        serde_json::from_value(dict.clone())
            .map_err(|e| crate::Error::InvalidWire(format!("argument: {}", e)))
    }

    /// True for input and output buffers
    pub fn is_buffer(&self) -> bool {
        matches!(self.kind, ArgumentKind::InputBuffer | ArgumentKind::OutputBuffer)
    }

    /// True for scalars and input buffers
    pub fn is_input(&self) -> bool {
        matches!(self.kind, ArgumentKind::InputBuffer | ArgumentKind::Scalar)
    }

    /// True for `uint` arguments one bit wide
    pub fn is_boolean(&self) -> bool {
        self.type_code == TypeCode::Uint && self.type_bits == 1
    }

    /// Same name, kind, type and dimensionality
    pub fn is_compatible_with(&self, other: &Argument) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.type_code == other.type_code
            && self.type_bits == other.type_bits
            && self.dimensions == other.dimensions
    }

    /// Declared default as a number; absent or non-numeric defaults give 0
    pub fn default_number(&self) -> f64 {
        self.def.as_ref().and_then(json_to_number).unwrap_or(0.0)
    }

    /// Declared default coerced to a boolean; absent defaults give `false`
    pub fn default_bool(&self) -> bool {
        self.def.as_ref().map(json_truthy).unwrap_or(false)
    }

    /// Declared lower bound, if numeric
    pub fn min_number(&self) -> Option<f64> {
        self.min.as_ref().and_then(json_to_number)
    }

    /// Declared upper bound, if numeric
    pub fn max_number(&self) -> Option<f64> {
        self.max.as_ref().and_then(json_to_number)
    }
}

/// Numeric reading of a JSON scalar (booleans read as 0/1, numeric strings parse)
pub fn json_to_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Truthiness of a JSON value: null, false, 0, NaN and "" are false
pub fn json_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|v| v != 0.0 && !v.is_nan()).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}
