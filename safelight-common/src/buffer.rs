//! Planar multi-dimensional sample buffers
//!
//! A [`Buffer`] mirrors the Halide `buffer_t` layout plus the element type
//! and dimensionality, so a buffer can be interpreted without its Argument.
//!
//! Buffers travel in one of two wire forms:
//! - [`WireForm::Raw`]: `host` is the byte sequence itself (local modules)
//! - [`WireForm::Base64`]: `host` is base64 text (remote devices over HTTP)
//!
//! Both forms convert losslessly into each other.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::argument::TypeCode;
use crate::{Error, Result};

/// Which representation the `host` field uses on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireForm {
    Raw,
    Base64,
}

/// Raw sample data with explicit extent/stride/min metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buffer {
    pub host: Vec<u8>,
    pub extent: [i32; 4],
    pub stride: [i32; 4],
    pub min: [i32; 4],
    pub elem_size: i32,
    pub dimensions: i32,
    pub type_code: TypeCode,
}

/// BufferDict with `host` as base64 text
#[derive(Debug, Serialize, Deserialize)]
struct Base64BufferDict {
    host: String,
    extent: [i32; 4],
    stride: [i32; 4],
    min: [i32; 4],
    elem_size: i32,
    dimensions: i32,
    type_code: TypeCode,
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            host: Vec::new(),
            extent: [0; 4],
            stride: [0; 4],
            min: [0; 4],
            elem_size: 0,
            dimensions: 0,
            type_code: TypeCode::Uint,
        }
    }
}

impl Buffer {
    /// Number of pixels in the first two dimensions, counting empty
    /// dimensions as one
    pub fn pixel_count(&self) -> u64 {
        let w = self.extent[0].max(1) as u64;
        let h = self.extent[1].max(1) as u64;
        w * h
    }

    /// Encode as a BufferDict in the given wire form
    pub fn to_wire(&self, form: WireForm) -> Result<serde_json::Value> {
        match form {
            WireForm::Raw => Ok(serde_json::to_value(self)?),
            WireForm::Base64 => Ok(serde_json::to_value(self.to_base64_dict())?),
        }
    }

    /// Decode a BufferDict in the given wire form
    pub fn from_wire(form: WireForm, value: &serde_json::Value) -> Result<Self> {
        match form {
            WireForm::Raw => serde_json::from_value(value.clone())
                .map_err(|e| Error::InvalidWire(format!("buffer: {}", e))),
            WireForm::Base64 => {
                let dict: Base64BufferDict = serde_json::from_value(value.clone())
                    .map_err(|e| Error::InvalidWire(format!("buffer: {}", e)))?;
                Self::from_base64_dict(dict)
            }
        }
    }

    fn to_base64_dict(&self) -> Base64BufferDict {
        Base64BufferDict {
            host: STANDARD.encode(&self.host),
            extent: self.extent,
            stride: self.stride,
            min: self.min,
            elem_size: self.elem_size,
            dimensions: self.dimensions,
            type_code: self.type_code,
        }
    }

    fn from_base64_dict(dict: Base64BufferDict) -> Result<Self> {
        let host = STANDARD
            .decode(dict.host.as_bytes())
            .map_err(|e| Error::InvalidWire(format!("buffer host is not base64: {}", e)))?;
        Ok(Self {
            host,
            extent: dict.extent,
            stride: dict.stride,
            min: dict.min,
            elem_size: dict.elem_size,
            dimensions: dict.dimensions,
            type_code: dict.type_code,
        })
    }
}
