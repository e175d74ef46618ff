//! # Safelight Common Library
//!
//! Shared code for the Safelight host and compute modules including:
//! - Filter argument descriptors and sample buffers
//! - Named parameter values
//! - Request/response wire envelopes
//! - Default input buffer synthesis
//! - Configuration loading

pub mod argument;
pub mod buffer;
pub mod config;
pub mod default_values;
pub mod error;
pub mod values;
pub mod wire;

pub use argument::{Argument, ArgumentKind, TypeCode};
pub use buffer::{Buffer, WireForm};
pub use config::SafelightConfig;
pub use default_values::make_input_buffer;
pub use error::{Error, Result};
pub use values::{Value, ValueMap};
pub use wire::{BuildInfo, FilterDescription, RequestEnvelope, ResponseEnvelope};
