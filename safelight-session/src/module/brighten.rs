//! Reference filter: brighten an 8-bit image
//!
//! Multiplies every sample of `input` by `brightness_level` and saturates at
//! 255. Used by the `brighten-module` binary.

use safelight_common::wire::{CALL_VERB, DESCRIBE_VERB};
use safelight_common::{Buffer, TypeCode, WireForm};
use serde_json::json;
use std::time::Instant;

use super::{unknown_verb, ModuleLog, VerbHandler, MAX_THREADS};

/// Name reported in the description
pub const FILTER_NAME: &str = "brighten";
/// Name of the single output
pub const OUTPUT_NAME: &str = "$result_0";

#[derive(Debug, Default)]
pub struct Brighten;

impl Brighten {
    /// Argument description as served by `describe`
    pub fn description() -> serde_json::Value {
        json!({
            "version": 0,
            "name": FILTER_NAME,
            "target": std::env::consts::ARCH,
            "arguments": [
                {
                    "name": "input",
                    "kind": 1,
                    "dimensions": 3,
                    "type_code": "uint",
                    "type_bits": 8
                },
                {
                    "name": "brightness_level",
                    "kind": 0,
                    "type_code": "float",
                    "type_bits": 32,
                    "def": 1.5,
                    "min": 1,
                    "max": 10
                },
                {
                    "name": OUTPUT_NAME,
                    "kind": 2,
                    "dimensions": 3,
                    "type_code": "uint",
                    "type_bits": 8
                }
            ]
        })
    }

    fn call(&self, data: &serde_json::Value, log: &mut ModuleLog) -> Result<serde_json::Value, String> {
        let threads = data
            .get("num_threads")
            .and_then(|n| n.as_u64())
            .unwrap_or(1)
            .clamp(1, MAX_THREADS as u64);
        let inputs = data.get("inputs").ok_or("missing inputs")?;
        let input = inputs.get("input").ok_or("missing input: input")?;
        let input = Buffer::from_wire(WireForm::Raw, input).map_err(|e| e.to_string())?;
        if input.type_code != TypeCode::Uint || input.elem_size != 1 {
            return Err(format!(
                "input must be uint8, got {}{}",
                input.type_code,
                input.elem_size * 8
            ));
        }
        let level = inputs
            .get("brightness_level")
            .and_then(|l| l.as_f64())
            .ok_or("missing input: brightness_level")?;

        log.line(format!("brightness_level = {}, num_threads = {}", level, threads));
        let start = Instant::now();
        let output = brighten(&input, level);
        let time_usec = start.elapsed().as_secs_f64() * 1e6;

        let encoded = output.to_wire(WireForm::Raw).map_err(|e| e.to_string())?;
        Ok(json!({
            "outputs": { OUTPUT_NAME: encoded },
            "time_usec": time_usec
        }))
    }
}

impl VerbHandler for Brighten {
    fn handle(
        &mut self,
        verb: &str,
        data: &serde_json::Value,
        log: &mut ModuleLog,
    ) -> Result<serde_json::Value, String> {
        match verb {
            DESCRIBE_VERB => Ok(json!({ "description": Self::description().to_string() })),
            CALL_VERB => self.call(data, log),
            other => Err(unknown_verb(other)),
        }
    }
}

/// Scale every sample by `level`, saturating at 255
pub fn brighten(input: &Buffer, level: f64) -> Buffer {
    let host = input
        .host
        .iter()
        .map(|&sample| (sample as f64 * level).clamp(0.0, 255.0) as u8)
        .collect();
    Buffer {
        host,
        ..input.clone()
    }
}
