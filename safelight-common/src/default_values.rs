//! Default input buffers
//!
//! Synthesizes plausible, deterministic sample data for input buffers the
//! user has not supplied. Layout is always planar (`stride[0] == 1`), with
//! four channels:
//! - channel 0: horizontal ramp
//! - channel 1: vertical ramp
//! - channel 2: angular sweep offset by the seed
//! - channel 3: full scale

use std::f64::consts::PI;

use crate::argument::{Argument, TypeCode};
use crate::buffer::Buffer;

/// Largest width or height of a synthesized buffer
pub const MAX_SIDE_LENGTH: i32 = 4096;

/// Element type of a buffer, selected once from `type_code` + `type_bits`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F32,
    F64,
}

impl SampleType {
    pub fn from_type(type_code: TypeCode, type_bits: u32) -> Option<Self> {
        match (type_code, type_bits) {
            (TypeCode::Uint, 8) => Some(Self::U8),
            (TypeCode::Uint, 16) => Some(Self::U16),
            (TypeCode::Uint, 32) => Some(Self::U32),
            (TypeCode::Int, 8) => Some(Self::I8),
            (TypeCode::Int, 16) => Some(Self::I16),
            (TypeCode::Int, 32) => Some(Self::I32),
            (TypeCode::Float, 32) => Some(Self::F32),
            (TypeCode::Float, 64) => Some(Self::F64),
            _ => None,
        }
    }

    /// Bytes per element
    pub fn size(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Full-scale component value
    pub fn max_value(&self) -> f64 {
        match self {
            Self::U8 => 255.0,
            Self::U16 => 65535.0,
            Self::U32 => 4294967295.0,
            Self::I8 => 127.0,
            Self::I16 | Self::I32 => 255.0,
            Self::F32 | Self::F64 => 1.0,
        }
    }

    /// Store `v` at element `index`, little-endian
    ///
    /// Integer stores truncate toward zero and wrap to the element width.
    fn store(&self, host: &mut [u8], index: usize, v: f64) {
        let offset = index * self.size();
        let Some(slot) = host.get_mut(offset..offset + self.size()) else {
            return;
        };
        let truncated = v as i64;
        match self {
            Self::U8 => slot.copy_from_slice(&(truncated as u8).to_le_bytes()),
            Self::U16 => slot.copy_from_slice(&(truncated as u16).to_le_bytes()),
            Self::U32 => slot.copy_from_slice(&(truncated as u32).to_le_bytes()),
            Self::I8 => slot.copy_from_slice(&(truncated as i8).to_le_bytes()),
            Self::I16 => slot.copy_from_slice(&(truncated as i16).to_le_bytes()),
            Self::I32 => slot.copy_from_slice(&(truncated as i32).to_le_bytes()),
            Self::F32 => slot.copy_from_slice(&(v as f32).to_le_bytes()),
            Self::F64 => slot.copy_from_slice(&v.to_le_bytes()),
        }
    }
}

/// Build a `w` x `h` x 4 planar buffer matching `argument`'s type
///
/// Pure and deterministic: the same inputs always yield the same bytes.
/// Types without a [`SampleType`] get a zero-filled host. Sides are
/// clamped to `0..=MAX_SIDE_LENGTH`.
pub fn make_input_buffer(argument: &Argument, w: i32, h: i32, seed: u32) -> Buffer {
    let w = w.clamp(0, MAX_SIDE_LENGTH);
    let h = h.clamp(0, MAX_SIDE_LENGTH);
    let dims = argument.dimensions.min(4) as usize;
    let mut b = Buffer {
        elem_size: (argument.type_bits / 8) as i32,
        type_code: argument.type_code,
        dimensions: argument.dimensions as i32,
        extent: [w, h, 4, 1],
        ..Buffer::default()
    };
    b.extent[dims..].fill(0);

    let mut storage = b.elem_size.max(0) as usize;
    for i in 0..dims {
        storage = storage.saturating_mul(b.extent[i].max(0) as usize);
        b.stride[i] = if i == 0 {
            1
        } else {
            b.stride[i - 1].checked_mul(b.extent[i - 1]).unwrap_or(0)
        };
    }
    b.host = vec![0; storage];

    if let Some(sample_type) = SampleType::from_type(argument.type_code, argument.type_bits) {
        fill_channels(&mut b, sample_type, seed);
    }
    b
}

fn fill_channels(b: &mut Buffer, sample_type: SampleType, seed: u32) {
    let max = sample_type.max_value();
    let extent = b.extent.map(|e| e.max(1) as i64);
    let stride = b.stride.map(|s| s as i64);
    let seed = seed as f64;

    let mut i0 = 0i64;
    for a in 0..extent[0] {
        let mut i1 = i0;
        for y in 0..extent[1] {
            let mut i2 = i1;
            for c in 0..extent[2] {
                let v = match c {
                    0 => a as f64 * max / extent[0] as f64,
                    1 => y as f64 * max / extent[1] as f64,
                    2 => ((y as f64).atan2(a as f64) + seed) * max / PI,
                    _ => max,
                };
                let mut i3 = i2;
                for _ in 0..extent[3] {
                    if i3 >= 0 {
                        sample_type.store(&mut b.host, i3 as usize, v);
                    }
                    i3 += stride[3];
                }
                i2 += stride[2];
            }
            i1 += stride[1];
        }
        i0 += stride[0];
    }
}
