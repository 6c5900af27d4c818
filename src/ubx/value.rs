//! Typed configuration values and the two-part geodetic encoding.
//!
//! Geodetic quantities travel as a coarse integer (centimeters, or
//! ten-millionths of a degree) plus a signed high-precision residual in
//! hundredths of the coarse unit (0.1 mm, or billionths of a degree).
//! Splitting verifies the value actually fits that grid: the round-trip
//! error must stay below [`SPLIT_EPSILON`] of the coarse unit, otherwise
//! the value is rejected before anything is written to the receiver.

use crate::error::{MuxError, Result};
use crate::ubx::keys::ValueKind;
use bytes::BufMut;

/// One typed configuration value, matching its key's [`ValueKind`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CfgValue {
    Bool(bool),
    U1(u8),
    I1(i8),
    U2(u16),
    I2(i16),
    U4(u32),
    I4(i32),
    U8(u64),
}

impl CfgValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            CfgValue::Bool(_) => ValueKind::Bool,
            CfgValue::U1(_) => ValueKind::U1,
            CfgValue::I1(_) => ValueKind::I1,
            CfgValue::U2(_) => ValueKind::U2,
            CfgValue::I2(_) => ValueKind::I2,
            CfgValue::U4(_) => ValueKind::U4,
            CfgValue::I4(_) => ValueKind::I4,
            CfgValue::U8(_) => ValueKind::U8,
        }
    }

    /// Append the little-endian wire form.
    pub fn encode(&self, out: &mut impl BufMut) {
        match *self {
            CfgValue::Bool(v) => out.put_u8(v as u8),
            CfgValue::U1(v) => out.put_u8(v),
            CfgValue::I1(v) => out.put_i8(v),
            CfgValue::U2(v) => out.put_u16_le(v),
            CfgValue::I2(v) => out.put_i16_le(v),
            CfgValue::U4(v) => out.put_u32_le(v),
            CfgValue::I4(v) => out.put_i32_le(v),
            CfgValue::U8(v) => out.put_u64_le(v),
        }
    }

    /// Decode a value of the given kind from exactly `kind.wire_size()` bytes.
    pub fn decode(kind: ValueKind, raw: &[u8]) -> Result<Self> {
        if raw.len() != kind.wire_size() {
            return Err(MuxError::config(format!(
                "value size mismatch: {:?} expects {} bytes, got {}",
                kind,
                kind.wire_size(),
                raw.len()
            )));
        }

        let le4 = |raw: &[u8]| [raw[0], raw[1], raw[2], raw[3]];
        Ok(match kind {
            ValueKind::Bool => CfgValue::Bool(raw[0] != 0),
            ValueKind::U1 => CfgValue::U1(raw[0]),
            ValueKind::I1 => CfgValue::I1(raw[0] as i8),
            ValueKind::U2 => CfgValue::U2(u16::from_le_bytes([raw[0], raw[1]])),
            ValueKind::I2 => CfgValue::I2(i16::from_le_bytes([raw[0], raw[1]])),
            ValueKind::U4 => CfgValue::U4(u32::from_le_bytes(le4(raw))),
            ValueKind::I4 => CfgValue::I4(i32::from_le_bytes(le4(raw))),
            ValueKind::U8 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(raw);
                CfgValue::U8(u64::from_le_bytes(b))
            }
        })
    }
}

/// Maximum tolerated round-trip error, as a fraction of the coarse unit.
pub const SPLIT_EPSILON: f64 = 1e-5;

/// A geodetic value in two parts: coarse unit plus residual in hundredths
/// of that unit (the receiver's `*_HP` companion key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitCoord {
    pub coarse: i32,
    pub hp: i8,
}

/// Split `value` (in coarse units) into coarse + high-precision parts.
///
/// Fails with [`MuxError::Precision`] if the value does not sit on the
/// hundredth-of-a-unit grid within [`SPLIT_EPSILON`], or overflows the
/// coarse range.
pub fn split_units(value: f64) -> Result<SplitCoord> {
    let scaled = value * 100.0;
    if !scaled.is_finite() || scaled.abs() >= (i32::MAX as f64) * 100.0 {
        return Err(MuxError::Precision {
            value,
            residual: f64::INFINITY,
        });
    }

    let total = scaled.round();
    let residual = (scaled - total).abs() / 100.0;
    if residual >= SPLIT_EPSILON {
        return Err(MuxError::Precision { value, residual });
    }

    let total = total as i64;
    let coarse = total / 100;
    let hp = (total % 100) as i8;
    Ok(SplitCoord {
        coarse: coarse as i32,
        hp,
    })
}

/// Inverse of [`split_units`].
pub fn merge_units(coarse: i32, hp: i8) -> f64 {
    coarse as f64 + hp as f64 / 100.0
}

/// Split a latitude/longitude in degrees (coarse unit: 1e-7 degrees,
/// residual: 1e-9 degrees).
pub fn split_degrees(degrees: f64) -> Result<SplitCoord> {
    split_units(degrees * 1e7)
}

pub fn merge_degrees(coarse: i32, hp: i8) -> f64 {
    merge_units(coarse, hp) * 1e-7
}

/// Split a length in meters (coarse unit: centimeters, residual: 0.1 mm).
pub fn split_meters(meters: f64) -> Result<SplitCoord> {
    split_units(meters * 100.0)
}

pub fn merge_meters(coarse: i32, hp: i8) -> f64 {
    merge_units(coarse, hp) / 100.0
}
