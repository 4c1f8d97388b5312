//! Typed scalar values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ty::{ScalarKind, ScalarType};

/// A scalar value tagged with its exact type.
///
/// Integers narrower than 64 bits are kept wrapped to their width so that two
/// values of the same type compare equal exactly when their bits do.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ScalarValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
}

impl ScalarValue {
    pub fn ty(&self) -> ScalarType {
        match self {
            Self::I8(_) => ScalarType::I8,
            Self::I16(_) => ScalarType::I16,
            Self::I32(_) => ScalarType::I32,
            Self::I64(_) => ScalarType::I64,
            Self::U8(_) => ScalarType::U8,
            Self::U16(_) => ScalarType::U16,
            Self::U32(_) => ScalarType::U32,
            Self::U64(_) => ScalarType::U64,
            Self::F32(_) => ScalarType::F32,
            Self::F64(_) => ScalarType::F64,
            Self::Bool(_) => ScalarType::BOOL,
        }
    }

    /// The all-zero value of `ty`.
    pub fn zero(ty: ScalarType) -> Self {
        Self::from_bits(ty, 0)
    }

    /// Reinterpret the low bits of `bits` as a value of `ty`.
    ///
    /// Floats are read from their IEEE bit patterns; integers are truncated.
    pub fn from_bits(ty: ScalarType, bits: u64) -> Self {
        match (ty.kind, ty.width) {
            (ScalarKind::Int, 8) => Self::I8(bits as i8),
            (ScalarKind::Int, 16) => Self::I16(bits as i16),
            (ScalarKind::Int, 32) => Self::I32(bits as i32),
            (ScalarKind::UInt, 8) => Self::U8(bits as u8),
            (ScalarKind::UInt, 16) => Self::U16(bits as u16),
            (ScalarKind::UInt, 32) => Self::U32(bits as u32),
            (ScalarKind::UInt, _) => Self::U64(bits),
            (ScalarKind::Float, 32) => Self::F32(f32::from_bits(bits as u32)),
            (ScalarKind::Float, _) => Self::F64(f64::from_bits(bits)),
            (ScalarKind::Bool, _) => Self::Bool(bits & 0xFF != 0),
            (ScalarKind::Int, _) => Self::I64(bits as i64),
        }
    }

    /// The raw bit pattern, zero-extended to 64 bits.
    pub fn to_bits(&self) -> u64 {
        match *self {
            Self::I8(v) => v as u8 as u64,
            Self::I16(v) => v as u16 as u64,
            Self::I32(v) => v as u32 as u64,
            Self::I64(v) => v as u64,
            Self::U8(v) => v as u64,
            Self::U16(v) => v as u64,
            Self::U32(v) => v as u64,
            Self::U64(v) => v,
            Self::F32(v) => v.to_bits() as u64,
            Self::F64(v) => v.to_bits(),
            Self::Bool(v) => v as u64,
        }
    }

    /// Little-endian storage bytes (`ty().byte_size()` long).
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let size = self.ty().byte_size() as usize;
        self.to_bits().to_le_bytes()[..size].to_vec()
    }

    /// Decode from little-endian storage bytes.
    pub fn from_le_bytes(ty: ScalarType, bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        let n = (ty.byte_size() as usize).min(bytes.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Self::from_bits(ty, u64::from_le_bytes(buf))
    }

    /// Lossy view as `f64` (for floats and for mixed-type reporting).
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::I8(v) => v as f64,
            Self::I16(v) => v as f64,
            Self::I32(v) => v as f64,
            Self::I64(v) => v as f64,
            Self::U8(v) => v as f64,
            Self::U16(v) => v as f64,
            Self::U32(v) => v as f64,
            Self::U64(v) => v as f64,
            Self::F32(v) => v as f64,
            Self::F64(v) => v,
            Self::Bool(v) => v as u8 as f64,
        }
    }

    /// Integer view, sign-extended for signed kinds. Floats truncate.
    pub fn as_i64(&self) -> i64 {
        match *self {
            Self::I8(v) => v as i64,
            Self::I16(v) => v as i64,
            Self::I32(v) => v as i64,
            Self::I64(v) => v,
            Self::U8(v) => v as i64,
            Self::U16(v) => v as i64,
            Self::U32(v) => v as i64,
            Self::U64(v) => v as i64,
            Self::F32(v) => v as i64,
            Self::F64(v) => v as i64,
            Self::Bool(v) => v as i64,
        }
    }

    pub fn as_bool(&self) -> bool {
        match *self {
            Self::Bool(b) => b,
            Self::F32(v) => v != 0.0,
            Self::F64(v) => v != 0.0,
            _ => self.to_bits() != 0,
        }
    }

    /// Convert to `ty` with numeric (not bitwise) semantics.
    pub fn cast(&self, ty: ScalarType) -> Self {
        match ty.kind {
            ScalarKind::Float if ty.width == 32 => Self::F32(self.as_f64() as f32),
            ScalarKind::Float => Self::F64(self.as_f64()),
            ScalarKind::Bool => Self::Bool(self.as_bool()),
            ScalarKind::Int | ScalarKind::UInt => {
                let wide = if self.ty().is_float() {
                    // Saturate at the 32- or 64-bit word the value is held
                    // in (NaN is 0), then wrap to the declared width.
                    let f = self.as_f64();
                    match (ty.kind, ty.width) {
                        (ScalarKind::Int, 64) => f as i64 as u64,
                        (ScalarKind::UInt, 64) => f as u64,
                        (ScalarKind::Int, _) => f as i32 as u64,
                        _ => u64::from(f as u32),
                    }
                } else {
                    self.as_i64() as u64
                };
                Self::from_bits(ty, wide)
            }
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v:?}"),
            Self::F64(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}
