//! Raw values crossing the bridge.

use std::fmt;

use numwasm_compiler::lower::scalar_ir;
use numwasm_ir::IrType;
use numwasm_types::{ScalarType, ScalarValue};

/// A value as the sandbox sees it: one of the four machine types.
///
/// Descriptor pointers travel as `I32`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl RawValue {
    /// The machine representation of `value`.
    ///
    /// Narrow integers are sign- or zero-extended per their kind; bools
    /// become `0`/`1`.
    pub fn from_scalar(value: ScalarValue) -> Self {
        match scalar_ir(value.ty()) {
            IrType::I32 => Self::I32(value.as_i64() as i32),
            IrType::I64 => Self::I64(value.as_i64()),
            IrType::F32 => Self::F32(value.as_f64() as f32),
            IrType::F64 => Self::F64(value.as_f64()),
        }
    }

    /// A descriptor or data pointer.
    pub fn pointer(ptr: u32) -> Self {
        Self::I32(ptr as i32)
    }

    /// Reinterpret as a scalar of `ty`, truncating integers to its width.
    pub fn to_scalar(self, ty: ScalarType) -> ScalarValue {
        let bits = match self {
            Self::I32(v) => u64::from(v as u32),
            Self::I64(v) => v as u64,
            Self::F32(v) => u64::from(v.to_bits()),
            Self::F64(v) => v.to_bits(),
        };
        ScalarValue::from_bits(ty, bits)
    }

    pub fn as_pointer(self) -> Option<u32> {
        match self {
            Self::I32(v) => Some(v as u32),
            _ => None,
        }
    }

    pub fn ir_type(self) -> IrType {
        match self {
            Self::I32(_) => IrType::I32,
            Self::I64(_) => IrType::I64,
            Self::F32(_) => IrType::F32,
            Self::F64(_) => IrType::F64,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "i32:{v}"),
            Self::I64(v) => write!(f, "i64:{v}"),
            Self::F32(v) => write!(f, "f32:{v}"),
            Self::F64(v) => write!(f, "f64:{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_integers_extend_by_kind() {
        assert_eq!(RawValue::from_scalar(ScalarValue::I8(-1)), RawValue::I32(-1));
        assert_eq!(RawValue::from_scalar(ScalarValue::U8(255)), RawValue::I32(255));
        assert_eq!(RawValue::from_scalar(ScalarValue::Bool(true)), RawValue::I32(1));
        assert_eq!(
            RawValue::from_scalar(ScalarValue::U32(u32::MAX)),
            RawValue::I32(-1)
        );
    }

    #[test]
    fn results_take_the_declared_type() {
        assert_eq!(RawValue::I32(-1).to_scalar(ScalarType::U32), ScalarValue::U32(u32::MAX));
        assert_eq!(RawValue::I32(300).to_scalar(ScalarType::U8), ScalarValue::U8(44));
        assert_eq!(RawValue::F64(9.0).to_scalar(ScalarType::F64), ScalarValue::F64(9.0));
        assert_eq!(RawValue::I64(-5).to_scalar(ScalarType::I64), ScalarValue::I64(-5));
    }
}
