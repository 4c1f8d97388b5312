//! Resolved semantic types.
//!
//! [`SemanticType`] is what an [`Annotation`](crate::Annotation) resolves to.
//! Every codegen step works on fully resolved types: an array type always
//! carries its element type and rank.

use serde::{Deserialize, Serialize};
use std::fmt;

// ══════════════════════════════════════════════════════════════════════════════
// Scalars
// ══════════════════════════════════════════════════════════════════════════════

/// The numeric family of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Int,
    UInt,
    Float,
    Bool,
}

/// A scalar type: numeric family plus bit width.
///
/// Bools are stored as one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarType {
    pub kind: ScalarKind,
    pub width: u8,
}

impl ScalarType {
    pub const I8: Self = Self::new(ScalarKind::Int, 8);
    pub const I16: Self = Self::new(ScalarKind::Int, 16);
    pub const I32: Self = Self::new(ScalarKind::Int, 32);
    pub const I64: Self = Self::new(ScalarKind::Int, 64);
    pub const U8: Self = Self::new(ScalarKind::UInt, 8);
    pub const U16: Self = Self::new(ScalarKind::UInt, 16);
    pub const U32: Self = Self::new(ScalarKind::UInt, 32);
    pub const U64: Self = Self::new(ScalarKind::UInt, 64);
    pub const F32: Self = Self::new(ScalarKind::Float, 32);
    pub const F64: Self = Self::new(ScalarKind::Float, 64);
    pub const BOOL: Self = Self::new(ScalarKind::Bool, 8);

    pub const fn new(kind: ScalarKind, width: u8) -> Self {
        Self { kind, width }
    }

    /// Whether `(kind, width)` names a representable scalar.
    pub fn is_valid(self) -> bool {
        match self.kind {
            ScalarKind::Int | ScalarKind::UInt => matches!(self.width, 8 | 16 | 32 | 64),
            ScalarKind::Float => matches!(self.width, 32 | 64),
            ScalarKind::Bool => self.width == 8,
        }
    }

    /// Storage size of one element in bytes.
    pub fn byte_size(self) -> u32 {
        u32::from(self.width) / 8
    }

    pub fn is_float(self) -> bool {
        self.kind == ScalarKind::Float
    }

    /// Signed or unsigned integer (bools excluded).
    pub fn is_integer(self) -> bool {
        matches!(self.kind, ScalarKind::Int | ScalarKind::UInt)
    }

    pub fn is_signed(self) -> bool {
        matches!(self.kind, ScalarKind::Int | ScalarKind::Float)
    }

    pub fn is_bool(self) -> bool {
        self.kind == ScalarKind::Bool
    }

    /// Numpy-style typestring (`<f8`, `<u4`, `|b1`, ...).
    pub fn typestr(self) -> String {
        let code = match self.kind {
            ScalarKind::Int => 'i',
            ScalarKind::UInt => 'u',
            ScalarKind::Float => 'f',
            ScalarKind::Bool => 'b',
        };
        let order = if self.byte_size() == 1 { '|' } else { '<' };
        format!("{order}{code}{}", self.byte_size())
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScalarKind::Int => write!(f, "i{}", self.width),
            ScalarKind::UInt => write!(f, "u{}", self.width),
            ScalarKind::Float => write!(f, "f{}", self.width),
            ScalarKind::Bool => write!(f, "bool"),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// SemanticType
// ══════════════════════════════════════════════════════════════════════════════

/// A fully resolved type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SemanticType {
    Scalar(ScalarType),
    /// C-contiguous array of `element` with `rank` dimensions.
    Array { element: ScalarType, rank: u32 },
    Void,
}

impl SemanticType {
    pub fn array(element: ScalarType, rank: u32) -> Self {
        Self::Array { element, rank }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn as_scalar(&self) -> Option<ScalarType> {
        match self {
            Self::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// `(element, rank)` for array types.
    pub fn as_array(&self) -> Option<(ScalarType, u32)> {
        match self {
            Self::Array { element, rank } => Some((*element, *rank)),
            _ => None,
        }
    }
}

impl From<ScalarType> for SemanticType {
    fn from(s: ScalarType) -> Self {
        Self::Scalar(s)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Array { element, rank } => write!(f, "array({element}, {rank}d, C)"),
            Self::Void => write!(f, "void"),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// FunctionSignature
// ══════════════════════════════════════════════════════════════════════════════

/// Parameter types plus return type, derived once from a declaration.
///
/// There are no mutators: a signature never changes after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionSignature {
    params: Vec<SemanticType>,
    ret: SemanticType,
}

impl FunctionSignature {
    pub fn new(params: Vec<SemanticType>, ret: SemanticType) -> Self {
        Self { params, ret }
    }

    pub fn params(&self) -> &[SemanticType] {
        &self.params
    }

    pub fn ret(&self) -> SemanticType {
        self.ret
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// True when any parameter or the return value is an array.
    pub fn touches_arrays(&self) -> bool {
        self.ret.is_array() || self.params.iter().any(SemanticType::is_array)
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.ret)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")")
    }
}
