//! Declaration-level type annotations.
//!
//! An [`Annotation`] is what declaring code writes next to a parameter or
//! return value. It is *syntactic*: the compiler's type mapper turns it into a
//! [`SemanticType`](crate::SemanticType), and may fail to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ty::{ScalarType, SemanticType};

/// Primitive scalar type markers understood without any lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
    Void,
}

impl Primitive {
    /// The scalar this marker stands for (`None` for the void marker).
    pub fn scalar(self) -> Option<ScalarType> {
        Some(match self {
            Self::F32 => ScalarType::F32,
            Self::F64 => ScalarType::F64,
            Self::I8 => ScalarType::I8,
            Self::I16 => ScalarType::I16,
            Self::I32 => ScalarType::I32,
            Self::I64 => ScalarType::I64,
            Self::U8 => ScalarType::U8,
            Self::U16 => ScalarType::U16,
            Self::U32 => ScalarType::U32,
            Self::U64 => ScalarType::U64,
            Self::Bool => ScalarType::BOOL,
            Self::Void => return None,
        })
    }
}

/// A parameter or return annotation as written by declaring code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    /// A primitive scalar marker (`f64`, `u32`, ...).
    Primitive { marker: Primitive },
    /// An already-resolved type, passed through unchanged.
    Semantic { ty: SemanticType },
    /// `ndarray[rank, element]`. Either half may be missing, in which case
    /// the annotation cannot be resolved.
    Array {
        rank: Option<u32>,
        element: Option<Box<Annotation>>,
    },
    /// A name: a native type name (`float`, `int`) or a raw dtype
    /// (`float64`, `<u4`, ...).
    Name { name: String },
}

impl Annotation {
    pub fn primitive(marker: Primitive) -> Self {
        Self::Primitive { marker }
    }

    pub fn f64() -> Self {
        Self::primitive(Primitive::F64)
    }

    pub fn u32() -> Self {
        Self::primitive(Primitive::U32)
    }

    pub fn i64() -> Self {
        Self::primitive(Primitive::I64)
    }

    pub fn void() -> Self {
        Self::primitive(Primitive::Void)
    }

    pub fn semantic(ty: SemanticType) -> Self {
        Self::Semantic { ty }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Name { name: name.into() }
    }

    /// `ndarray[rank, element]`.
    pub fn ndarray(rank: u32, element: Annotation) -> Self {
        Self::Array {
            rank: Some(rank),
            element: Some(Box::new(element)),
        }
    }

    /// A bare `ndarray` without rank or element type.
    pub fn bare_ndarray() -> Self {
        Self::Array {
            rank: None,
            element: None,
        }
    }

    /// Whether the annotation is an array marker.
    pub fn is_array_marker(&self) -> bool {
        matches!(self, Self::Array { .. })
            || matches!(self, Self::Semantic { ty } if ty.is_array())
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { marker } => match marker.scalar() {
                Some(s) => write!(f, "{s}"),
                None => write!(f, "void"),
            },
            Self::Semantic { ty } => write!(f, "{ty}"),
            Self::Array { rank, element } => {
                write!(f, "ndarray[")?;
                match rank {
                    Some(r) => write!(f, "{r}")?,
                    None => write!(f, "?")?,
                }
                write!(f, ", ")?;
                match element {
                    Some(e) => write!(f, "{e}")?,
                    None => write!(f, "?")?,
                }
                write!(f, "]")
            }
            Self::Name { name } => write!(f, "{name}"),
        }
    }
}
