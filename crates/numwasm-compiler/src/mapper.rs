//! Type mapper: declaration annotations to semantic types.
//!
//! Resolution order, first success wins:
//!
//! 1. native names and primitive markers (`float`, `int`, `f64`, ...)
//! 2. an already-resolved [`SemanticType`] (pass-through)
//! 3. the array marker `ndarray[rank, element]`
//! 4. raw dtype names and typestrings (`float64`, `<u4`, `|b1`, ...)
//!
//! Resolution is pure: equal annotations always yield equal types.

use numwasm_types::kernel::KernelDecl;
use numwasm_types::{
    Annotation, FunctionSignature, ScalarKind, ScalarType, SemanticType, TypeMappingError,
};

/// Resolve one annotation.
pub fn resolve(annotation: &Annotation) -> Result<SemanticType, TypeMappingError> {
    if let Some(ty) = resolve_native(annotation) {
        return Ok(ty);
    }
    if let Annotation::Semantic { ty } = annotation {
        return pass_through(annotation, *ty);
    }
    if let Annotation::Array { rank, element } = annotation {
        return resolve_array(annotation, *rank, element.as_deref());
    }
    if let Annotation::Name { name } = annotation {
        if let Some(scalar) = resolve_dtype(name) {
            return Ok(SemanticType::Scalar(scalar));
        }
    }
    Err(unknown(annotation))
}

/// Resolve every parameter and the return annotation of `decl`.
///
/// Errors name the offending parameter (`return` for the return value).
pub fn resolve_signature(decl: &KernelDecl) -> Result<FunctionSignature, TypeMappingError> {
    let mut params = Vec::with_capacity(decl.params.len());
    for param in &decl.params {
        let ty = resolve(&param.annotation).map_err(|e| e.for_parameter(&param.name))?;
        if ty.is_void() {
            return Err(unknown(&param.annotation).for_parameter(&param.name));
        }
        params.push(ty);
    }
    let ret = match &decl.ret {
        Some(annotation) => resolve(annotation).map_err(|e| e.for_parameter("return"))?,
        None => SemanticType::Void,
    };
    Ok(FunctionSignature::new(params, ret))
}

fn unknown(annotation: &Annotation) -> TypeMappingError {
    TypeMappingError::new(annotation.to_string())
}

// ── Step 1: native ───────────────────────────────────────────────────────────

fn resolve_native(annotation: &Annotation) -> Option<SemanticType> {
    match annotation {
        Annotation::Primitive { marker } => Some(match marker.scalar() {
            Some(scalar) => SemanticType::Scalar(scalar),
            None => SemanticType::Void,
        }),
        Annotation::Name { name } => match name.as_str() {
            "float" => Some(SemanticType::Scalar(ScalarType::F64)),
            "int" => Some(SemanticType::Scalar(ScalarType::I64)),
            "bool" => Some(SemanticType::Scalar(ScalarType::BOOL)),
            "None" | "void" => Some(SemanticType::Void),
            _ => None,
        },
        _ => None,
    }
}

// ── Step 2: pass-through ─────────────────────────────────────────────────────

fn pass_through(annotation: &Annotation, ty: SemanticType) -> Result<SemanticType, TypeMappingError> {
    let valid = match ty {
        SemanticType::Scalar(s) => s.is_valid(),
        SemanticType::Array { element, .. } => element.is_valid(),
        SemanticType::Void => true,
    };
    if valid {
        Ok(ty)
    } else {
        Err(unknown(annotation))
    }
}

// ── Step 3: array marker ─────────────────────────────────────────────────────

fn resolve_array(
    annotation: &Annotation,
    rank: Option<u32>,
    element: Option<&Annotation>,
) -> Result<SemanticType, TypeMappingError> {
    let (Some(rank), Some(element)) = (rank, element) else {
        return Err(unknown(annotation));
    };
    match resolve(element) {
        Ok(SemanticType::Scalar(scalar)) => Ok(SemanticType::array(scalar, rank)),
        _ => Err(unknown(annotation)),
    }
}

// ── Step 4: raw dtype ────────────────────────────────────────────────────────

fn resolve_dtype(name: &str) -> Option<ScalarType> {
    let named = match name {
        "float64" | "double" => Some(ScalarType::F64),
        "float32" | "single" => Some(ScalarType::F32),
        "int8" => Some(ScalarType::I8),
        "int16" => Some(ScalarType::I16),
        "int32" => Some(ScalarType::I32),
        "int64" | "intp" => Some(ScalarType::I64),
        "uint8" => Some(ScalarType::U8),
        "uint16" => Some(ScalarType::U16),
        "uint32" => Some(ScalarType::U32),
        "uint64" | "uintp" => Some(ScalarType::U64),
        "bool_" | "bool8" => Some(ScalarType::BOOL),
        _ => None,
    };
    named.or_else(|| resolve_typestr(name))
}

/// Numpy typestrings: optional byte order, kind code, byte size.
/// Big-endian layouts are not representable in sandbox memory.
fn resolve_typestr(s: &str) -> Option<ScalarType> {
    let body = s
        .strip_prefix('<')
        .or_else(|| s.strip_prefix('|'))
        .or_else(|| s.strip_prefix('='))
        .unwrap_or(s);
    let mut chars = body.chars();
    let kind = match chars.next()? {
        'f' => ScalarKind::Float,
        'i' => ScalarKind::Int,
        'u' => ScalarKind::UInt,
        'b' => ScalarKind::Bool,
        _ => return None,
    };
    let bytes: u8 = chars.as_str().parse().ok()?;
    let scalar = ScalarType::new(kind, bytes.checked_mul(8)?);
    scalar.is_valid().then_some(scalar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use numwasm_types::Primitive;

    #[test]
    fn native_names_first() {
        assert_eq!(
            resolve(&Annotation::name("float")).unwrap(),
            SemanticType::Scalar(ScalarType::F64)
        );
        assert_eq!(resolve(&Annotation::name("None")).unwrap(), SemanticType::Void);
        assert_eq!(
            resolve(&Annotation::primitive(Primitive::U32)).unwrap(),
            SemanticType::Scalar(ScalarType::U32)
        );
    }

    #[test]
    fn dtype_names_and_typestrings() {
        for (name, expected) in [
            ("float64", ScalarType::F64),
            ("<f8", ScalarType::F64),
            ("f4", ScalarType::F32),
            ("<u4", ScalarType::U32),
            ("|b1", ScalarType::BOOL),
            ("i8", ScalarType::I64),
            ("|u1", ScalarType::U8),
            ("uint32", ScalarType::U32),
        ] {
            assert_eq!(
                resolve(&Annotation::name(name)).unwrap(),
                SemanticType::Scalar(expected),
                "{name}"
            );
        }
    }

    #[test]
    fn unknown_dtypes_fail() {
        for name in [">f8", "f16", "complex128", "u3", "x4", ""] {
            let err = resolve(&Annotation::name(name)).unwrap_err();
            assert_eq!(err.annotation, name);
        }
    }

    #[test]
    fn array_marker_needs_rank_and_element() {
        assert_eq!(
            resolve(&Annotation::ndarray(1, Annotation::name("uint32"))).unwrap(),
            SemanticType::array(ScalarType::U32, 1)
        );
        assert!(resolve(&Annotation::bare_ndarray()).is_err());
        assert!(resolve(&Annotation::Array {
            rank: Some(2),
            element: None
        })
        .is_err());
        assert!(resolve(&Annotation::ndarray(1, Annotation::void())).is_err());
    }

    #[test]
    fn semantic_types_pass_through() {
        let ty = SemanticType::array(ScalarType::F32, 3);
        assert_eq!(resolve(&Annotation::semantic(ty)).unwrap(), ty);
        let bad = SemanticType::Scalar(ScalarType::new(ScalarKind::Float, 16));
        assert!(resolve(&Annotation::semantic(bad)).is_err());
    }

    #[test]
    fn signature_errors_name_the_parameter() {
        let decl = KernelDecl::new("m", "f")
            .param("ok", Annotation::f64())
            .param("bad", Annotation::name("quaternion"));
        let err = resolve_signature(&decl).unwrap_err();
        assert_eq!(err.parameter.as_deref(), Some("bad"));
        assert!(err.to_string().contains("quaternion"));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn missing_return_is_void() {
        let decl = KernelDecl::new("m", "f").param("a", Annotation::u32());
        let sig = resolve_signature(&decl).unwrap();
        assert_eq!(sig.ret(), SemanticType::Void);
        assert_eq!(sig.params(), &[SemanticType::Scalar(ScalarType::U32)]);
    }
}
