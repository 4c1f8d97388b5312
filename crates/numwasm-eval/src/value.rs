//! Runtime values.
//!
//! Scalars are plain [`ScalarValue`]s. Arrays are shared, mutable, row-major
//! [`HostArray`]s behind an [`ArrayRef`]: cloning a [`Value::Array`] aliases
//! the data, which is how kernels see arrays passed to them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use numwasm_types::{ScalarType, ScalarValue, SemanticType};

use crate::error::{EvalError, EvalResult};

/// Shared handle to a host array.
pub type ArrayRef = Rc<RefCell<HostArray>>;

// ══════════════════════════════════════════════════════════════════════════════
// HostArray
// ══════════════════════════════════════════════════════════════════════════════

/// A C-contiguous array living in host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray {
    element: ScalarType,
    shape: Vec<usize>,
    data: Vec<ScalarValue>,
}

impl HostArray {
    /// A zero-filled array.
    pub fn zeros(element: ScalarType, shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            element,
            shape,
            data: vec![ScalarValue::zero(element); len],
        }
    }

    /// An array over `values` in row-major order.
    ///
    /// Every value must already have type `element`.
    pub fn from_values(
        element: ScalarType,
        shape: Vec<usize>,
        values: Vec<ScalarValue>,
    ) -> EvalResult<Self> {
        let len: usize = shape.iter().product();
        if values.len() != len {
            return Err(EvalError::TypeMismatch(format!(
                "{} value(s) given for shape {shape:?}",
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| v.ty() != element) {
            return Err(EvalError::TypeMismatch(format!(
                "{bad} is not a {element} element"
            )));
        }
        Ok(Self {
            element,
            shape,
            data: values,
        })
    }

    /// A one-dimensional array over `values`.
    pub fn vector(element: ScalarType, values: Vec<ScalarValue>) -> EvalResult<Self> {
        let len = values.len();
        Self::from_values(element, vec![len], values)
    }

    /// Decode little-endian element storage.
    pub fn from_le_bytes(element: ScalarType, shape: Vec<usize>, bytes: &[u8]) -> EvalResult<Self> {
        let size = element.byte_size() as usize;
        let len: usize = shape.iter().product();
        if bytes.len() != len * size {
            return Err(EvalError::TypeMismatch(format!(
                "{} byte(s) given for {len} {element} element(s)",
                bytes.len()
            )));
        }
        let data = bytes
            .chunks_exact(size)
            .map(|chunk| ScalarValue::from_le_bytes(element, chunk))
            .collect();
        Ok(Self {
            element,
            shape,
            data,
        })
    }

    /// Element storage as little-endian bytes, row-major.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(ScalarValue::to_le_bytes).collect()
    }

    pub fn element(&self) -> ScalarType {
        self.element
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> u32 {
        self.shape.len() as u32
    }

    /// Total element count.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.data
    }

    pub fn semantic_type(&self) -> SemanticType {
        SemanticType::array(self.element, self.rank())
    }

    /// Row-major flat offset of `index`.
    pub fn flat_index(&self, index: &[i64]) -> EvalResult<usize> {
        if index.len() != self.shape.len() {
            return Err(EvalError::IndexOutOfBounds(format!(
                "{} index(es) for rank-{} array",
                index.len(),
                self.shape.len()
            )));
        }
        let mut flat = 0usize;
        for (&i, &dim) in index.iter().zip(&self.shape) {
            if i < 0 || i as u64 >= dim as u64 {
                return Err(EvalError::IndexOutOfBounds(format!(
                    "index {i} for dimension of length {dim}"
                )));
            }
            flat = flat * dim + i as usize;
        }
        Ok(flat)
    }

    pub fn get(&self, index: &[i64]) -> EvalResult<ScalarValue> {
        let flat = self.flat_index(index)?;
        Ok(self.data[flat])
    }

    pub fn set(&mut self, index: &[i64], value: ScalarValue) -> EvalResult<()> {
        if value.ty() != self.element {
            return Err(EvalError::TypeMismatch(format!(
                "cannot store {} into a {} array",
                value.ty(),
                self.element
            )));
        }
        let flat = self.flat_index(index)?;
        self.data[flat] = value;
        Ok(())
    }

    /// Replace every element with `f(element)`. Stops at the first error,
    /// leaving earlier elements updated.
    pub fn update(
        &mut self,
        mut f: impl FnMut(ScalarValue) -> EvalResult<ScalarValue>,
    ) -> EvalResult<()> {
        for slot in &mut self.data {
            *slot = f(*slot)?;
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Value
// ══════════════════════════════════════════════════════════════════════════════

/// A kernel argument, local or result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(ScalarValue),
    Array(ArrayRef),
    Void,
}

impl Value {
    /// Wrap a fresh array.
    pub fn array(array: HostArray) -> Self {
        Self::Array(Rc::new(RefCell::new(array)))
    }

    pub fn semantic_type(&self) -> SemanticType {
        match self {
            Self::Scalar(v) => v.ty().into(),
            Self::Array(a) => a.borrow().semantic_type(),
            Self::Void => SemanticType::Void,
        }
    }

    pub fn as_scalar(&self) -> Option<ScalarValue> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }
}

impl From<ScalarValue> for Value {
    fn from(v: ScalarValue) -> Self {
        Self::Scalar(v)
    }
}

impl From<HostArray> for Value {
    fn from(a: HostArray) -> Self {
        Self::array(a)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Array(a) => {
                let a = a.borrow();
                write!(f, "{}{:?}", a.semantic_type(), a.shape())
            }
            Self::Void => f.write_str("void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_indexing() {
        let mut a = HostArray::zeros(ScalarType::I32, vec![2, 3]);
        a.set(&[1, 2], ScalarValue::I32(7)).unwrap();
        assert_eq!(a.flat_index(&[1, 2]).unwrap(), 5);
        assert_eq!(a.values()[5], ScalarValue::I32(7));
        assert!(matches!(
            a.get(&[2, 0]),
            Err(EvalError::IndexOutOfBounds(_))
        ));
        assert!(matches!(
            a.get(&[0, -1]),
            Err(EvalError::IndexOutOfBounds(_))
        ));
    }

    #[test]
    fn cloned_values_alias() {
        let a = Value::array(HostArray::zeros(ScalarType::F64, vec![2]));
        let b = a.clone();
        if let Some(arr) = b.as_array() {
            arr.borrow_mut().set(&[0], ScalarValue::F64(1.5)).unwrap();
        }
        assert_eq!(
            a.as_array().unwrap().borrow().values()[0],
            ScalarValue::F64(1.5)
        );
    }

    #[test]
    fn le_bytes_decode() {
        let bytes = [1u8, 0, 0, 0, 2, 0, 0, 0];
        let a = HostArray::from_le_bytes(ScalarType::U32, vec![2], &bytes).unwrap();
        assert_eq!(a.values(), &[ScalarValue::U32(1), ScalarValue::U32(2)]);
        assert_eq!(a.to_le_bytes(), bytes);
        assert!(HostArray::from_le_bytes(ScalarType::U32, vec![3], &bytes).is_err());
    }

    #[test]
    fn mistyped_values_are_rejected() {
        let err = HostArray::vector(ScalarType::U32, vec![ScalarValue::I32(1)]).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch(_)));
    }
}
