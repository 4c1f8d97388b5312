//! Arguments and results of session calls.

use numwasm_bridge::DescriptorHandle;
use numwasm_eval::{ArrayRef, HostArray};
use numwasm_types::{SandboxArray, ScalarValue};

/// A value passed to or returned from [`Session::call`](crate::Session::call).
///
/// Native calls take and return `Scalar` and `Array`. Bridge calls also
/// accept arrays already in the sandbox (`Sandbox`, `Descriptor`) and
/// return array results as `Descriptor`s.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(ScalarValue),
    /// A host array. Bridge calls copy it into the sandbox first.
    Array(ArrayRef),
    Sandbox(SandboxArray),
    Descriptor(DescriptorHandle),
    Void,
}

impl Value {
    pub fn array(array: HostArray) -> Self {
        numwasm_eval::Value::array(array).into()
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

    pub fn as_descriptor(&self) -> Option<DescriptorHandle> {
        match self {
            Self::Descriptor(h) => Some(*h),
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

impl From<numwasm_eval::Value> for Value {
    fn from(v: numwasm_eval::Value) -> Self {
        match v {
            numwasm_eval::Value::Scalar(s) => Self::Scalar(s),
            numwasm_eval::Value::Array(a) => Self::Array(a),
            numwasm_eval::Value::Void => Self::Void,
        }
    }
}
