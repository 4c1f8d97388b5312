//! Shared types for the numwasm toolchain.
//!
//! This crate defines the vocabulary every other stage speaks: declaration
//! annotations, resolved semantic types and signatures, the kernel AST that
//! declaring code hands to the compiler, scalar values, global bindings, and
//! the array-descriptor wire format used across the sandbox boundary.

mod error;
pub mod annotation;
pub mod descriptor;
pub mod global;
pub mod kernel;
pub mod ty;
pub mod value;

pub use annotation::{Annotation, Primitive};
pub use descriptor::{
    decode, descriptor_len, encode, ArrayView, DescriptorFields, SandboxAllocator,
    SandboxArray, SandboxMemory,
};
pub use error::{DescriptorError, DescriptorResult, TypeMappingError};
pub use global::GlobalBinding;
pub use ty::{FunctionSignature, ScalarKind, ScalarType, SemanticType};
pub use value::ScalarValue;
