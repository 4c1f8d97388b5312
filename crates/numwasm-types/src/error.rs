//! Error types shared across stages.

use thiserror::Error;

/// An annotation could not be resolved to a semantic type.
///
/// Fatal to the declaration that carried it; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("the type for annotation `{annotation}` is not known{}", parameter_suffix(.parameter))]
pub struct TypeMappingError {
    /// The annotation as written.
    pub annotation: String,
    /// The parameter (or `return`) that carried it, once known.
    pub parameter: Option<String>,
}

impl TypeMappingError {
    pub fn new(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
            parameter: None,
        }
    }

    /// Attach the name of the offending parameter.
    pub fn for_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }
}

fn parameter_suffix(parameter: &Option<String>) -> String {
    match parameter {
        Some(p) => format!(" (parameter `{p}`)"),
        None => String::new(),
    }
}

/// Errors raised while reading or writing array descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// A read or write fell outside the sandbox memory.
    #[error("descriptor access out of bounds: {len} bytes at {addr:#x} (memory is {memory_len} bytes)")]
    OutOfBounds { addr: u64, len: u64, memory_len: usize },

    /// The sandbox allocator could not satisfy a request.
    #[error("sandbox allocation of {size} bytes failed: {reason}")]
    AllocationFailed { size: u32, reason: String },

    /// Shape or stride values cannot be represented in 32-bit words.
    #[error("invalid array shape: {0}")]
    InvalidShape(String),
}

/// Descriptor codec result type alias.
pub type DescriptorResult<T> = Result<T, DescriptorError>;
