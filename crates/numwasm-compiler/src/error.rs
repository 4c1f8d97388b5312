//! Compiler error types.

use numwasm_ir::IrError;
use numwasm_types::TypeMappingError;
use thiserror::Error;

/// Errors that can occur while checking or compiling a kernel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A parameter or return annotation could not be resolved.
    #[error(transparent)]
    TypeMapping(#[from] TypeMappingError),

    /// The kernel body is ill-typed.
    #[error("in `{function}`: {message}")]
    Type { function: String, message: String },

    /// A call names a kernel that has not been declared.
    #[error("in `{function}`: call to unknown function `{callee}`")]
    UnknownFunction { function: String, callee: String },

    /// The target configuration cannot be used for this operation.
    #[error("invalid target configuration: {0}")]
    InvalidTarget(String),

    /// Lowering produced IR that failed verification.
    #[error(transparent)]
    Ir(#[from] IrError),
}

impl CompileError {
    pub(crate) fn ty(function: &str, message: impl Into<String>) -> Self {
        Self::Type {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

/// Compiler result type alias.
pub type CompileResult<T> = Result<T, CompileError>;
