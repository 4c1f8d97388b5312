//! IR error types.

use thiserror::Error;

/// Errors raised while building, editing or verifying an IR module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    /// A symbol was added twice to the same module.
    #[error("symbol `{0}` is already defined in this module")]
    DuplicateSymbol(String),

    /// A rename or lookup named a symbol the module does not contain.
    #[error("no symbol named `{0}` in this module")]
    UnknownSymbol(String),

    /// A function body failed structural verification.
    #[error("verification of `{function}` failed: {message}")]
    Verify { function: String, message: String },
}

impl IrError {
    pub(crate) fn verify(function: &str, message: impl Into<String>) -> Self {
        Self::Verify {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

/// IR result type alias.
pub type IrResult<T> = Result<T, IrError>;
