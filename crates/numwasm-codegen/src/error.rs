//! Codegen error types.

use numwasm_ir::IrError;
use thiserror::Error;

/// Errors raised while assembling compiled units into one module.
///
/// Every variant aborts the whole build; no partial module is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Two definitions of one symbol, or an override that collides with an
    /// existing symbol.
    #[error("duplicate symbol `{0}`")]
    DuplicateSymbol(String),

    /// Two units disagree on the type of a shared symbol.
    #[error("symbol `{symbol}` has conflicting types: {existing} vs {incoming}")]
    SignatureMismatch {
        symbol: String,
        existing: String,
        incoming: String,
    },

    /// A symbol is referenced but nothing defines it.
    #[error("unresolved symbol `{0}`")]
    Unresolved(String),

    /// A unit was compiled for a different data layout than the build.
    #[error("unit `{unit}` was compiled for a {found}-bit layout, the build is {expected}-bit")]
    LayoutMismatch {
        unit: String,
        expected: u32,
        found: u32,
    },

    /// The merged module failed structural verification.
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Link result type alias.
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors that can occur during wasm emission.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// The module uses something the wasm32 emitter cannot express.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A symbol has no definition in the module being emitted.
    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),

    /// The generated module failed validation.
    #[error("WASM validation failed: {0}")]
    ValidationFailed(String),
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
