//! Facade error type.

use std::path::PathBuf;

use numwasm_bridge::{BridgeError, BridgeLookupError};
use numwasm_codegen::{CodegenError, LinkError};
use numwasm_compiler::CompileError;
use numwasm_eval::EvalError;
use numwasm_types::TypeMappingError;
use thiserror::Error;

use crate::mode::Mode;

/// Every failure a [`Session`](crate::Session) can report.
///
/// Nested stage errors are flattened so that an annotation failure is
/// always [`NumwasmError::TypeMapping`] and a missing bridge symbol is
/// always [`NumwasmError::BridgeLookup`], whichever stage raised them.
#[derive(Debug, Error)]
pub enum NumwasmError {
    #[error(transparent)]
    TypeMapping(#[from] TypeMappingError),

    #[error(transparent)]
    Compile(CompileError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Eval(EvalError),

    #[error(transparent)]
    BridgeLookup(#[from] BridgeLookupError),

    #[error(transparent)]
    Bridge(BridgeError),

    /// Target-build declarations exist only inside the built artifact.
    #[error("`{symbol}` was declared for a target build and cannot be called in-process")]
    NotCallable { symbol: String },

    #[error("`{operation}` is not available in {mode} mode")]
    WrongMode { operation: &'static str, mode: Mode },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to write `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<CompileError> for NumwasmError {
    fn from(e: CompileError) -> Self {
        match e {
            CompileError::TypeMapping(t) => Self::TypeMapping(t),
            other => Self::Compile(other),
        }
    }
}

impl From<EvalError> for NumwasmError {
    fn from(e: EvalError) -> Self {
        match e {
            EvalError::Compile(c) => c.into(),
            other => Self::Eval(other),
        }
    }
}

impl From<BridgeError> for NumwasmError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Lookup(l) => Self::BridgeLookup(l),
            other => Self::Bridge(other),
        }
    }
}

/// Facade result type alias.
pub type NumwasmResult<T> = Result<T, NumwasmError>;
