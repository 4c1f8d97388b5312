//! Bridge error types.

use numwasm_types::DescriptorError;
use thiserror::Error;

/// A symbol is missing from the bridge's callable table.
///
/// Raised at call time, never at declaration time: the table may not exist
/// yet when a stub is declared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("symbol `{symbol}` is not exported by the bridge")]
pub struct BridgeLookupError {
    pub symbol: String,
}

impl BridgeLookupError {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

/// Errors raised while calling through the bridge.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Lookup(#[from] BridgeLookupError),

    /// Encoding, decoding or allocating in sandbox memory failed.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The artifact could not be loaded or instantiated.
    #[error("failed to instantiate sandbox: {0}")]
    Instantiate(String),

    /// The callee trapped.
    #[error("`{symbol}` trapped: {message}")]
    Trap { symbol: String, message: String },

    /// Arguments do not match the callee.
    #[error("bad call to `{symbol}`: {message}")]
    Signature { symbol: String, message: String },
}

/// Bridge result type alias.
pub type BridgeResult<T> = Result<T, BridgeError>;
