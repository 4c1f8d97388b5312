//! Runtime error types for the evaluator.

use numwasm_compiler::CompileError;
use thiserror::Error;

/// Evaluation error: rejected declarations, runtime traps and misuse.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The declaration failed type mapping or checking.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Integer division or remainder by zero, or `MIN / -1`.
    #[error("arithmetic trap: {0}")]
    ArithmeticTrap(String),

    /// Unknown local variable.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// Call of a kernel that is not in the table.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A global slot was referenced without a binding.
    #[error("unbound global: {0}")]
    UnboundGlobal(String),

    #[error("`{function}` takes {expected} argument(s), {found} given")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    /// A value did not have the type its position requires.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An index or array dimension fell outside the array.
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(String),

    /// A value-returning kernel ran off the end of its body.
    #[error("`{0}` finished without returning a value")]
    MissingReturn(String),

    #[error("call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),

    /// Gas exhaustion.
    #[error("gas exhausted")]
    GasExhausted,
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
