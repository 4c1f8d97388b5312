//! numwasm tree-walking evaluator.
//!
//! Executes declared kernels directly over host arrays, without compiling
//! them to the sandbox target. This is the in-process execution engine of
//! native mode, and the reference the compiled artifact is measured against:
//! integer arithmetic wraps at the declared width, division truncates,
//! float-to-int conversion saturates.
//!
//! 1. [`KernelTable::declare`] resolves and type-checks a declaration.
//! 2. [`GlobalSlots`] holds module-level slots, created from their binding's
//!    initial value on first reference.
//! 3. [`Evaluator::call`] runs a kernel by qualified name.

pub mod error;
pub mod evaluator;
pub mod globals;
pub mod table;
pub mod value;

pub use error::{EvalError, EvalResult};
pub use evaluator::{Evaluator, DEFAULT_GAS_LIMIT, MAX_CALL_DEPTH};
pub use globals::GlobalSlots;
pub use table::{Kernel, KernelTable};
pub use value::{ArrayRef, HostArray, Value};
