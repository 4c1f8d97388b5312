//! numwasm compiler: from annotated kernels to target IR.
//!
//! Pipeline stages, each in its own module:
//!
//! - [`mapper`]: annotations → [`SemanticType`](numwasm_types::SemanticType)
//! - [`check`]: kernel type checking
//! - [`target`]: the process-wide target configuration and compile lock
//! - [`lower`]: kernel bodies → inner IR functions
//! - [`wrapper`]: foreign-callable entry points with the descriptor ABI
//! - [`globals`]: shared global-slot accessors
//! - [`passes`]: per-unit module passes, suppressible per target
//! - [`unit`]: the per-kernel driver producing a [`CompiledFunctionUnit`]

pub mod check;
pub mod env;
pub mod error;
pub mod globals;
pub mod lower;
pub mod mapper;
pub mod passes;
pub mod target;
pub mod unit;
pub mod wrapper;

pub use check::{check_kernel, SignatureTable};
pub use error::{CompileError, CompileResult};
pub use mapper::{resolve, resolve_signature};
pub use target::{compile_lock, TargetConfig};
pub use unit::{compile_unit, CompiledFunctionUnit};
