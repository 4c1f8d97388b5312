//! numwasm: declare numeric kernels once, then run them three ways.
//!
//! Declaring code builds [`KernelDecl`]s and hands them to a [`Session`].
//! The session's [`Mode`], usually taken from the `NUMWASM_MODE`
//! environment variable, decides what a declaration becomes:
//!
//! 1. **native**: the kernel is type-checked and evaluated in-process on
//!    [`Session::call`].
//! 2. **build**: the kernel is compiled to a 32-bit target unit; once every
//!    kernel is declared, [`Session::build`] links the units, the runtime and
//!    the declared globals into one wasm32 module and returns a
//!    [`BuildArtifact`] (IR text, wasm binary, manifest).
//! 3. **bridge**: the kernel becomes a stub that calls the built artifact
//!    through an attached [`Bridge`], such as a [`WasmBridge`].
//!
//! ```
//! use numwasm::{Annotation, Expr, KernelDecl, Mode, ScalarValue, Session, Stmt, Value};
//!
//! let mut session = Session::new(Mode::Native);
//! let square = session
//!     .declare(
//!         KernelDecl::new("example_module", "square")
//!             .param("x", Annotation::f64())
//!             .returns(Annotation::f64())
//!             .body(vec![Stmt::ret(Expr::var("x").mul(Expr::var("x")))]),
//!     )
//!     .unwrap();
//! let out = session.call(&square, &[Value::Scalar(ScalarValue::F64(3.0))]).unwrap();
//! assert_eq!(out, Value::Scalar(ScalarValue::F64(9.0)));
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod global;
pub mod mode;
pub mod session;
pub mod value;

pub use artifact::{BuildArtifact, Manifest};
pub use config::BuildConfig;
pub use error::{NumwasmError, NumwasmResult};
pub use global::GlobalState;
pub use mode::{Mode, MODE_ENV};
pub use session::{Declared, Session};
pub use value::Value;

pub use numwasm_bridge::{alloc_array, array_from_bytes, Bridge, DescriptorHandle, WasmBridge};
pub use numwasm_compiler::TargetConfig;
pub use numwasm_eval::HostArray;
pub use numwasm_types::kernel::{BinOp, Expr, KernelDecl, Stmt, UnaryOp};
pub use numwasm_types::{
    Annotation, SandboxArray, SandboxMemory, ScalarType, ScalarValue, SemanticType,
};
