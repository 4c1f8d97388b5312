//! numwasm portable IR.
//!
//! A small, typed, wasm-shaped intermediate representation:
//!
//! - [`IrModule`]: ordered function and global tables for one
//!   [`DataLayout`], with symbol [`Linkage`] and [`Visibility`]
//! - [`Inst`]: structured stack instructions that reference functions and
//!   globals by name, so modules can be merged and symbols renamed
//! - [`FunctionBuilder`]: incremental body construction
//! - [`verify`]: structural checks run before a module is finalized
//!
//! `Display` on [`IrModule`] is the textual artifact format.

pub mod builder;
pub mod error;
pub mod inst;
pub mod module;
mod print;
pub mod verify;

pub use builder::FunctionBuilder;
pub use error::{IrError, IrResult};
pub use inst::{BinaryOp, BlockType, CmpOp, Const, FloatUnaryOp, Inst, IrType, MemArg};
pub use module::{
    Body, DataLayout, FnAttrs, FuncType, Function, Global, IrModule, Linkage, Visibility,
};
pub use verify::verify;
