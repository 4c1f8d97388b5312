//! numwasm codegen: from compiled units to one deployable module.
//!
//! # Architecture
//!
//! - [`runtime`]: the shared runtime support module (allocator, meminfo
//!   allocation) every unit declares but none defines
//! - [`link`]: the [`Assembler`], which merges the runtime and the units,
//!   materializes global slots, applies symbol overrides and culls
//!   visibility against an [`ExportSet`]
//! - [`emit`]: wasm32 binary emission of the assembled module, validated
//!   with `wasmparser`
//!
//! ## Exports of an emitted module
//! - every defined `external` function with default visibility, under its
//!   symbol name
//! - `memory`: the linear memory

pub mod emit;
pub mod error;
pub mod link;
pub mod runtime;

pub use emit::emit_wasm;
pub use error::{CodegenError, CodegenResult, LinkError, LinkResult};
pub use link::{AssembledModule, Assembler, ExportSet};
