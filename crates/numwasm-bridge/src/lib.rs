//! numwasm bridge: calling compiled kernels inside the sandbox.
//!
//! The sandbox side is a built artifact whose function exports form a
//! symbol-keyed callable table. A call through the bridge:
//!
//! 1. copies host array data into sandbox memory once ([`array_from_bytes`])
//! 2. encodes each array argument as a descriptor
//! 3. looks the symbol up and invokes it with raw scalars and pointers
//! 4. frees the argument descriptors
//! 5. hands back array results as a [`DescriptorHandle`], decoded on demand
//!
//! [`Bridge`] is the contract; [`WasmBridge`] implements it over a `wasmi`
//! instance.

pub mod bridge;
pub mod error;
pub mod raw;
pub mod stub;
pub mod wasm;

pub use bridge::{alloc_array, array_from_bytes, Bridge, DescriptorHandle};
pub use error::{BridgeError, BridgeLookupError, BridgeResult};
pub use raw::RawValue;
pub use stub::{BridgeArg, BridgeReturn, BridgeStub};
pub use wasm::WasmBridge;
