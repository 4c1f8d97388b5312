//! The bridge contract and array marshaling helpers.

use numwasm_compiler::lower::MEMINFO_DATA_WORD;
use numwasm_types::descriptor::WORD_BYTES;
use numwasm_types::{
    decode, ArrayView, DescriptorError, DescriptorFields, DescriptorResult, SandboxAllocator,
    SandboxArray, SandboxMemory, ScalarType,
};

use crate::error::{BridgeError, BridgeResult};
use crate::raw::RawValue;

/// A symbol-keyed callable table over one sandbox instance, plus access to
/// its memory and allocator.
pub trait Bridge: SandboxAllocator {
    /// Whether `symbol` is in the callable table.
    fn contains(&self, symbol: &str) -> bool;

    /// Call `symbol`. Returns `None` for void functions.
    fn invoke(&mut self, symbol: &str, args: &[RawValue]) -> BridgeResult<Option<RawValue>>;

    /// Return a block obtained from [`SandboxAllocator::alloc`].
    fn free(&mut self, ptr: u32) -> BridgeResult<()>;

    /// Allocate a zeroed array data block of `size` bytes aligned to `align`.
    /// Returns the allocation handle (meminfo).
    fn alloc_meminfo(&mut self, size: u32, align: u32) -> BridgeResult<u32>;

    /// Release a result descriptor. The array data it references stays
    /// allocated for the lifetime of the sandbox instance.
    fn release_descriptor(&mut self, handle: DescriptorHandle) -> BridgeResult<()> {
        self.free(handle.ptr)
    }
}

/// A descriptor returned by the sandbox, with the element type and rank
/// needed to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHandle {
    pub ptr: u32,
    pub element: ScalarType,
    pub rank: u32,
}

impl DescriptorHandle {
    /// Borrow the described array. Nothing is copied.
    pub fn view<'m, M: SandboxMemory + ?Sized>(&self, mem: &'m M) -> DescriptorResult<ArrayView<'m>> {
        decode(mem, self.ptr, self.element, self.rank)
    }

    /// The array the descriptor points at, for passing it back in.
    pub fn array<M: SandboxMemory + ?Sized>(&self, mem: &M) -> DescriptorResult<SandboxArray> {
        let fields = DescriptorFields::read(mem, self.ptr, self.rank)?;
        Ok(SandboxArray {
            meminfo: fields.meminfo,
            data: fields.data,
            element: self.element,
            shape: fields.shape,
            strides: fields.strides,
        })
    }
}

/// Allocate a zero-filled C-contiguous array in the sandbox.
pub fn alloc_array<B: Bridge + ?Sized>(
    bridge: &mut B,
    element: ScalarType,
    shape: Vec<u32>,
) -> BridgeResult<SandboxArray> {
    let itemsize = element.byte_size();
    let nbytes = shape
        .iter()
        .try_fold(u64::from(itemsize), |acc, &d| acc.checked_mul(u64::from(d)))
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            DescriptorError::InvalidShape(format!(
                "{shape:?} {element} elements exceed the 32-bit address space"
            ))
        })?;
    let meminfo = bridge.alloc_meminfo(nbytes, itemsize)?;
    let data = bridge.read_u32(meminfo + MEMINFO_DATA_WORD * WORD_BYTES)?;
    Ok(SandboxArray::contiguous(meminfo, data, element, shape))
}

/// Copy host element bytes (row-major, little-endian) into a fresh sandbox
/// array. This is the only copy an array argument ever takes.
pub fn array_from_bytes<B: Bridge + ?Sized>(
    bridge: &mut B,
    element: ScalarType,
    shape: Vec<u32>,
    bytes: &[u8],
) -> BridgeResult<SandboxArray> {
    let array = alloc_array(bridge, element, shape)?;
    if array.nbytes() != bytes.len() as u64 {
        return Err(BridgeError::Descriptor(DescriptorError::InvalidShape(format!(
            "{} byte(s) given for {} {element} element(s)",
            bytes.len(),
            array.nitems()
        ))));
    }
    bridge
        .slice_mut(array.data, bytes.len() as u32)?
        .copy_from_slice(bytes);
    Ok(array)
}
