//! Array descriptor wire format and its codec.
//!
//! A descriptor is a fixed-layout record of 32-bit little-endian words that
//! lives in sandbox memory and describes an array without owning or copying
//! its data:
//!
//! ```text
//! word 0            : allocation handle (meminfo)
//! word 1            : reserved owner slot (always 0)
//! word 2            : element count
//! word 3            : element byte size
//! word 4            : data pointer
//! word 5 .. 5+r     : shape, one word per dimension
//! word 5+r .. 5+2r  : byte stride, one word per dimension
//! ```
//!
//! Total size is `4 * (5 + 2r)` bytes. The element type and rank are not
//! stored; consumers must know them out of band.

use crate::error::{DescriptorError, DescriptorResult};
use crate::ty::ScalarType;
use crate::value::ScalarValue;

// ══════════════════════════════════════════════════════════════════════════════
// Layout constants
// ══════════════════════════════════════════════════════════════════════════════

/// Width of one descriptor word in bytes.
pub const WORD_BYTES: u32 = 4;
/// Number of fixed header words before the shape.
pub const HEADER_WORDS: u32 = 5;

pub const FIELD_MEMINFO: u32 = 0;
pub const FIELD_PARENT: u32 = 1;
pub const FIELD_NITEMS: u32 = 2;
pub const FIELD_ITEMSIZE: u32 = 3;
pub const FIELD_DATA: u32 = 4;
pub const FIELD_SHAPE: u32 = 5;

/// Byte offset of the data pointer.
pub const DATA_OFFSET: u32 = FIELD_DATA * WORD_BYTES;
/// Byte offset of the first shape word.
pub const SHAPE_OFFSET: u32 = FIELD_SHAPE * WORD_BYTES;

/// Number of words in a descriptor of rank `rank`.
pub const fn descriptor_words(rank: u32) -> u32 {
    HEADER_WORDS + 2 * rank
}

/// Byte length of a descriptor of rank `rank`.
pub const fn descriptor_len(rank: u32) -> u32 {
    WORD_BYTES * descriptor_words(rank)
}

// ══════════════════════════════════════════════════════════════════════════════
// Sandbox memory traits
// ══════════════════════════════════════════════════════════════════════════════

/// Read/write access to the sandbox's linear memory.
pub trait SandboxMemory {
    fn bytes(&self) -> &[u8];

    fn bytes_mut(&mut self) -> &mut [u8];

    /// Borrow `len` bytes at `addr`.
    fn slice(&self, addr: u32, len: u32) -> DescriptorResult<&[u8]> {
        let bytes = self.bytes();
        let (start, end) = checked_range(addr, len, bytes.len())?;
        Ok(&bytes[start..end])
    }

    fn slice_mut(&mut self, addr: u32, len: u32) -> DescriptorResult<&mut [u8]> {
        let bytes = self.bytes_mut();
        let (start, end) = checked_range(addr, len, bytes.len())?;
        Ok(&mut bytes[start..end])
    }

    fn read_u32(&self, addr: u32) -> DescriptorResult<u32> {
        let raw = self.slice(addr, WORD_BYTES)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> DescriptorResult<()> {
        self.slice_mut(addr, WORD_BYTES)?
            .copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

/// Sandbox memory that can also allocate through the target allocator.
pub trait SandboxAllocator: SandboxMemory {
    /// Allocate `size` bytes; returns the sandbox address.
    fn alloc(&mut self, size: u32) -> DescriptorResult<u32>;
}

fn checked_range(addr: u32, len: u32, memory_len: usize) -> DescriptorResult<(usize, usize)> {
    let start = addr as usize;
    let end = start.checked_add(len as usize);
    match end {
        Some(end) if end <= memory_len => Ok((start, end)),
        _ => Err(DescriptorError::OutOfBounds {
            addr: u64::from(addr),
            len: u64::from(len),
            memory_len,
        }),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Arrays in sandbox memory
// ══════════════════════════════════════════════════════════════════════════════

/// An array whose backing data already lives in sandbox memory.
///
/// This is what gets encoded: the descriptor points at `data` directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxArray {
    /// Allocation handle owning the data block.
    pub meminfo: u32,
    /// Address of the first element.
    pub data: u32,
    pub element: ScalarType,
    pub shape: Vec<u32>,
    /// Byte stride per dimension.
    pub strides: Vec<u32>,
}

impl SandboxArray {
    /// A C-contiguous array over `data`.
    pub fn contiguous(meminfo: u32, data: u32, element: ScalarType, shape: Vec<u32>) -> Self {
        let strides = c_strides(&shape, element.byte_size());
        Self {
            meminfo,
            data,
            element,
            shape,
            strides,
        }
    }

    pub fn rank(&self) -> u32 {
        self.shape.len() as u32
    }

    pub fn nitems(&self) -> u64 {
        self.shape.iter().map(|&d| u64::from(d)).product()
    }

    pub fn nbytes(&self) -> u64 {
        self.nitems() * u64::from(self.element.byte_size())
    }

    /// Whether the strides are the row-major strides for the shape.
    pub fn is_c_contiguous(&self) -> bool {
        self.strides == c_strides(&self.shape, self.element.byte_size())
    }
}

/// Row-major byte strides for `shape`.
pub fn c_strides(shape: &[u32], itemsize: u32) -> Vec<u32> {
    let mut strides = vec![0u32; shape.len()];
    let mut acc = itemsize;
    for (i, &dim) in shape.iter().enumerate().rev() {
        strides[i] = acc;
        acc = acc.wrapping_mul(dim);
    }
    strides
}

// ══════════════════════════════════════════════════════════════════════════════
// Raw descriptor fields
// ══════════════════════════════════════════════════════════════════════════════

/// Every field of a descriptor, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFields {
    pub meminfo: u32,
    pub parent: u32,
    pub nitems: u32,
    pub itemsize: u32,
    pub data: u32,
    pub shape: Vec<u32>,
    pub strides: Vec<u32>,
}

impl DescriptorFields {
    /// Fields describing `array` (owner slot left empty).
    pub fn for_array(array: &SandboxArray) -> DescriptorResult<Self> {
        let nitems = u32::try_from(array.nitems()).map_err(|_| {
            DescriptorError::InvalidShape(format!(
                "{} elements do not fit a 32-bit word",
                array.nitems()
            ))
        })?;
        if array.strides.len() != array.shape.len() {
            return Err(DescriptorError::InvalidShape(format!(
                "{} strides for rank {}",
                array.strides.len(),
                array.rank()
            )));
        }
        Ok(Self {
            meminfo: array.meminfo,
            parent: 0,
            nitems,
            itemsize: array.element.byte_size(),
            data: array.data,
            shape: array.shape.clone(),
            strides: array.strides.clone(),
        })
    }

    pub fn rank(&self) -> u32 {
        self.shape.len() as u32
    }

    /// Words in wire order.
    pub fn to_words(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(descriptor_words(self.rank()) as usize);
        words.extend([
            self.meminfo,
            self.parent,
            self.nitems,
            self.itemsize,
            self.data,
        ]);
        words.extend_from_slice(&self.shape);
        words.extend_from_slice(&self.strides);
        words
    }

    /// Read a full rank-`rank` descriptor at `ptr`.
    pub fn read<M: SandboxMemory + ?Sized>(mem: &M, ptr: u32, rank: u32) -> DescriptorResult<Self> {
        let raw = mem.slice(ptr, descriptor_len(rank))?;
        let words: Vec<u32> = raw
            .chunks_exact(WORD_BYTES as usize)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let r = rank as usize;
        let base = HEADER_WORDS as usize;
        Ok(Self {
            meminfo: words[FIELD_MEMINFO as usize],
            parent: words[FIELD_PARENT as usize],
            nitems: words[FIELD_NITEMS as usize],
            itemsize: words[FIELD_ITEMSIZE as usize],
            data: words[FIELD_DATA as usize],
            shape: words[base..base + r].to_vec(),
            strides: words[base + r..base + 2 * r].to_vec(),
        })
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Codec
// ══════════════════════════════════════════════════════════════════════════════

/// Write a descriptor for `array` into freshly allocated sandbox memory and
/// return its address.
///
/// The descriptor references `array.data` directly; no element bytes are
/// copied.
pub fn encode<A: SandboxAllocator + ?Sized>(heap: &mut A, array: &SandboxArray) -> DescriptorResult<u32> {
    let fields = DescriptorFields::for_array(array)?;
    let len = descriptor_len(fields.rank());
    let ptr = heap.alloc(len)?;
    let out = heap.slice_mut(ptr, len)?;
    for (i, word) in fields.to_words().into_iter().enumerate() {
        let at = i * WORD_BYTES as usize;
        out[at..at + WORD_BYTES as usize].copy_from_slice(&word.to_le_bytes());
    }
    Ok(ptr)
}

/// Build a view over the array described at `ptr`.
///
/// Reads the data pointer and `rank` shape words and borrows the described
/// row-major region of memory as `element`s. Nothing is copied and nothing
/// is written.
pub fn decode<'m, M: SandboxMemory + ?Sized>(
    mem: &'m M,
    ptr: u32,
    element: ScalarType,
    rank: u32,
) -> DescriptorResult<ArrayView<'m>> {
    let data = mem.read_u32(ptr.saturating_add(DATA_OFFSET))?;
    let mut shape = Vec::with_capacity(rank as usize);
    for dim in 0..rank {
        shape.push(mem.read_u32(ptr.saturating_add(SHAPE_OFFSET + dim * WORD_BYTES))? as usize);
    }
    let nitems: u64 = shape.iter().map(|&d| d as u64).product();
    let nbytes = nitems * u64::from(element.byte_size());
    let len = u32::try_from(nbytes).map_err(|_| {
        DescriptorError::InvalidShape(format!("{nbytes} bytes exceed the 32-bit address space"))
    })?;
    let bytes = mem.slice(data, len)?;
    Ok(ArrayView {
        bytes,
        element,
        shape,
        data,
    })
}

// ══════════════════════════════════════════════════════════════════════════════
// ArrayView
// ══════════════════════════════════════════════════════════════════════════════

/// A borrowed, row-major view of array data in sandbox memory.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayView<'a> {
    bytes: &'a [u8],
    element: ScalarType,
    shape: Vec<usize>,
    data: u32,
}

impl<'a> ArrayView<'a> {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn element(&self) -> ScalarType {
        self.element
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total element count.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sandbox address of the first element.
    pub fn data_ptr(&self) -> u32 {
        self.data
    }

    /// The underlying bytes, exactly `len() * itemsize` long.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Element at flat (row-major) position `i`.
    pub fn get_flat(&self, i: usize) -> Option<ScalarValue> {
        let size = self.element.byte_size() as usize;
        let start = i.checked_mul(size)?;
        let raw = self.bytes.get(start..start + size)?;
        Some(ScalarValue::from_le_bytes(self.element, raw))
    }

    /// Element at a multi-dimensional index.
    pub fn get(&self, index: &[usize]) -> Option<ScalarValue> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0usize;
        for (&i, &dim) in index.iter().zip(&self.shape) {
            if i >= dim {
                return None;
            }
            flat = flat * dim + i;
        }
        self.get_flat(flat)
    }

    /// Iterate over elements in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = ScalarValue> + '_ {
        let size = self.element.byte_size() as usize;
        self.bytes
            .chunks_exact(size)
            .map(move |c| ScalarValue::from_le_bytes(self.element, c))
    }

    /// Copy the elements out. The only copying operation on a view.
    pub fn to_vec(&self) -> Vec<ScalarValue> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_lengths() {
        assert_eq!(descriptor_len(0), 20);
        assert_eq!(descriptor_len(1), 28);
        assert_eq!(descriptor_len(3), 44);
    }

    #[test]
    fn c_strides_are_row_major() {
        assert_eq!(c_strides(&[2, 3, 4], 8), vec![96, 32, 8]);
        assert_eq!(c_strides(&[123], 4), vec![4]);
        assert!(c_strides(&[], 4).is_empty());
    }

    #[test]
    fn transposed_strides_are_not_contiguous() {
        let mut array = SandboxArray::contiguous(0x100, 0x200, ScalarType::F64, vec![2, 3]);
        assert!(array.is_c_contiguous());
        array.strides = vec![8, 16];
        assert!(!array.is_c_contiguous());
    }

    #[test]
    fn fields_word_order() {
        let array = SandboxArray::contiguous(0x100, 0x200, ScalarType::U32, vec![2, 3]);
        let fields = DescriptorFields::for_array(&array).unwrap();
        assert_eq!(
            fields.to_words(),
            vec![0x100, 0, 6, 4, 0x200, 2, 3, 12, 4]
        );
    }
}
