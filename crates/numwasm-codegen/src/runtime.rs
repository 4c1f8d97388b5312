//! Runtime support module.
//!
//! Every compiled unit only *declares* the allocator entry points it calls;
//! this module defines them once, in IR, and the assembler merges it ahead
//! of the units. The heap starts at `heap_base` and grows upward:
//!
//! ```text
//! block:   [size: word, pad to 8 bytes][payload ...]
//! free:    payload word 0 holds the next free block (0 ends the list)
//! meminfo: [refcount, dtor, dtor_info, data, size]   (5 words)
//! ```
//!
//! Payloads are 8-byte aligned. `malloc` takes the first free block that
//! fits and bump-allocates otherwise, growing linear memory as needed.

use numwasm_compiler::TargetConfig;
use numwasm_ir::{
    BinaryOp, BlockType, CmpOp, Const, Function, FunctionBuilder, Global, Inst, IrModule, IrType,
    Linkage, Visibility,
};

use crate::error::LinkResult;

/// Global holding the first unallocated heap address.
pub const HEAP_PTR: &str = "__nw_heap_ptr";
/// Global holding the head of the free list.
pub const FREE_LIST: &str = "__nw_free_list";

/// Bytes in front of every payload.
pub const BLOCK_HEADER: u32 = 8;
/// Words in a meminfo record.
pub const MEMINFO_WORDS: u32 = 5;

const PAGE_SHIFT: i64 = 16;

/// Symbols this module defines, in definition order.
pub fn runtime_symbols(config: &TargetConfig) -> Vec<String> {
    vec![
        config.malloc_symbol.clone(),
        config.free_symbol.clone(),
        config.meminfo_alloc_symbol.clone(),
        HEAP_PTR.to_string(),
        FREE_LIST.to_string(),
    ]
}

/// Build the runtime support module for `config`.
pub fn runtime_module(config: &TargetConfig) -> LinkResult<IrModule> {
    let mut module = IrModule::new("__nw_runtime", config.layout());
    let word = IrType::word(config.word_bits);

    module.add_global(slot(HEAP_PTR, word, i64::from(config.heap_base)))?;
    module.add_global(slot(FREE_LIST, word, 0))?;
    module.add_function(emit_malloc(config))?;
    module.add_function(emit_free(config))?;
    module.add_function(emit_meminfo_alloc(config))?;
    Ok(module)
}

fn slot(name: &str, word: IrType, init: i64) -> Global {
    Global {
        name: name.to_string(),
        ty: word,
        mutable: true,
        linkage: Linkage::External,
        visibility: Visibility::Default,
        init: Some(Const::word(word, init)),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Emit helpers
// ══════════════════════════════════════════════════════════════════════════════

/// Word-typed helpers shared by the emitters below.
struct Words {
    word: IrType,
}

impl Words {
    fn new(config: &TargetConfig) -> Self {
        Self {
            word: IrType::word(config.word_bits),
        }
    }

    fn c(&self, v: i64) -> Inst {
        Inst::Const(Const::word(self.word, v))
    }

    fn op(&self, op: BinaryOp) -> Inst {
        Inst::binary(self.word, op)
    }

    fn cmp(&self, op: CmpOp) -> Inst {
        Inst::compare(self.word, op)
    }

    fn load(&self, offset: u32) -> Inst {
        Inst::load(self.word, offset)
    }

    fn store(&self, offset: u32) -> Inst {
        Inst::store(self.word, offset)
    }

    /// `i32` page count on the stack → word.
    fn from_pages(&self) -> Vec<Inst> {
        match self.word {
            IrType::I64 => vec![Inst::Convert {
                from: IrType::I32,
                to: IrType::I64,
                signed: false,
            }],
            _ => Vec::new(),
        }
    }

    /// Word on the stack → `i32` operand of a memory instruction.
    fn to_i32(&self) -> Vec<Inst> {
        match self.word {
            IrType::I64 => vec![Inst::Convert {
                from: IrType::I64,
                to: IrType::I32,
                signed: false,
            }],
            _ => Vec::new(),
        }
    }
}

/// Emit `malloc(size: word) -> word`.
///
/// First fit over the free list, then bump allocation. Traps when memory
/// cannot grow or the request wraps the address space.
fn emit_malloc(config: &TargetConfig) -> Function {
    let w = Words::new(config);
    let word = w.word;
    let mut b = FunctionBuilder::new(vec![word], vec![word]);
    let size = 0;
    let need = b.local(word);
    let prev = b.local(word);
    let cur = b.local(word);
    let block = b.local(word);
    let top = b.local(word);

    // need = max(8, (size + 7) & -8)
    b.extend([
        Inst::LocalGet(size),
        w.c(7),
        w.op(BinaryOp::Add),
        w.c(-8),
        w.op(BinaryOp::And),
        Inst::LocalTee(need),
        Inst::Eqz(word),
        Inst::If(BlockType::Empty),
        w.c(8),
        Inst::LocalSet(need),
        Inst::End,
    ]);
    b.extend(trap_if_below(&w, need, size));

    // ── First fit ────────────────────────────────────────────────────────
    b.extend([
        Inst::GlobalGet(FREE_LIST.into()),
        Inst::LocalSet(cur),
        Inst::Block(BlockType::Empty),
        Inst::Loop(BlockType::Empty),
        Inst::LocalGet(cur),
        Inst::Eqz(word),
        Inst::BrIf(1),
        // header size >= need
        Inst::LocalGet(cur),
        w.c(i64::from(BLOCK_HEADER)),
        w.op(BinaryOp::Sub),
        w.load(0),
        Inst::LocalGet(need),
        w.cmp(CmpOp::GeU),
        Inst::If(BlockType::Empty),
        Inst::LocalGet(prev),
        Inst::Eqz(word),
        Inst::If(BlockType::Empty),
        Inst::LocalGet(cur),
        w.load(0),
        Inst::GlobalSet(FREE_LIST.into()),
        Inst::Else,
        Inst::LocalGet(prev),
        Inst::LocalGet(cur),
        w.load(0),
        w.store(0),
        Inst::End,
        Inst::LocalGet(cur),
        Inst::Return,
        Inst::End,
        Inst::LocalGet(cur),
        Inst::LocalSet(prev),
        Inst::LocalGet(cur),
        w.load(0),
        Inst::LocalSet(cur),
        Inst::Br(0),
        Inst::End,
        Inst::End,
    ]);

    // ── Bump ─────────────────────────────────────────────────────────────
    b.extend([
        Inst::GlobalGet(HEAP_PTR.into()),
        w.c(i64::from(BLOCK_HEADER)),
        w.op(BinaryOp::Add),
        Inst::LocalTee(block),
        Inst::LocalGet(need),
        w.op(BinaryOp::Add),
        Inst::LocalSet(top),
    ]);
    b.extend(trap_if_below(&w, top, block));

    // grow when top > memory.size << 16
    b.push(Inst::LocalGet(top));
    b.push(Inst::MemorySize);
    b.extend(w.from_pages());
    b.extend([w.c(PAGE_SHIFT), w.op(BinaryOp::Shl), w.cmp(CmpOp::GtU)]);
    b.push(Inst::If(BlockType::Empty));
    b.push(Inst::LocalGet(top));
    b.push(Inst::MemorySize);
    b.extend(w.from_pages());
    b.extend([
        w.c(PAGE_SHIFT),
        w.op(BinaryOp::Shl),
        w.op(BinaryOp::Sub),
        w.c((1 << PAGE_SHIFT) - 1),
        w.op(BinaryOp::Add),
        w.c(PAGE_SHIFT),
        w.op(BinaryOp::ShrU),
    ]);
    b.extend(w.to_i32());
    b.extend([
        Inst::MemoryGrow,
        Inst::i32(-1),
        Inst::compare(IrType::I32, CmpOp::Eq),
        Inst::If(BlockType::Empty),
        Inst::Unreachable,
        Inst::End,
        Inst::End,
    ]);

    b.extend([
        // header
        Inst::LocalGet(block),
        w.c(i64::from(BLOCK_HEADER)),
        w.op(BinaryOp::Sub),
        Inst::LocalGet(need),
        w.store(0),
        Inst::LocalGet(top),
        Inst::GlobalSet(HEAP_PTR.into()),
        Inst::LocalGet(block),
    ]);
    b.finish(config.malloc_symbol.clone(), Linkage::External)
}

/// `if local < floor (unsigned) { unreachable }`.
fn trap_if_below(w: &Words, local: u32, floor: u32) -> [Inst; 6] {
    [
        Inst::LocalGet(local),
        Inst::LocalGet(floor),
        w.cmp(CmpOp::LtU),
        Inst::If(BlockType::Empty),
        Inst::Unreachable,
        Inst::End,
    ]
}

/// Emit `free(ptr: word)`. Null is ignored.
fn emit_free(config: &TargetConfig) -> Function {
    let w = Words::new(config);
    let mut b = FunctionBuilder::new(vec![w.word], vec![]);
    b.extend([
        Inst::LocalGet(0),
        Inst::Eqz(w.word),
        Inst::If(BlockType::Empty),
        Inst::Return,
        Inst::End,
        // ptr.next = free_list; free_list = ptr
        Inst::LocalGet(0),
        Inst::GlobalGet(FREE_LIST.into()),
        w.store(0),
        Inst::LocalGet(0),
        Inst::GlobalSet(FREE_LIST.into()),
    ]);
    b.finish(config.free_symbol.clone(), Linkage::External)
}

/// Emit `NRT_MemInfo_alloc_safe_aligned(size: word, align: word) -> word`.
///
/// Allocates the meminfo record and a zero-filled data block whose address
/// is a multiple of `align` (a power of two; 0 is treated as 1).
fn emit_meminfo_alloc(config: &TargetConfig) -> Function {
    let w = Words::new(config);
    let word = w.word;
    let wb = config.word_bytes();
    let malloc = config.malloc_symbol.clone();
    let mut b = FunctionBuilder::new(vec![word, word], vec![word]);
    let (size, align) = (0, 1);
    let info = b.local(word);
    let data = b.local(word);
    let padded = b.local(word);

    b.extend([
        Inst::LocalGet(align),
        Inst::Eqz(word),
        Inst::If(BlockType::Empty),
        w.c(1),
        Inst::LocalSet(align),
        Inst::End,
        // record
        w.c(i64::from(MEMINFO_WORDS * wb)),
        Inst::call(malloc.clone()),
        Inst::LocalSet(info),
        Inst::LocalGet(size),
        Inst::LocalGet(align),
        w.op(BinaryOp::Add),
        Inst::LocalSet(padded),
    ]);
    b.extend(trap_if_below(&w, padded, size));
    b.extend([
        // data = (malloc(size + align) + align - 1) & -align
        Inst::LocalGet(padded),
        Inst::call(malloc),
        Inst::LocalGet(align),
        w.op(BinaryOp::Add),
        w.c(1),
        w.op(BinaryOp::Sub),
        w.c(0),
        Inst::LocalGet(align),
        w.op(BinaryOp::Sub),
        w.op(BinaryOp::And),
        Inst::LocalSet(data),
    ]);

    b.push(Inst::LocalGet(data));
    b.extend(w.to_i32());
    b.push(Inst::i32(0));
    b.push(Inst::LocalGet(size));
    b.extend(w.to_i32());
    b.push(Inst::MemoryFill);

    let fields = [
        vec![w.c(1)],
        vec![w.c(0)],
        vec![w.c(0)],
        vec![Inst::LocalGet(data)],
        vec![Inst::LocalGet(size)],
    ];
    for (k, value) in fields.into_iter().enumerate() {
        b.push(Inst::LocalGet(info));
        b.extend(value);
        b.push(w.store(k as u32 * wb));
    }
    b.push(Inst::LocalGet(info));
    b.finish(config.meminfo_alloc_symbol.clone(), Linkage::External)
}
