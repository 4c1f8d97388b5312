//! IR value types and the structured stack instruction set.
//!
//! The instruction set mirrors WebAssembly's structured control flow, with
//! one difference that matters for linking: functions and globals are
//! referenced by symbol name rather than by index, so independently
//! compiled modules can be merged and renamed without renumbering.

use serde::{Deserialize, Serialize};
use std::fmt;

// ══════════════════════════════════════════════════════════════════════════════
// Types
// ══════════════════════════════════════════════════════════════════════════════

/// A value type on the IR operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IrType {
    I32,
    I64,
    F32,
    F64,
}

impl IrType {
    /// Natural width in bits.
    pub fn bits(self) -> u32 {
        match self {
            Self::I32 | Self::F32 => 32,
            Self::I64 | Self::F64 => 64,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// The integer type used for words of `bits` bits.
    pub fn word(bits: u32) -> Self {
        if bits == 64 {
            Self::I64
        } else {
            Self::I32
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        })
    }
}

/// A constant of an IR value type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Const {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Const {
    pub fn ty(self) -> IrType {
        match self {
            Self::I32(_) => IrType::I32,
            Self::I64(_) => IrType::I64,
            Self::F32(_) => IrType::F32,
            Self::F64(_) => IrType::F64,
        }
    }

    /// The zero constant of `ty`.
    pub fn zero(ty: IrType) -> Self {
        match ty {
            IrType::I32 => Self::I32(0),
            IrType::I64 => Self::I64(0),
            IrType::F32 => Self::F32(0.0),
            IrType::F64 => Self::F64(0.0),
        }
    }

    /// A word-sized integer constant.
    pub fn word(ty: IrType, value: i64) -> Self {
        match ty {
            IrType::I64 => Self::I64(value),
            _ => Self::I32(value as i32),
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            // Bit patterns keep the text exact and NaN-stable.
            Self::F32(v) => write!(f, "{:#010x}", v.to_bits()),
            Self::F64(v) => write!(f, "{:#018x}", v.to_bits()),
        }
    }
}

/// Result type of a structured block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Empty,
    Value(IrType),
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Value(t) => write!(f, " (result {t})"),
        }
    }
}

/// Memory operand: static byte offset plus alignment exponent (log2 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemArg {
    pub offset: u32,
    pub align: u32,
}

impl MemArg {
    /// Natural alignment for an access of `bytes` bytes.
    pub fn natural(offset: u32, bytes: u32) -> Self {
        Self {
            offset,
            align: bytes.trailing_zeros(),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

/// Two-operand arithmetic and bitwise operators.
///
/// Signedness lives on the operator; float types ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Min,
    Max,
}

impl BinaryOp {
    fn mnemonic(self, ty: IrType) -> &'static str {
        match (self, ty.is_float()) {
            (Self::Add, _) => "add",
            (Self::Sub, _) => "sub",
            (Self::Mul, _) => "mul",
            (Self::DivS | Self::DivU, true) => "div",
            (Self::DivS, false) => "div_s",
            (Self::DivU, false) => "div_u",
            (Self::RemS, _) => "rem_s",
            (Self::RemU, _) => "rem_u",
            (Self::And, _) => "and",
            (Self::Or, _) => "or",
            (Self::Xor, _) => "xor",
            (Self::Shl, _) => "shl",
            (Self::ShrS, _) => "shr_s",
            (Self::ShrU, _) => "shr_u",
            (Self::Min, _) => "min",
            (Self::Max, _) => "max",
        }
    }
}

/// Comparisons; all produce an `i32` truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    LtS,
    LtU,
    LeS,
    LeU,
    GtS,
    GtU,
    GeS,
    GeU,
}

impl CmpOp {
    fn mnemonic(self, ty: IrType) -> &'static str {
        match (self, ty.is_float()) {
            (Self::Eq, _) => "eq",
            (Self::Ne, _) => "ne",
            (Self::LtS | Self::LtU, true) => "lt",
            (Self::LeS | Self::LeU, true) => "le",
            (Self::GtS | Self::GtU, true) => "gt",
            (Self::GeS | Self::GeU, true) => "ge",
            (Self::LtS, false) => "lt_s",
            (Self::LtU, false) => "lt_u",
            (Self::LeS, false) => "le_s",
            (Self::LeU, false) => "le_u",
            (Self::GtS, false) => "gt_s",
            (Self::GtU, false) => "gt_u",
            (Self::GeS, false) => "ge_s",
            (Self::GeU, false) => "ge_u",
        }
    }
}

/// Float-only unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatUnaryOp {
    Neg,
    Abs,
    Sqrt,
    Floor,
    Ceil,
    Trunc,
}

impl fmt::Display for FloatUnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Neg => "neg",
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Trunc => "trunc",
        })
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Instructions
// ══════════════════════════════════════════════════════════════════════════════

/// One IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    // ── Control ──────────────────────────────────────────────────────────
    Unreachable,
    Nop,
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else,
    End,
    Br(u32),
    BrIf(u32),
    Return,
    /// Direct call by symbol. `noinline` marks a call site that must stay a
    /// real call in every later lowering.
    Call { callee: String, noinline: bool },
    Drop,
    Select,

    // ── Variables ────────────────────────────────────────────────────────
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(String),
    GlobalSet(String),

    // ── Memory ───────────────────────────────────────────────────────────
    /// Load `bytes` bytes and widen to `ty` (sign- or zero-extending).
    Load {
        ty: IrType,
        bytes: u32,
        signed: bool,
        mem: MemArg,
    },
    /// Store the low `bytes` bytes of a `ty` value.
    Store { ty: IrType, bytes: u32, mem: MemArg },
    MemorySize,
    MemoryGrow,
    /// `memory.fill(dst, value, len)`.
    MemoryFill,

    // ── Numeric ──────────────────────────────────────────────────────────
    Const(Const),
    Binary { ty: IrType, op: BinaryOp },
    Compare { ty: IrType, op: CmpOp },
    /// Integer test for zero.
    Eqz(IrType),
    FloatUnary { ty: IrType, op: FloatUnaryOp },
    /// Sign-extend the low `from_bits` bits in place.
    Extend { ty: IrType, from_bits: u32 },
    /// Change value type. Float→int conversions saturate.
    Convert {
        from: IrType,
        to: IrType,
        signed: bool,
    },
}

impl Inst {
    pub fn call(callee: impl Into<String>) -> Self {
        Self::Call {
            callee: callee.into(),
            noinline: false,
        }
    }

    pub fn call_noinline(callee: impl Into<String>) -> Self {
        Self::Call {
            callee: callee.into(),
            noinline: true,
        }
    }

    pub fn i32(v: i32) -> Self {
        Self::Const(Const::I32(v))
    }

    pub fn i64(v: i64) -> Self {
        Self::Const(Const::I64(v))
    }

    pub fn f64(v: f64) -> Self {
        Self::Const(Const::F64(v))
    }

    /// Naturally aligned full-width load of a `ty` value.
    pub fn load(ty: IrType, offset: u32) -> Self {
        let bytes = ty.bits() / 8;
        Self::Load {
            ty,
            bytes,
            signed: false,
            mem: MemArg::natural(offset, bytes),
        }
    }

    /// Naturally aligned full-width store of a `ty` value.
    pub fn store(ty: IrType, offset: u32) -> Self {
        let bytes = ty.bits() / 8;
        Self::Store {
            ty,
            bytes,
            mem: MemArg::natural(offset, bytes),
        }
    }

    pub fn binary(ty: IrType, op: BinaryOp) -> Self {
        Self::Binary { ty, op }
    }

    pub fn compare(ty: IrType, op: CmpOp) -> Self {
        Self::Compare { ty, op }
    }

    /// Opens a structured block (`block`, `loop`, `if`).
    pub fn opens_block(&self) -> bool {
        matches!(self, Self::Block(_) | Self::Loop(_) | Self::If(_))
    }

    /// Symbol referenced by this instruction, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Call { callee, .. } => Some(callee),
            Self::GlobalGet(name) | Self::GlobalSet(name) => Some(name),
            _ => None,
        }
    }

    /// Mutable access to the referenced symbol (used by rename).
    pub fn symbol_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::Call { callee, .. } => Some(callee),
            Self::GlobalGet(name) | Self::GlobalSet(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => f.write_str("unreachable"),
            Self::Nop => f.write_str("nop"),
            Self::Block(bt) => write!(f, "block{bt}"),
            Self::Loop(bt) => write!(f, "loop{bt}"),
            Self::If(bt) => write!(f, "if{bt}"),
            Self::Else => f.write_str("else"),
            Self::End => f.write_str("end"),
            Self::Br(d) => write!(f, "br {d}"),
            Self::BrIf(d) => write!(f, "br_if {d}"),
            Self::Return => f.write_str("return"),
            Self::Call { callee, noinline } => {
                write!(f, "call @\"{callee}\"")?;
                if *noinline {
                    f.write_str(" noinline")?;
                }
                Ok(())
            }
            Self::Drop => f.write_str("drop"),
            Self::Select => f.write_str("select"),
            Self::LocalGet(i) => write!(f, "local.get {i}"),
            Self::LocalSet(i) => write!(f, "local.set {i}"),
            Self::LocalTee(i) => write!(f, "local.tee {i}"),
            Self::GlobalGet(g) => write!(f, "global.get @\"{g}\""),
            Self::GlobalSet(g) => write!(f, "global.set @\"{g}\""),
            Self::Load {
                ty,
                bytes,
                signed,
                mem,
            } => {
                write!(f, "{ty}.load")?;
                if *bytes * 8 != ty.bits() {
                    write!(f, "{}_{}", bytes * 8, if *signed { 's' } else { 'u' })?;
                }
                write!(f, " offset={} align={}", mem.offset, mem.align)
            }
            Self::Store { ty, bytes, mem } => {
                write!(f, "{ty}.store")?;
                if *bytes * 8 != ty.bits() {
                    write!(f, "{}", bytes * 8)?;
                }
                write!(f, " offset={} align={}", mem.offset, mem.align)
            }
            Self::MemorySize => f.write_str("memory.size"),
            Self::MemoryGrow => f.write_str("memory.grow"),
            Self::MemoryFill => f.write_str("memory.fill"),
            Self::Const(c) => write!(f, "{}.const {c}", c.ty()),
            Self::Binary { ty, op } => write!(f, "{ty}.{}", op.mnemonic(*ty)),
            Self::Compare { ty, op } => write!(f, "{ty}.{}", op.mnemonic(*ty)),
            Self::Eqz(ty) => write!(f, "{ty}.eqz"),
            Self::FloatUnary { ty, op } => write!(f, "{ty}.{op}"),
            Self::Extend { ty, from_bits } => write!(f, "{ty}.extend{from_bits}_s"),
            Self::Convert { from, to, signed } => {
                let s = if *signed { 's' } else { 'u' };
                match (from.is_float(), to.is_float()) {
                    (false, false) if to.bits() < from.bits() => write!(f, "{to}.wrap_{from}"),
                    (false, false) => write!(f, "{to}.extend_{from}_{s}"),
                    (false, true) => write!(f, "{to}.convert_{from}_{s}"),
                    (true, false) => write!(f, "{to}.trunc_sat_{from}_{s}"),
                    (true, true) if to.bits() < from.bits() => write!(f, "{to}.demote_{from}"),
                    (true, true) => write!(f, "{to}.promote_{from}"),
                }
            }
        }
    }
}
