//! wasm32 emission.
//!
//! Lowers a finalized, linked 32-bit [`IrModule`] to a WebAssembly binary:
//!
//! 1. Type section (one entry per distinct signature, first use order)
//! 2. Function section (every defined function, module order)
//! 3. Memory section (one linear memory)
//! 4. Global section (one wasm global per IR global)
//! 5. Export section (`external` + `default` functions, and `memory`)
//! 6. Code section
//! 7. Custom section (`numwasm` metadata)
//! 8. Validation with `wasmparser`
//!
//! The output relies on multi-value returns, saturating float→int
//! conversion, sign-extension and bulk-memory `memory.fill`.

use std::borrow::Cow;
use std::collections::HashMap;

use indexmap::IndexMap;
use numwasm_compiler::TargetConfig;
use numwasm_ir::{
    BinaryOp, BlockType, CmpOp, Const, FloatUnaryOp, FuncType, Inst, IrModule, IrType, Linkage,
    MemArg, Visibility,
};
use wasm_encoder::{
    CodeSection, ConstExpr, CustomSection, ExportKind, ExportSection, Function, FunctionSection,
    GlobalSection, GlobalType, Instruction, MemorySection, MemoryType, Module, TypeSection,
    ValType,
};

use crate::error::{CodegenError, CodegenResult};

/// Name of the metadata custom section.
pub const CUSTOM_SECTION_NAME: &str = "numwasm";

/// Compiler version recorded in the custom section.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Emit `module` as a validated wasm32 binary.
pub fn emit_wasm(module: &IrModule, config: &TargetConfig) -> CodegenResult<Vec<u8>> {
    if module.layout.pointer_bits != 32 {
        return Err(CodegenError::Unsupported(format!(
            "{}-bit data layout; only 32-bit modules can be emitted",
            module.layout.pointer_bits
        )));
    }
    if let Some(symbol) = module.undefined_symbols().into_iter().next() {
        return Err(CodegenError::UnresolvedSymbol(symbol));
    }

    let indices = Indices::new(module);
    let mut types: IndexMap<FuncType, u32> = IndexMap::new();
    let mut wasm = Module::new();

    // 1–2. Types and functions
    let mut functions = FunctionSection::new();
    for f in module.functions() {
        let next = types.len() as u32;
        let ty = *types.entry(f.ty.clone()).or_insert(next);
        functions.function(ty);
    }
    let mut type_section = TypeSection::new();
    for ty in types.keys() {
        type_section.ty().function(
            ty.params.iter().map(|t| val_type(*t)),
            ty.results.iter().map(|t| val_type(*t)),
        );
    }
    wasm.section(&type_section);
    wasm.section(&functions);

    // 3. Memory
    let mut memory = MemorySection::new();
    memory.memory(MemoryType {
        minimum: u64::from(config.memory_pages),
        maximum: config.max_memory_pages.map(u64::from),
        memory64: false,
        shared: false,
        page_size_log2: None,
    });
    wasm.section(&memory);

    // 4. Globals
    let mut globals = GlobalSection::new();
    for g in module.globals() {
        let init = g.init.unwrap_or_else(|| Const::zero(g.ty));
        globals.global(
            GlobalType {
                val_type: val_type(g.ty),
                mutable: g.mutable,
                shared: false,
            },
            &const_expr(init),
        );
    }
    wasm.section(&globals);

    // 5. Exports
    let mut exports = ExportSection::new();
    for (index, f) in module.functions().enumerate() {
        if f.linkage == Linkage::External && f.visibility == Visibility::Default {
            exports.export(&f.name, ExportKind::Func, index as u32);
        }
    }
    exports.export("memory", ExportKind::Memory, 0);
    wasm.section(&exports);

    // 6. Code
    let mut code = CodeSection::new();
    for f in module.functions() {
        let Some(body) = &f.body else {
            return Err(CodegenError::UnresolvedSymbol(f.name.clone()));
        };
        let mut func = Function::new(body.locals.iter().map(|t| (1, val_type(*t))));
        for inst in &body.insts {
            let lowered = lower_inst(inst, &indices, &f.name)?;
            for i in &lowered {
                func.instruction(i);
            }
        }
        code.function(&func);
    }
    wasm.section(&code);

    // 7. Custom
    wasm.section(&CustomSection {
        name: Cow::Borrowed(CUSTOM_SECTION_NAME),
        data: Cow::Borrowed(COMPILER_VERSION.as_bytes()),
    });

    let bytes = wasm.finish();

    // 8. Validate
    wasmparser::validate(&bytes).map_err(|e| CodegenError::ValidationFailed(format!("{e}")))?;

    tracing::debug!(
        module = %module.name,
        bytes = bytes.len(),
        types = types.len(),
        "emitted wasm"
    );
    Ok(bytes)
}

// ══════════════════════════════════════════════════════════════════════════════
// Symbol indices
// ══════════════════════════════════════════════════════════════════════════════

struct Indices {
    functions: HashMap<String, u32>,
    globals: HashMap<String, u32>,
}

impl Indices {
    fn new(module: &IrModule) -> Self {
        Self {
            functions: module
                .functions()
                .enumerate()
                .map(|(i, f)| (f.name.clone(), i as u32))
                .collect(),
            globals: module
                .globals()
                .enumerate()
                .map(|(i, g)| (g.name.clone(), i as u32))
                .collect(),
        }
    }

    fn function(&self, name: &str) -> CodegenResult<u32> {
        self.functions
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))
    }

    fn global(&self, name: &str) -> CodegenResult<u32> {
        self.globals
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Instruction lowering
// ══════════════════════════════════════════════════════════════════════════════

fn val_type(ty: IrType) -> ValType {
    match ty {
        IrType::I32 => ValType::I32,
        IrType::I64 => ValType::I64,
        IrType::F32 => ValType::F32,
        IrType::F64 => ValType::F64,
    }
}

fn const_expr(c: Const) -> ConstExpr {
    match c {
        Const::I32(v) => ConstExpr::i32_const(v),
        Const::I64(v) => ConstExpr::i64_const(v),
        Const::F32(v) => ConstExpr::f32_const(v),
        Const::F64(v) => ConstExpr::f64_const(v),
    }
}

fn block_type(bt: BlockType) -> wasm_encoder::BlockType {
    match bt {
        BlockType::Empty => wasm_encoder::BlockType::Empty,
        BlockType::Value(t) => wasm_encoder::BlockType::Result(val_type(t)),
    }
}

fn memarg(mem: MemArg) -> wasm_encoder::MemArg {
    wasm_encoder::MemArg {
        offset: u64::from(mem.offset),
        align: mem.align,
        memory_index: 0,
    }
}

/// One IR instruction as zero or more wasm instructions.
fn lower_inst(
    inst: &Inst,
    indices: &Indices,
    function: &str,
) -> CodegenResult<Vec<Instruction<'static>>> {
    let unsupported =
        |what: String| CodegenError::Unsupported(format!("{what} in `{function}`"));
    let one = |i: Instruction<'static>| Ok(vec![i]);

    match inst {
        Inst::Unreachable => one(Instruction::Unreachable),
        Inst::Nop => one(Instruction::Nop),
        Inst::Block(bt) => one(Instruction::Block(block_type(*bt))),
        Inst::Loop(bt) => one(Instruction::Loop(block_type(*bt))),
        Inst::If(bt) => one(Instruction::If(block_type(*bt))),
        Inst::Else => one(Instruction::Else),
        Inst::End => one(Instruction::End),
        Inst::Br(d) => one(Instruction::Br(*d)),
        Inst::BrIf(d) => one(Instruction::BrIf(*d)),
        Inst::Return => one(Instruction::Return),
        // `noinline` only constrains IR-level lowering; wasm calls are never inlined.
        Inst::Call { callee, .. } => one(Instruction::Call(indices.function(callee)?)),
        Inst::Drop => one(Instruction::Drop),
        Inst::Select => one(Instruction::Select),
        Inst::LocalGet(i) => one(Instruction::LocalGet(*i)),
        Inst::LocalSet(i) => one(Instruction::LocalSet(*i)),
        Inst::LocalTee(i) => one(Instruction::LocalTee(*i)),
        Inst::GlobalGet(g) => one(Instruction::GlobalGet(indices.global(g)?)),
        Inst::GlobalSet(g) => one(Instruction::GlobalSet(indices.global(g)?)),
        Inst::Load {
            ty,
            bytes,
            signed,
            mem,
        } => load(*ty, *bytes, *signed, memarg(*mem))
            .map(|i| vec![i])
            .ok_or_else(|| unsupported(format!("{bytes}-byte {ty} load"))),
        Inst::Store { ty, bytes, mem } => store(*ty, *bytes, memarg(*mem))
            .map(|i| vec![i])
            .ok_or_else(|| unsupported(format!("{bytes}-byte {ty} store"))),
        Inst::MemorySize => one(Instruction::MemorySize(0)),
        Inst::MemoryGrow => one(Instruction::MemoryGrow(0)),
        Inst::MemoryFill => one(Instruction::MemoryFill(0)),
        Inst::Const(c) => one(match *c {
            Const::I32(v) => Instruction::I32Const(v),
            Const::I64(v) => Instruction::I64Const(v),
            Const::F32(v) => Instruction::F32Const(v),
            Const::F64(v) => Instruction::F64Const(v),
        }),
        Inst::Binary { ty, op } => binary(*ty, *op)
            .map(|i| vec![i])
            .ok_or_else(|| unsupported(format!("{ty} {op:?}"))),
        Inst::Compare { ty, op } => one(compare(*ty, *op)),
        Inst::Eqz(ty) => match ty {
            IrType::I32 => one(Instruction::I32Eqz),
            IrType::I64 => one(Instruction::I64Eqz),
            _ => Err(unsupported(format!("{ty}.eqz"))),
        },
        Inst::FloatUnary { ty, op } => float_unary(*ty, *op)
            .map(|i| vec![i])
            .ok_or_else(|| unsupported(format!("{ty}.{op}"))),
        Inst::Extend { ty, from_bits } => match (ty, from_bits) {
            (IrType::I32, 8) => one(Instruction::I32Extend8S),
            (IrType::I32, 16) => one(Instruction::I32Extend16S),
            (IrType::I64, 8) => one(Instruction::I64Extend8S),
            (IrType::I64, 16) => one(Instruction::I64Extend16S),
            (IrType::I64, 32) => one(Instruction::I64Extend32S),
            _ => Err(unsupported(format!("{ty}.extend{from_bits}_s"))),
        },
        Inst::Convert { from, to, signed } => Ok(convert(*from, *to, *signed)),
    }
}

fn load(ty: IrType, bytes: u32, signed: bool, m: wasm_encoder::MemArg) -> Option<Instruction<'static>> {
    Some(match (ty, bytes, signed) {
        (IrType::I32, 4, _) => Instruction::I32Load(m),
        (IrType::I64, 8, _) => Instruction::I64Load(m),
        (IrType::F32, 4, _) => Instruction::F32Load(m),
        (IrType::F64, 8, _) => Instruction::F64Load(m),
        (IrType::I32, 1, true) => Instruction::I32Load8S(m),
        (IrType::I32, 1, false) => Instruction::I32Load8U(m),
        (IrType::I32, 2, true) => Instruction::I32Load16S(m),
        (IrType::I32, 2, false) => Instruction::I32Load16U(m),
        (IrType::I64, 1, true) => Instruction::I64Load8S(m),
        (IrType::I64, 1, false) => Instruction::I64Load8U(m),
        (IrType::I64, 2, true) => Instruction::I64Load16S(m),
        (IrType::I64, 2, false) => Instruction::I64Load16U(m),
        (IrType::I64, 4, true) => Instruction::I64Load32S(m),
        (IrType::I64, 4, false) => Instruction::I64Load32U(m),
        _ => return None,
    })
}

fn store(ty: IrType, bytes: u32, m: wasm_encoder::MemArg) -> Option<Instruction<'static>> {
    Some(match (ty, bytes) {
        (IrType::I32, 4) => Instruction::I32Store(m),
        (IrType::I64, 8) => Instruction::I64Store(m),
        (IrType::F32, 4) => Instruction::F32Store(m),
        (IrType::F64, 8) => Instruction::F64Store(m),
        (IrType::I32, 1) => Instruction::I32Store8(m),
        (IrType::I32, 2) => Instruction::I32Store16(m),
        (IrType::I64, 1) => Instruction::I64Store8(m),
        (IrType::I64, 2) => Instruction::I64Store16(m),
        (IrType::I64, 4) => Instruction::I64Store32(m),
        _ => return None,
    })
}

fn binary(ty: IrType, op: BinaryOp) -> Option<Instruction<'static>> {
    use BinaryOp::*;
    Some(match ty {
        IrType::I32 => match op {
            Add => Instruction::I32Add,
            Sub => Instruction::I32Sub,
            Mul => Instruction::I32Mul,
            DivS => Instruction::I32DivS,
            DivU => Instruction::I32DivU,
            RemS => Instruction::I32RemS,
            RemU => Instruction::I32RemU,
            And => Instruction::I32And,
            Or => Instruction::I32Or,
            Xor => Instruction::I32Xor,
            Shl => Instruction::I32Shl,
            ShrS => Instruction::I32ShrS,
            ShrU => Instruction::I32ShrU,
            Min | Max => return None,
        },
        IrType::I64 => match op {
            Add => Instruction::I64Add,
            Sub => Instruction::I64Sub,
            Mul => Instruction::I64Mul,
            DivS => Instruction::I64DivS,
            DivU => Instruction::I64DivU,
            RemS => Instruction::I64RemS,
            RemU => Instruction::I64RemU,
            And => Instruction::I64And,
            Or => Instruction::I64Or,
            Xor => Instruction::I64Xor,
            Shl => Instruction::I64Shl,
            ShrS => Instruction::I64ShrS,
            ShrU => Instruction::I64ShrU,
            Min | Max => return None,
        },
        IrType::F32 => match op {
            Add => Instruction::F32Add,
            Sub => Instruction::F32Sub,
            Mul => Instruction::F32Mul,
            DivS | DivU => Instruction::F32Div,
            Min => Instruction::F32Min,
            Max => Instruction::F32Max,
            _ => return None,
        },
        IrType::F64 => match op {
            Add => Instruction::F64Add,
            Sub => Instruction::F64Sub,
            Mul => Instruction::F64Mul,
            DivS | DivU => Instruction::F64Div,
            Min => Instruction::F64Min,
            Max => Instruction::F64Max,
            _ => return None,
        },
    })
}

fn compare(ty: IrType, op: CmpOp) -> Instruction<'static> {
    use CmpOp::*;
    match ty {
        IrType::I32 => match op {
            Eq => Instruction::I32Eq,
            Ne => Instruction::I32Ne,
            LtS => Instruction::I32LtS,
            LtU => Instruction::I32LtU,
            LeS => Instruction::I32LeS,
            LeU => Instruction::I32LeU,
            GtS => Instruction::I32GtS,
            GtU => Instruction::I32GtU,
            GeS => Instruction::I32GeS,
            GeU => Instruction::I32GeU,
        },
        IrType::I64 => match op {
            Eq => Instruction::I64Eq,
            Ne => Instruction::I64Ne,
            LtS => Instruction::I64LtS,
            LtU => Instruction::I64LtU,
            LeS => Instruction::I64LeS,
            LeU => Instruction::I64LeU,
            GtS => Instruction::I64GtS,
            GtU => Instruction::I64GtU,
            GeS => Instruction::I64GeS,
            GeU => Instruction::I64GeU,
        },
        IrType::F32 => match op {
            Eq => Instruction::F32Eq,
            Ne => Instruction::F32Ne,
            LtS | LtU => Instruction::F32Lt,
            LeS | LeU => Instruction::F32Le,
            GtS | GtU => Instruction::F32Gt,
            GeS | GeU => Instruction::F32Ge,
        },
        IrType::F64 => match op {
            Eq => Instruction::F64Eq,
            Ne => Instruction::F64Ne,
            LtS | LtU => Instruction::F64Lt,
            LeS | LeU => Instruction::F64Le,
            GtS | GtU => Instruction::F64Gt,
            GeS | GeU => Instruction::F64Ge,
        },
    }
}

fn float_unary(ty: IrType, op: FloatUnaryOp) -> Option<Instruction<'static>> {
    use FloatUnaryOp::*;
    Some(match (ty, op) {
        (IrType::F32, Neg) => Instruction::F32Neg,
        (IrType::F32, Abs) => Instruction::F32Abs,
        (IrType::F32, Sqrt) => Instruction::F32Sqrt,
        (IrType::F32, Floor) => Instruction::F32Floor,
        (IrType::F32, Ceil) => Instruction::F32Ceil,
        (IrType::F32, Trunc) => Instruction::F32Trunc,
        (IrType::F64, Neg) => Instruction::F64Neg,
        (IrType::F64, Abs) => Instruction::F64Abs,
        (IrType::F64, Sqrt) => Instruction::F64Sqrt,
        (IrType::F64, Floor) => Instruction::F64Floor,
        (IrType::F64, Ceil) => Instruction::F64Ceil,
        (IrType::F64, Trunc) => Instruction::F64Trunc,
        _ => return None,
    })
}

/// Value-type conversion; empty when `from == to`.
fn convert(from: IrType, to: IrType, signed: bool) -> Vec<Instruction<'static>> {
    use IrType::*;
    let i = match (from, to, signed) {
        (I64, I32, _) => Instruction::I32WrapI64,
        (I32, I64, true) => Instruction::I64ExtendI32S,
        (I32, I64, false) => Instruction::I64ExtendI32U,
        (I32, F32, true) => Instruction::F32ConvertI32S,
        (I32, F32, false) => Instruction::F32ConvertI32U,
        (I64, F32, true) => Instruction::F32ConvertI64S,
        (I64, F32, false) => Instruction::F32ConvertI64U,
        (I32, F64, true) => Instruction::F64ConvertI32S,
        (I32, F64, false) => Instruction::F64ConvertI32U,
        (I64, F64, true) => Instruction::F64ConvertI64S,
        (I64, F64, false) => Instruction::F64ConvertI64U,
        (F32, I32, true) => Instruction::I32TruncSatF32S,
        (F32, I32, false) => Instruction::I32TruncSatF32U,
        (F64, I32, true) => Instruction::I32TruncSatF64S,
        (F64, I32, false) => Instruction::I32TruncSatF64U,
        (F32, I64, true) => Instruction::I64TruncSatF32S,
        (F32, I64, false) => Instruction::I64TruncSatF32U,
        (F64, I64, true) => Instruction::I64TruncSatF64S,
        (F64, I64, false) => Instruction::I64TruncSatF64U,
        (F64, F32, _) => Instruction::F32DemoteF64,
        (F32, F64, _) => Instruction::F64PromoteF32,
        _ => return Vec::new(),
    };
    vec![i]
}

#[cfg(test)]
mod tests {
    use super::*;
    use numwasm_ir::{DataLayout, FunctionBuilder};

    #[test]
    fn host_layout_is_rejected() {
        let module = IrModule::new("m", DataLayout::HOST64);
        assert!(matches!(
            emit_wasm(&module, &TargetConfig::host()),
            Err(CodegenError::Unsupported(_))
        ));
    }

    #[test]
    fn declarations_must_be_resolved() {
        let mut module = IrModule::new("m", DataLayout::WASM32);
        module.declare_function("missing", FuncType::new(vec![], vec![]));
        assert!(matches!(
            emit_wasm(&module, &TargetConfig::wasm32()),
            Err(CodegenError::UnresolvedSymbol(s)) if s == "missing"
        ));
    }

    #[test]
    fn multi_value_function_validates() {
        let mut module = IrModule::new("m", DataLayout::WASM32);
        let mut b = FunctionBuilder::new(vec![IrType::F64], vec![IrType::I32, IrType::F64]);
        b.extend([
            Inst::LocalGet(0),
            Inst::Convert {
                from: IrType::F64,
                to: IrType::I32,
                signed: true,
            },
            Inst::LocalGet(0),
        ]);
        module.add_function(b.finish("pair", Linkage::External)).unwrap();
        let bytes = emit_wasm(&module, &TargetConfig::wasm32()).unwrap();
        assert_eq!(&bytes[..4], b"\0asm");
    }

    #[test]
    fn emission_is_deterministic() {
        let mut module = IrModule::new("m", DataLayout::WASM32);
        let mut b = FunctionBuilder::new(vec![IrType::I32], vec![IrType::I32]);
        b.extend([Inst::LocalGet(0), Inst::i32(1), Inst::binary(IrType::I32, BinaryOp::Add)]);
        module.add_function(b.finish("inc", Linkage::External)).unwrap();
        let config = TargetConfig::wasm32();
        assert_eq!(
            emit_wasm(&module, &config).unwrap(),
            emit_wasm(&module, &config).unwrap()
        );
    }
}
