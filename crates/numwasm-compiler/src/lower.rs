//! Kernel lowering: checked kernel bodies to IR.
//!
//! Each kernel becomes one *inner* function, `__nw_impl.<module>.<name>`,
//! which works on the native array representation: an array of rank `r` is
//! `5 + 2r` word values in descriptor field order
//!
//! ```text
//! meminfo, parent, nitems, itemsize, data, shape[0..r], strides[0..r]
//! ```
//!
//! passed as that many parameters and returned as that many results.
//! Scalars narrower than 32 bits live in `i32` and are re-normalized after
//! every arithmetic step (sign-extended or masked to their width).

use numwasm_ir::{
    BinaryOp, BlockType, CmpOp, Const, FloatUnaryOp, FnAttrs, FuncType, FunctionBuilder, Inst,
    IrModule, IrType, Linkage,
};
use numwasm_types::descriptor::{FIELD_DATA, FIELD_ITEMSIZE, FIELD_NITEMS, HEADER_WORDS};
use numwasm_types::kernel::{BinOp, Expr, KernelDecl, Stmt, UnaryOp};
use numwasm_types::{FunctionSignature, ScalarKind, ScalarType, ScalarValue, SemanticType};

use crate::check::{SignatureTable, INDEX_TYPE};
use crate::env::{NameTypes, ScopedEnv};
use crate::error::{CompileError, CompileResult};
use crate::globals;
use crate::target::TargetConfig;

/// Prefix of inner (array-native) function symbols.
pub const IMPL_PREFIX: &str = "__nw_impl.";

/// Word offset of the data pointer inside a meminfo record.
pub const MEMINFO_DATA_WORD: u32 = 3;

/// Symbol of the inner function for kernel `qualified`.
pub fn impl_symbol(qualified: &str) -> String {
    format!("{IMPL_PREFIX}{qualified}")
}

// ══════════════════════════════════════════════════════════════════════════════
// Representation
// ══════════════════════════════════════════════════════════════════════════════

/// Value type holding a scalar.
pub fn scalar_ir(ty: ScalarType) -> IrType {
    match (ty.kind, ty.width) {
        (ScalarKind::Float, 32) => IrType::F32,
        (ScalarKind::Float, _) => IrType::F64,
        (ScalarKind::Int | ScalarKind::UInt, 64) => IrType::I64,
        _ => IrType::I32,
    }
}

/// Number of word values in the native form of a rank-`rank` array.
pub fn array_words(rank: u32) -> usize {
    (HEADER_WORDS + 2 * rank) as usize
}

/// Flattened value types of `ty` in the native representation.
pub fn native_types(ty: SemanticType, word: IrType) -> Vec<IrType> {
    match ty {
        SemanticType::Scalar(s) => vec![scalar_ir(s)],
        SemanticType::Array { rank, .. } => vec![word; array_words(rank)],
        SemanticType::Void => Vec::new(),
    }
}

/// Type of the inner function for `sig`.
pub fn inner_type(sig: &FunctionSignature, word: IrType) -> FuncType {
    FuncType::new(
        sig.params()
            .iter()
            .flat_map(|p| native_types(*p, word))
            .collect(),
        native_types(sig.ret(), word),
    )
}

// ══════════════════════════════════════════════════════════════════════════════
// Entry point
// ══════════════════════════════════════════════════════════════════════════════

/// Lower `decl` into its inner function and add it to `module`, together
/// with declarations of every symbol it references.
pub fn lower_kernel(
    decl: &KernelDecl,
    sig: &FunctionSignature,
    table: &SignatureTable,
    config: &TargetConfig,
    module: &mut IrModule,
) -> CompileResult<()> {
    let word = IrType::word(config.word_bits);
    let ty = inner_type(sig, word);
    let mut lowerer = Lowerer {
        function: decl.qualified_name(),
        table,
        config,
        word,
        module,
        b: FunctionBuilder::new(ty.params, ty.results),
        env: ScopedEnv::new(),
    };

    let mut next = 0u32;
    for (param, ty) in decl.params.iter().zip(sig.params()) {
        let count = native_types(*ty, word).len() as u32;
        let locals = (next..next + count).collect();
        next += count;
        lowerer.env.define(&param.name, Slot { ty: *ty, locals });
    }

    lowerer.lower_block(&decl.body)?;
    if !lowerer.b.results().is_empty() {
        // Falling off the end of a value-returning kernel traps.
        lowerer.b.push(Inst::Unreachable);
    }
    lowerer.b.attrs(FnAttrs {
        noinline: true,
        noalias_return: false,
    });

    let Lowerer { b, module, .. } = lowerer;
    module.add_function(b.finish(impl_symbol(&decl.qualified_name()), Linkage::External))?;
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Lowerer
// ══════════════════════════════════════════════════════════════════════════════

/// Locals holding one named value.
#[derive(Debug, Clone)]
struct Slot {
    ty: SemanticType,
    locals: Vec<u32>,
}

impl NameTypes for ScopedEnv<Slot> {
    fn type_of(&self, name: &str) -> Option<SemanticType> {
        self.lookup(name).map(|slot| slot.ty)
    }
}

struct Lowerer<'a> {
    function: String,
    table: &'a SignatureTable,
    config: &'a TargetConfig,
    word: IrType,
    module: &'a mut IrModule,
    b: FunctionBuilder,
    env: ScopedEnv<Slot>,
}

impl Lowerer<'_> {
    fn err(&self, message: impl Into<String>) -> CompileError {
        CompileError::ty(&self.function, message)
    }

    fn word_bytes(&self) -> u32 {
        self.word.bits() / 8
    }

    // ── Statements ───────────────────────────────────────────────────────

    fn lower_block(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_scoped(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
        self.env.push_scope();
        let result = self.lower_block(stmts);
        self.env.pop_scope();
        result
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Let { name, value } => {
                let ty = self.lower_expr(value)?;
                let locals = self.pop_into_fresh(ty);
                self.env.define(name, Slot { ty, locals });
            }

            Stmt::Assign { name, value } => {
                let slot = self
                    .env
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| self.err(format!("assignment to undeclared `{name}`")))?;
                self.lower_expr(value)?;
                self.pop_into(&slot.locals);
            }

            Stmt::Store {
                array,
                indices,
                value,
            } => {
                let (element, locals) = self.array_operand(array)?;
                self.element_address(&locals, indices)?;
                self.lower_expr(value)?;
                self.b.push(store_element(element, 0));
            }

            Stmt::InPlace { array, op, value } => {
                let (element, locals) = self.array_operand(array)?;
                self.lower_in_place(element, &locals, *op, value)?;
            }

            Stmt::For {
                var,
                start,
                end,
                body,
            } => self.lower_for(var, start, end, body)?,

            Stmt::While { cond, body } => {
                self.b.extend([Inst::Block(BlockType::Empty), Inst::Loop(BlockType::Empty)]);
                self.lower_expr(cond)?;
                self.b.extend([Inst::Eqz(IrType::I32), Inst::BrIf(1)]);
                self.lower_scoped(body)?;
                self.b.extend([Inst::Br(0), Inst::End, Inst::End]);
            }

            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.lower_expr(cond)?;
                self.b.push(Inst::If(BlockType::Empty));
                self.lower_scoped(then_body)?;
                if !else_body.is_empty() {
                    self.b.push(Inst::Else);
                    self.lower_scoped(else_body)?;
                }
                self.b.push(Inst::End);
            }

            Stmt::Return { value } => {
                if let Some(value) = value {
                    self.lower_expr(value)?;
                }
                self.b.push(Inst::Return);
            }

            Stmt::Expr { expr } => {
                let ty = self.lower_expr(expr)?;
                for _ in native_types(ty, self.word) {
                    self.b.push(Inst::Drop);
                }
            }

            Stmt::GlobalSet { name, ty, value } => {
                self.lower_expr(value)?;
                let inst = globals::emit_set(self.module, name, *ty);
                self.b.push(inst);
            }

            Stmt::Pass => {}
        }
        Ok(())
    }

    fn lower_for(&mut self, var: &str, start: &Expr, end: &Expr, body: &[Stmt]) -> CompileResult<()> {
        let ty = match self.lower_expr(start)? {
            SemanticType::Scalar(s) if s.is_integer() => s,
            other => return Err(self.err(format!("range start must be an integer, got {other}"))),
        };
        let ir = scalar_ir(ty);
        let counter = self.b.local(ir);
        self.b.push(Inst::LocalSet(counter));
        self.lower_expr(end)?;
        let limit = self.b.local(ir);
        self.b.push(Inst::LocalSet(limit));

        let ge = if ty.is_signed() { CmpOp::GeS } else { CmpOp::GeU };
        self.b.extend([
            Inst::Block(BlockType::Empty),
            Inst::Loop(BlockType::Empty),
            Inst::LocalGet(counter),
            Inst::LocalGet(limit),
            Inst::compare(ir, ge),
            Inst::BrIf(1),
        ]);

        self.env.push_scope();
        self.env.define(
            var,
            Slot {
                ty: ty.into(),
                locals: vec![counter],
            },
        );
        let result = self.lower_scoped(body);
        self.env.pop_scope();
        result?;

        self.b.extend([
            Inst::LocalGet(counter),
            Inst::Const(Const::word(ir, 1)),
            Inst::binary(ir, BinaryOp::Add),
        ]);
        self.normalize(ty);
        self.b.extend([Inst::LocalSet(counter), Inst::Br(0), Inst::End, Inst::End]);
        Ok(())
    }

    /// `array <op>= value` over every element, in flat order. Walks the data
    /// block linearly, so the array must be C-contiguous; the bridge refuses
    /// anything else.
    fn lower_in_place(
        &mut self,
        element: ScalarType,
        locals: &[u32],
        op: BinOp,
        value: &Expr,
    ) -> CompileResult<()> {
        let ir = scalar_ir(element);
        let word = self.word;
        self.lower_expr(value)?;
        let operand = self.b.local(ir);
        self.b.push(Inst::LocalSet(operand));

        let index = self.b.local(word);
        let address = self.b.local(word);
        self.b.extend([
            Inst::Const(Const::zero(word)),
            Inst::LocalSet(index),
            Inst::Block(BlockType::Empty),
            Inst::Loop(BlockType::Empty),
            Inst::LocalGet(index),
            Inst::LocalGet(locals[FIELD_NITEMS as usize]),
            Inst::compare(word, CmpOp::GeU),
            Inst::BrIf(1),
            Inst::LocalGet(locals[FIELD_DATA as usize]),
            Inst::LocalGet(index),
            Inst::LocalGet(locals[FIELD_ITEMSIZE as usize]),
            Inst::binary(word, BinaryOp::Mul),
            Inst::binary(word, BinaryOp::Add),
            Inst::LocalTee(address),
            Inst::LocalGet(address),
            load_element(element, 0),
            Inst::LocalGet(operand),
            Inst::binary(ir, arithmetic_op(op, element)),
        ]);
        self.normalize(element);
        self.b.extend([
            store_element(element, 0),
            Inst::LocalGet(index),
            Inst::Const(Const::word(word, 1)),
            Inst::binary(word, BinaryOp::Add),
            Inst::LocalSet(index),
            Inst::Br(0),
            Inst::End,
            Inst::End,
        ]);
        Ok(())
    }

    // ── Expressions ──────────────────────────────────────────────────────

    /// Push the value(s) of `expr`; returns its type.
    fn lower_expr(&mut self, expr: &Expr) -> CompileResult<SemanticType> {
        match expr {
            Expr::Var { name } => {
                let slot = self
                    .env
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| self.err(format!("unknown name `{name}`")))?;
                self.b.extend(slot.locals.iter().map(|&l| Inst::LocalGet(l)));
                Ok(slot.ty)
            }

            Expr::Lit { value } => {
                self.b.push(Inst::Const(scalar_const(*value)));
                Ok(value.ty().into())
            }

            Expr::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),

            Expr::Unary { op, operand } => {
                let ty = self.scalar_expr_type(operand)?;
                let ir = scalar_ir(ty);
                match op {
                    UnaryOp::Not => {
                        self.lower_expr(operand)?;
                        self.b.push(Inst::Eqz(IrType::I32));
                    }
                    UnaryOp::Neg if ty.is_float() => {
                        self.lower_expr(operand)?;
                        self.b.push(Inst::FloatUnary {
                            ty: ir,
                            op: FloatUnaryOp::Neg,
                        });
                    }
                    UnaryOp::Neg => {
                        self.b.push(Inst::Const(Const::zero(ir)));
                        self.lower_expr(operand)?;
                        self.b.push(Inst::binary(ir, BinaryOp::Sub));
                        self.normalize(ty);
                    }
                }
                Ok(ty.into())
            }

            Expr::Cast { to, expr } => {
                let from = match self.lower_expr(expr)? {
                    SemanticType::Scalar(s) => s,
                    other => return Err(self.err(format!("cannot cast {other}"))),
                };
                self.cast(from, *to);
                Ok((*to).into())
            }

            Expr::Call { callee, args } => {
                let sig = self.table.get(callee).cloned().ok_or_else(|| {
                    CompileError::UnknownFunction {
                        function: self.function.clone(),
                        callee: callee.clone(),
                    }
                })?;
                for arg in args {
                    self.lower_expr(arg)?;
                }
                let symbol = impl_symbol(callee);
                self.module
                    .declare_function(&symbol, inner_type(&sig, self.word));
                self.b.push(Inst::call(symbol));
                Ok(sig.ret())
            }

            Expr::Zeros { element, shape } => {
                let locals = self.lower_zeros(*element, shape)?;
                self.b.extend(locals.iter().map(|&l| Inst::LocalGet(l)));
                Ok(SemanticType::array(*element, shape.len() as u32))
            }

            Expr::Index { array, indices } => {
                let (element, locals) = self.array_operand(array)?;
                self.element_address(&locals, indices)?;
                self.b.push(load_element(element, 0));
                Ok(element.into())
            }

            Expr::Shape { array, dim } => {
                let (_, locals) = self.array_operand(array)?;
                let shape_word = HEADER_WORDS as usize + *dim as usize;
                let Some(&local) = locals.get(shape_word) else {
                    return Err(self.err(format!("dimension {dim} out of range")));
                };
                self.b.push(Inst::LocalGet(local));
                self.word_to_index();
                Ok(INDEX_TYPE.into())
            }

            Expr::Size { array } => {
                let (_, locals) = self.array_operand(array)?;
                self.b.push(Inst::LocalGet(locals[FIELD_NITEMS as usize]));
                self.word_to_index();
                Ok(INDEX_TYPE.into())
            }

            Expr::GlobalGet { name, ty } => {
                let inst = globals::emit_get(self.module, name, *ty);
                self.b.push(inst);
                Ok((*ty).into())
            }
        }
    }

    fn lower_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> CompileResult<SemanticType> {
        match op {
            BinOp::And => {
                self.lower_expr(lhs)?;
                self.b.push(Inst::If(BlockType::Value(IrType::I32)));
                self.lower_expr(rhs)?;
                self.b.extend([Inst::Else, Inst::i32(0), Inst::End]);
                return Ok(ScalarType::BOOL.into());
            }
            BinOp::Or => {
                self.lower_expr(lhs)?;
                self.b
                    .extend([Inst::If(BlockType::Value(IrType::I32)), Inst::i32(1), Inst::Else]);
                self.lower_expr(rhs)?;
                self.b.push(Inst::End);
                return Ok(ScalarType::BOOL.into());
            }
            _ => {}
        }

        let ty = match self.lower_expr(lhs)? {
            SemanticType::Scalar(s) => s,
            other => return Err(self.err(format!("operand of `{op}` is {other}"))),
        };
        self.lower_expr(rhs)?;
        let ir = scalar_ir(ty);
        if op.is_comparison() {
            self.b.push(Inst::compare(ir, compare_op(op, ty)));
            return Ok(ScalarType::BOOL.into());
        }
        self.b.push(Inst::binary(ir, arithmetic_op(op, ty)));
        self.normalize(ty);
        Ok(ty.into())
    }

    /// Allocate a zero-filled C-contiguous array; returns its field locals.
    fn lower_zeros(&mut self, element: ScalarType, shape: &[Expr]) -> CompileResult<Vec<u32>> {
        let word = self.word;
        let w = self.word_bytes();
        let rank = shape.len();
        let locals: Vec<u32> = (0..array_words(rank as u32))
            .map(|_| self.b.local(word))
            .collect();
        let shape_local = |k: usize| locals[HEADER_WORDS as usize + k];
        let stride_local = |k: usize| locals[HEADER_WORDS as usize + rank + k];

        for (k, dim) in shape.iter().enumerate() {
            let ty = match self.lower_expr(dim)? {
                SemanticType::Scalar(s) => s,
                other => return Err(self.err(format!("array dimension is {other}"))),
            };
            self.to_word(ty);
            self.b.push(Inst::LocalSet(shape_local(k)));
        }

        let itemsize = i64::from(element.byte_size());
        // nitems = product of the shape
        self.b.push(Inst::Const(Const::word(word, 1)));
        for k in 0..rank {
            self.b
                .extend([Inst::LocalGet(shape_local(k)), Inst::binary(word, BinaryOp::Mul)]);
        }
        self.b.push(Inst::LocalSet(locals[FIELD_NITEMS as usize]));

        // strides, innermost first
        for k in (0..rank).rev() {
            if k + 1 == rank {
                self.b.push(Inst::Const(Const::word(word, itemsize)));
            } else {
                self.b.extend([
                    Inst::LocalGet(stride_local(k + 1)),
                    Inst::LocalGet(shape_local(k + 1)),
                    Inst::binary(word, BinaryOp::Mul),
                ]);
            }
            self.b.push(Inst::LocalSet(stride_local(k)));
        }

        let alloc = self.config.meminfo_alloc_symbol.clone();
        self.module
            .declare_function(&alloc, FuncType::new(vec![word, word], vec![word]));
        self.b.extend([
            Inst::LocalGet(locals[FIELD_NITEMS as usize]),
            Inst::Const(Const::word(word, itemsize)),
            Inst::binary(word, BinaryOp::Mul),
            Inst::Const(Const::word(word, itemsize.max(i64::from(w)))),
            Inst::call(alloc),
            Inst::LocalTee(locals[0]),
            Inst::load(word, MEMINFO_DATA_WORD * w),
            Inst::LocalSet(locals[FIELD_DATA as usize]),
            Inst::Const(Const::word(word, itemsize)),
            Inst::LocalSet(locals[FIELD_ITEMSIZE as usize]),
        ]);
        // parent stays zero: fresh locals are zero-initialized.
        Ok(locals)
    }

    // ── Arrays ───────────────────────────────────────────────────────────

    /// Locals holding the fields of an array operand, spilling non-variable
    /// expressions into fresh locals.
    fn array_operand(&mut self, array: &Expr) -> CompileResult<(ScalarType, Vec<u32>)> {
        if let Expr::Var { name } = array {
            if let Some(Slot {
                ty: SemanticType::Array { element, .. },
                locals,
            }) = self.env.lookup(name)
            {
                return Ok((*element, locals.clone()));
            }
        }
        match self.lower_expr(array)? {
            ty @ SemanticType::Array { element, .. } => Ok((element, self.pop_into_fresh(ty))),
            other => Err(self.err(format!("expected an array, got {other}"))),
        }
    }

    /// Push `data + Σ index[k] * stride[k]`.
    fn element_address(&mut self, locals: &[u32], indices: &[Expr]) -> CompileResult<()> {
        let word = self.word;
        let rank = (locals.len() - HEADER_WORDS as usize) / 2;
        self.b.push(Inst::LocalGet(locals[FIELD_DATA as usize]));
        for (k, index) in indices.iter().enumerate() {
            let ty = match self.lower_expr(index)? {
                SemanticType::Scalar(s) => s,
                other => return Err(self.err(format!("index is {other}"))),
            };
            self.to_word(ty);
            self.b.extend([
                Inst::LocalGet(locals[HEADER_WORDS as usize + rank + k]),
                Inst::binary(word, BinaryOp::Mul),
                Inst::binary(word, BinaryOp::Add),
            ]);
        }
        Ok(())
    }

    fn pop_into_fresh(&mut self, ty: SemanticType) -> Vec<u32> {
        let locals: Vec<u32> = native_types(ty, self.word)
            .into_iter()
            .map(|t| self.b.local(t))
            .collect();
        self.pop_into(&locals);
        locals
    }

    /// Pop stack values into `locals`; the last pushed value goes last.
    fn pop_into(&mut self, locals: &[u32]) {
        for &local in locals.iter().rev() {
            self.b.push(Inst::LocalSet(local));
        }
    }

    // ── Conversions ──────────────────────────────────────────────────────

    fn scalar_expr_type(&self, expr: &Expr) -> CompileResult<ScalarType> {
        match crate::check::infer_expr(&self.function, expr, &self.env, self.table)? {
            SemanticType::Scalar(s) => Ok(s),
            other => Err(self.err(format!("expected a scalar, got {other}"))),
        }
    }

    /// Re-establish the canonical form of a narrow integer.
    fn normalize(&mut self, ty: ScalarType) {
        match (ty.kind, ty.width) {
            (ScalarKind::Int, 8 | 16) => {
                self.b.push(Inst::Extend {
                    ty: IrType::I32,
                    from_bits: u32::from(ty.width),
                });
            }
            (ScalarKind::UInt, 8 | 16) => {
                self.b.extend([
                    Inst::i32((1i32 << ty.width) - 1),
                    Inst::binary(IrType::I32, BinaryOp::And),
                ]);
            }
            _ => {}
        }
    }

    /// Convert an integer on the stack to a word.
    fn to_word(&mut self, ty: ScalarType) {
        let from = scalar_ir(ty);
        if from == self.word {
            return;
        }
        self.b.push(Inst::Convert {
            from,
            to: self.word,
            signed: ty.is_signed(),
        });
    }

    /// Widen a word on the stack to the index type.
    fn word_to_index(&mut self) {
        let to = scalar_ir(INDEX_TYPE);
        if self.word != to {
            self.b.push(Inst::Convert {
                from: self.word,
                to,
                signed: false,
            });
        }
    }

    fn cast(&mut self, from: ScalarType, to: ScalarType) {
        if from == to {
            return;
        }
        let (fi, ti) = (scalar_ir(from), scalar_ir(to));
        if to.is_bool() {
            self.b
                .extend([Inst::Const(Const::zero(fi)), Inst::compare(fi, CmpOp::Ne)]);
            return;
        }
        match (from.is_float(), to.is_float()) {
            (true, true) => {
                if fi != ti {
                    self.b.push(Inst::Convert {
                        from: fi,
                        to: ti,
                        signed: true,
                    });
                }
            }
            (false, true) => {
                self.b.push(Inst::Convert {
                    from: fi,
                    to: ti,
                    signed: from.kind == ScalarKind::Int,
                });
            }
            (true, false) => {
                self.b.push(Inst::Convert {
                    from: fi,
                    to: ti,
                    signed: to.kind == ScalarKind::Int,
                });
                self.normalize(to);
            }
            (false, false) => {
                if fi != ti {
                    self.b.push(Inst::Convert {
                        from: fi,
                        to: ti,
                        signed: from.kind == ScalarKind::Int,
                    });
                }
                self.normalize(to);
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// IR constant holding `value` in its native representation.
pub fn scalar_const(value: ScalarValue) -> Const {
    match value {
        ScalarValue::F32(v) => Const::F32(v),
        ScalarValue::F64(v) => Const::F64(v),
        ScalarValue::U64(v) => Const::I64(v as i64),
        ScalarValue::I64(v) => Const::I64(v),
        other => Const::I32(other.as_i64() as i32),
    }
}

fn arithmetic_op(op: BinOp, ty: ScalarType) -> BinaryOp {
    let unsigned = ty.kind == ScalarKind::UInt;
    match op {
        BinOp::Sub => BinaryOp::Sub,
        BinOp::Mul => BinaryOp::Mul,
        BinOp::Div if unsigned => BinaryOp::DivU,
        BinOp::Div => BinaryOp::DivS,
        BinOp::Rem if unsigned => BinaryOp::RemU,
        BinOp::Rem => BinaryOp::RemS,
        _ => BinaryOp::Add,
    }
}

fn compare_op(op: BinOp, ty: ScalarType) -> CmpOp {
    let unsigned = matches!(ty.kind, ScalarKind::UInt | ScalarKind::Bool);
    match (op, unsigned) {
        (BinOp::Lt, false) => CmpOp::LtS,
        (BinOp::Lt, true) => CmpOp::LtU,
        (BinOp::Le, false) => CmpOp::LeS,
        (BinOp::Le, true) => CmpOp::LeU,
        (BinOp::Gt, false) => CmpOp::GtS,
        (BinOp::Gt, true) => CmpOp::GtU,
        (BinOp::Ge, false) => CmpOp::GeS,
        (BinOp::Ge, true) => CmpOp::GeU,
        (BinOp::Ne, _) => CmpOp::Ne,
        _ => CmpOp::Eq,
    }
}

fn load_element(element: ScalarType, offset: u32) -> Inst {
    let bytes = element.byte_size();
    Inst::Load {
        ty: scalar_ir(element),
        bytes,
        signed: element.kind == ScalarKind::Int,
        mem: numwasm_ir::MemArg::natural(offset, bytes),
    }
}

fn store_element(element: ScalarType, offset: u32) -> Inst {
    let bytes = element.byte_size();
    Inst::Store {
        ty: scalar_ir(element),
        bytes,
        mem: numwasm_ir::MemArg::natural(offset, bytes),
    }
}
