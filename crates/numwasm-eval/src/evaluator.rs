//! Core expression and statement evaluator.

use std::cmp::Ordering;
use std::ops::{Add, Div, Mul, Sub};

use numwasm_compiler::check::INDEX_TYPE;
use numwasm_compiler::env::ScopedEnv;
use numwasm_types::kernel::{BinOp, Expr, Stmt, UnaryOp};
use numwasm_types::{ScalarValue, SemanticType};
use tracing::trace;

use crate::error::{EvalError, EvalResult};
use crate::globals::GlobalSlots;
use crate::table::KernelTable;
use crate::value::{ArrayRef, HostArray, Value};

/// Steps allowed per evaluator before [`EvalError::GasExhausted`].
pub const DEFAULT_GAS_LIMIT: u64 = 1 << 32;

/// Deepest kernel call nesting before [`EvalError::CallDepthExceeded`].
pub const MAX_CALL_DEPTH: usize = 256;

type Locals = ScopedEnv<Value>;

/// How a statement finished.
enum Flow {
    Normal,
    Return(Value),
}

/// Walks kernel bodies and produces [`Value`]s.
///
/// One evaluator runs one top-level call (and everything it calls) against
/// a kernel table and a set of global slots.
pub struct Evaluator<'a> {
    kernels: &'a KernelTable,
    globals: &'a mut GlobalSlots,
    /// Gas counter, one unit per statement, expression and loop iteration.
    gas: u64,
    gas_limit: u64,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(kernels: &'a KernelTable, globals: &'a mut GlobalSlots) -> Self {
        Self {
            kernels,
            globals,
            gas: 0,
            gas_limit: DEFAULT_GAS_LIMIT,
            depth: 0,
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn gas_used(&self) -> u64 {
        self.gas
    }

    /// Consume one unit of gas. Returns error if exhausted.
    fn tick(&mut self) -> EvalResult<()> {
        self.gas += 1;
        if self.gas > self.gas_limit {
            Err(EvalError::GasExhausted)
        } else {
            Ok(())
        }
    }

    /// Call kernel `name` with `args`.
    ///
    /// Arguments must match the kernel's signature exactly. Array arguments
    /// are shared with the caller, so stores made by the kernel are visible
    /// through the caller's handles.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let kernels = self.kernels;
        let Some(kernel) = kernels.get(name) else {
            return Err(EvalError::UnknownFunction(name.to_string()));
        };
        let sig = kernel.signature();
        if args.len() != sig.arity() {
            return Err(EvalError::Arity {
                function: name.to_string(),
                expected: sig.arity(),
                found: args.len(),
            });
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepthExceeded(MAX_CALL_DEPTH));
        }

        let mut locals = Locals::new();
        for ((param, ty), arg) in kernel.decl().params.iter().zip(sig.params()).zip(args) {
            let found = arg.semantic_type();
            if found != *ty {
                return Err(EvalError::TypeMismatch(format!(
                    "argument `{}` of `{name}` must be {ty}, got {found}",
                    param.name
                )));
            }
            locals.define(&param.name, arg);
        }

        trace!(function = name, depth = self.depth, "call");
        self.depth += 1;
        let flow = self.exec_block(&mut locals, &kernel.decl().body);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal if sig.ret() == SemanticType::Void => Ok(Value::Void),
            Flow::Normal => Err(EvalError::MissingReturn(name.to_string())),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    fn exec_block(&mut self, locals: &mut Locals, stmts: &[Stmt]) -> EvalResult<Flow> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec_stmt(locals, stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_scoped(&mut self, locals: &mut Locals, stmts: &[Stmt]) -> EvalResult<Flow> {
        locals.push_scope();
        let flow = self.exec_block(locals, stmts);
        locals.pop_scope();
        flow
    }

    fn exec_stmt(&mut self, locals: &mut Locals, stmt: &Stmt) -> EvalResult<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Let { name, value } => {
                let value = self.eval_expr(locals, value)?;
                if !locals.define(name, value) {
                    return Err(EvalError::TypeMismatch(format!(
                        "`{name}` is already declared in this scope"
                    )));
                }
            }

            Stmt::Assign { name, value } => {
                let value = self.eval_expr(locals, value)?;
                if !locals.assign(name, value) {
                    return Err(EvalError::UndefinedVariable(name.clone()));
                }
            }

            Stmt::Store {
                array,
                indices,
                value,
            } => {
                let target = self.eval_array(locals, array)?;
                let index = self.eval_indices(locals, indices)?;
                let value = self.eval_scalar(locals, value)?;
                target.borrow_mut().set(&index, value)?;
            }

            Stmt::InPlace { array, op, value } => {
                let target = self.eval_array(locals, array)?;
                let operand = self.eval_scalar(locals, value)?;
                target
                    .borrow_mut()
                    .update(|element| arithmetic(*op, element, operand))?;
            }

            Stmt::For {
                var,
                start,
                end,
                body,
            } => return self.exec_for(locals, var, start, end, body),

            Stmt::While { cond, body } => loop {
                self.tick()?;
                if !self.eval_bool(locals, cond)? {
                    break;
                }
                if let Flow::Return(value) = self.exec_scoped(locals, body)? {
                    return Ok(Flow::Return(value));
                }
            },

            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let branch = if self.eval_bool(locals, cond)? {
                    then_body
                } else {
                    else_body
                };
                return self.exec_scoped(locals, branch);
            }

            Stmt::Return { value } => {
                let value = match value {
                    Some(expr) => self.eval_expr(locals, expr)?,
                    None => Value::Void,
                };
                return Ok(Flow::Return(value));
            }

            Stmt::Expr { expr } => {
                self.eval_expr(locals, expr)?;
            }

            Stmt::GlobalSet { name, ty, value } => {
                let value = self.eval_scalar(locals, value)?;
                if value.ty() != *ty {
                    return Err(EvalError::TypeMismatch(format!(
                        "value stored to global `{name}` must be {ty}, got {}",
                        value.ty()
                    )));
                }
                self.globals.store(name, value)?;
            }

            Stmt::Pass => {}
        }
        Ok(Flow::Normal)
    }

    /// `for var in start..end`. The counter lives in its own scope around
    /// the body, so the body may reassign it.
    fn exec_for(
        &mut self,
        locals: &mut Locals,
        var: &str,
        start: &Expr,
        end: &Expr,
        body: &[Stmt],
    ) -> EvalResult<Flow> {
        let start = self.eval_scalar(locals, start)?;
        let end = self.eval_scalar(locals, end)?;
        let ty = start.ty();
        if !ty.is_integer() || end.ty() != ty {
            return Err(EvalError::TypeMismatch(format!(
                "range bounds must be integers of one type, got {ty} and {}",
                end.ty()
            )));
        }
        let one = ScalarValue::from_bits(ty, 1);

        locals.push_scope();
        locals.define(var, start.into());
        let flow = self.run_range(locals, var, end, one, body);
        locals.pop_scope();
        flow
    }

    fn run_range(
        &mut self,
        locals: &mut Locals,
        var: &str,
        end: ScalarValue,
        one: ScalarValue,
        body: &[Stmt],
    ) -> EvalResult<Flow> {
        loop {
            self.tick()?;
            let counter = self.scalar_var(locals, var)?;
            if !compare(BinOp::Lt, counter, end) {
                return Ok(Flow::Normal);
            }
            if let Flow::Return(value) = self.exec_scoped(locals, body)? {
                return Ok(Flow::Return(value));
            }
            let counter = self.scalar_var(locals, var)?;
            locals.assign(var, arithmetic(BinOp::Add, counter, one)?.into());
        }
    }

    fn scalar_var(&self, locals: &Locals, name: &str) -> EvalResult<ScalarValue> {
        match locals.lookup(name) {
            Some(Value::Scalar(v)) => Ok(*v),
            Some(other) => Err(EvalError::TypeMismatch(format!(
                "`{name}` holds {}, not a scalar",
                other.semantic_type()
            ))),
            None => Err(EvalError::UndefinedVariable(name.to_string())),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    fn eval_expr(&mut self, locals: &Locals, expr: &Expr) -> EvalResult<Value> {
        self.tick()?;
        match expr {
            Expr::Var { name } => locals
                .lookup(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),

            Expr::Lit { value } => Ok((*value).into()),

            Expr::Binary { op, lhs, rhs } => self.eval_binary(locals, *op, lhs, rhs).map(Value::from),

            Expr::Unary { op, operand } => {
                let value = self.eval_scalar(locals, operand)?;
                unary(*op, value).map(Value::from)
            }

            Expr::Cast { to, expr } => Ok(self.eval_scalar(locals, expr)?.cast(*to).into()),

            Expr::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(locals, arg)?);
                }
                self.call(callee, values)
            }

            Expr::Zeros { element, shape } => {
                let mut dims = Vec::with_capacity(shape.len());
                for dim in shape {
                    let n = self.eval_scalar(locals, dim)?.as_i64();
                    if n < 0 {
                        return Err(EvalError::IndexOutOfBounds(format!(
                            "negative array dimension {n}"
                        )));
                    }
                    dims.push(n as usize);
                }
                Ok(Value::array(HostArray::zeros(*element, dims)))
            }

            Expr::Index { array, indices } => {
                let array = self.eval_array(locals, array)?;
                let index = self.eval_indices(locals, indices)?;
                let value = array.borrow().get(&index)?;
                Ok(value.into())
            }

            Expr::Shape { array, dim } => {
                let array = self.eval_array(locals, array)?;
                let array = array.borrow();
                let Some(&n) = array.shape().get(*dim as usize) else {
                    return Err(EvalError::IndexOutOfBounds(format!(
                        "dimension {dim} of rank-{} array",
                        array.rank()
                    )));
                };
                Ok(ScalarValue::from_bits(INDEX_TYPE, n as u64).into())
            }

            Expr::Size { array } => {
                let n = self.eval_array(locals, array)?.borrow().size();
                Ok(ScalarValue::from_bits(INDEX_TYPE, n as u64).into())
            }

            Expr::GlobalGet { name, ty } => Ok(self.globals.load(name, *ty)?.into()),
        }
    }

    fn eval_binary(
        &mut self,
        locals: &Locals,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> EvalResult<ScalarValue> {
        match op {
            BinOp::And => {
                let value = self.eval_bool(locals, lhs)? && self.eval_bool(locals, rhs)?;
                return Ok(ScalarValue::Bool(value));
            }
            BinOp::Or => {
                let value = self.eval_bool(locals, lhs)? || self.eval_bool(locals, rhs)?;
                return Ok(ScalarValue::Bool(value));
            }
            _ => {}
        }

        let l = self.eval_scalar(locals, lhs)?;
        let r = self.eval_scalar(locals, rhs)?;
        if l.ty() != r.ty() {
            return Err(EvalError::TypeMismatch(format!(
                "operands of `{op}` have different types: {} and {}",
                l.ty(),
                r.ty()
            )));
        }
        if op.is_comparison() {
            Ok(ScalarValue::Bool(compare(op, l, r)))
        } else {
            arithmetic(op, l, r)
        }
    }

    // ── Operand helpers ───────────────────────────────────────────────────

    fn eval_scalar(&mut self, locals: &Locals, expr: &Expr) -> EvalResult<ScalarValue> {
        match self.eval_expr(locals, expr)? {
            Value::Scalar(v) => Ok(v),
            other => Err(EvalError::TypeMismatch(format!(
                "expected a scalar, got {}",
                other.semantic_type()
            ))),
        }
    }

    fn eval_bool(&mut self, locals: &Locals, expr: &Expr) -> EvalResult<bool> {
        match self.eval_scalar(locals, expr)? {
            ScalarValue::Bool(b) => Ok(b),
            other => Err(EvalError::TypeMismatch(format!(
                "expected a bool, got {}",
                other.ty()
            ))),
        }
    }

    fn eval_array(&mut self, locals: &Locals, expr: &Expr) -> EvalResult<ArrayRef> {
        match self.eval_expr(locals, expr)? {
            Value::Array(a) => Ok(a),
            other => Err(EvalError::TypeMismatch(format!(
                "expected an array, got {}",
                other.semantic_type()
            ))),
        }
    }

    fn eval_indices(&mut self, locals: &Locals, indices: &[Expr]) -> EvalResult<Vec<i64>> {
        let mut out = Vec::with_capacity(indices.len());
        for index in indices {
            let value = self.eval_scalar(locals, index)?;
            if !value.ty().is_integer() {
                return Err(EvalError::TypeMismatch(format!(
                    "index must be an integer, got {}",
                    value.ty()
                )));
            }
            out.push(value.as_i64());
        }
        Ok(out)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Scalar operations
// ══════════════════════════════════════════════════════════════════════════════

/// `l <op> r` for two values of one type.
///
/// Integers wrap at their declared width. Division truncates toward zero;
/// dividing by zero, or `MIN / -1` at 32 or 64 bits, traps.
fn arithmetic(op: BinOp, l: ScalarValue, r: ScalarValue) -> EvalResult<ScalarValue> {
    let ty = l.ty();
    let not_arithmetic = || EvalError::TypeMismatch(format!("no arithmetic `{op}` on {ty}"));

    match (l, r) {
        (ScalarValue::F32(a), ScalarValue::F32(b)) => {
            return float_op(op, a, b).map(ScalarValue::F32).ok_or_else(not_arithmetic)
        }
        (ScalarValue::F64(a), ScalarValue::F64(b)) => {
            return float_op(op, a, b).map(ScalarValue::F64).ok_or_else(not_arithmetic)
        }
        _ => {}
    }
    if !ty.is_integer() || r.ty() != ty {
        return Err(not_arithmetic());
    }

    if matches!(op, BinOp::Div | BinOp::Rem) && r.to_bits() == 0 {
        return Err(EvalError::ArithmeticTrap(format!(
            "integer {} by zero",
            if op == BinOp::Div { "division" } else { "remainder" }
        )));
    }

    let bits = if ty.is_signed() {
        let (a, b) = (l.as_i64(), r.as_i64());
        let v = match op {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div => {
                if ty.width >= 32 && b == -1 && a == i64::MIN >> (64 - ty.width) {
                    return Err(EvalError::ArithmeticTrap("integer overflow".into()));
                }
                a.wrapping_div(b)
            }
            BinOp::Rem => a.wrapping_rem(b),
            _ => return Err(not_arithmetic()),
        };
        v as u64
    } else {
        let (a, b) = (l.to_bits(), r.to_bits());
        match op {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div => a / b,
            BinOp::Rem => a % b,
            _ => return Err(not_arithmetic()),
        }
    };
    Ok(ScalarValue::from_bits(ty, bits))
}

fn float_op<T>(op: BinOp, a: T, b: T) -> Option<T>
where
    T: Add<Output = T> + Sub<Output = T> + Mul<Output = T> + Div<Output = T>,
{
    match op {
        BinOp::Add => Some(a + b),
        BinOp::Sub => Some(a - b),
        BinOp::Mul => Some(a * b),
        BinOp::Div => Some(a / b),
        _ => None,
    }
}

/// Ordered comparisons involving NaN are false; `!=` is true.
fn compare(op: BinOp, l: ScalarValue, r: ScalarValue) -> bool {
    let ty = l.ty();
    let ord = if ty.is_float() {
        l.as_f64().partial_cmp(&r.as_f64())
    } else if ty.is_signed() {
        Some(l.as_i64().cmp(&r.as_i64()))
    } else {
        Some(l.to_bits().cmp(&r.to_bits()))
    };
    match op {
        BinOp::Lt => ord == Some(Ordering::Less),
        BinOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        BinOp::Gt => ord == Some(Ordering::Greater),
        BinOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        BinOp::Eq => ord == Some(Ordering::Equal),
        BinOp::Ne => ord != Some(Ordering::Equal),
        _ => false,
    }
}

fn unary(op: UnaryOp, value: ScalarValue) -> EvalResult<ScalarValue> {
    match (op, value) {
        (UnaryOp::Not, ScalarValue::Bool(b)) => Ok(ScalarValue::Bool(!b)),
        (UnaryOp::Neg, ScalarValue::F32(x)) => Ok(ScalarValue::F32(-x)),
        (UnaryOp::Neg, ScalarValue::F64(x)) => Ok(ScalarValue::F64(-x)),
        (UnaryOp::Neg, v) if v.ty().is_integer() => {
            Ok(ScalarValue::from_bits(v.ty(), v.to_bits().wrapping_neg()))
        }
        (op, v) => Err(EvalError::TypeMismatch(format!(
            "cannot apply {op:?} to {}",
            v.ty()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numwasm_types::ScalarType;

    #[test]
    fn integer_arithmetic_wraps_at_width() {
        let v = arithmetic(BinOp::Add, ScalarValue::U8(250), ScalarValue::U8(10)).unwrap();
        assert_eq!(v, ScalarValue::U8(4));
        let v = arithmetic(BinOp::Mul, ScalarValue::I32(i32::MAX), ScalarValue::I32(2)).unwrap();
        assert_eq!(v, ScalarValue::I32(-2));
    }

    #[test]
    fn signed_division_truncates() {
        let v = arithmetic(BinOp::Div, ScalarValue::I64(-7), ScalarValue::I64(2)).unwrap();
        assert_eq!(v, ScalarValue::I64(-3));
        let v = arithmetic(BinOp::Rem, ScalarValue::I64(-7), ScalarValue::I64(2)).unwrap();
        assert_eq!(v, ScalarValue::I64(-1));
    }

    #[test]
    fn division_traps() {
        assert!(matches!(
            arithmetic(BinOp::Div, ScalarValue::U32(1), ScalarValue::U32(0)),
            Err(EvalError::ArithmeticTrap(_))
        ));
        assert!(matches!(
            arithmetic(BinOp::Div, ScalarValue::I32(i32::MIN), ScalarValue::I32(-1)),
            Err(EvalError::ArithmeticTrap(_))
        ));
        // Narrow types compute at 32 bits and wrap instead.
        assert_eq!(
            arithmetic(BinOp::Div, ScalarValue::I8(i8::MIN), ScalarValue::I8(-1)).unwrap(),
            ScalarValue::I8(i8::MIN)
        );
    }

    #[test]
    fn float_division_by_zero_is_infinite() {
        let v = arithmetic(BinOp::Div, ScalarValue::F64(1.0), ScalarValue::F64(0.0)).unwrap();
        assert_eq!(v, ScalarValue::F64(f64::INFINITY));
        assert!(arithmetic(BinOp::Rem, ScalarValue::F64(1.0), ScalarValue::F64(1.0)).is_err());
    }

    #[test]
    fn comparisons_respect_signedness_and_nan() {
        assert!(compare(BinOp::Lt, ScalarValue::I32(-1), ScalarValue::I32(0)));
        assert!(!compare(BinOp::Lt, ScalarValue::U32(u32::MAX), ScalarValue::U32(0)));
        let nan = ScalarValue::F64(f64::NAN);
        assert!(!compare(BinOp::Eq, nan, nan));
        assert!(compare(BinOp::Ne, nan, nan));
    }

    #[test]
    fn negation() {
        assert_eq!(unary(UnaryOp::Neg, ScalarValue::I16(5)).unwrap(), ScalarValue::I16(-5));
        assert_eq!(
            unary(UnaryOp::Neg, ScalarValue::U32(1)).unwrap(),
            ScalarValue::U32(u32::MAX)
        );
        assert!(unary(UnaryOp::Neg, ScalarValue::Bool(true)).is_err());
        assert_eq!(
            ScalarValue::zero(ScalarType::BOOL),
            ScalarValue::Bool(false)
        );
    }
}
