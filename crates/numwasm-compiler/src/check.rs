//! Kernel type checker.
//!
//! Entry point: [`check_kernel`]. Every expression is typed exactly; there
//! are no implicit conversions, so mixing `u32` and `i32` operands needs an
//! explicit cast. The first error aborts checking.

use indexmap::IndexMap;
use numwasm_types::kernel::{BinOp, Expr, KernelDecl, Stmt, UnaryOp};
use numwasm_types::{FunctionSignature, ScalarType, SemanticType};

use crate::env::{NameTypes, TypeEnv};
use crate::error::{CompileError, CompileResult};

/// Signatures of every declared kernel, by qualified name.
pub type SignatureTable = IndexMap<String, FunctionSignature>;

/// Type of `array.shape[d]` and `array.size`.
pub const INDEX_TYPE: ScalarType = ScalarType::I64;

/// Check the body of `decl` against its resolved signature.
pub fn check_kernel(
    decl: &KernelDecl,
    sig: &FunctionSignature,
    table: &SignatureTable,
) -> CompileResult<()> {
    let mut checker = KernelChecker::new(decl, sig, table)?;
    checker.check_block(&decl.body)
}

/// Type an expression against a set of bindings.
pub fn infer_expr(
    function: &str,
    expr: &Expr,
    names: &impl NameTypes,
    table: &SignatureTable,
) -> CompileResult<SemanticType> {
    ExprTyper {
        function,
        names,
        table,
    }
    .infer(expr)
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

struct KernelChecker<'a> {
    function: String,
    ret: SemanticType,
    table: &'a SignatureTable,
    env: TypeEnv,
}

impl<'a> KernelChecker<'a> {
    fn new(
        decl: &KernelDecl,
        sig: &FunctionSignature,
        table: &'a SignatureTable,
    ) -> CompileResult<Self> {
        let function = decl.qualified_name();
        let mut env = TypeEnv::new();
        for (param, ty) in decl.params.iter().zip(sig.params()) {
            if !env.define(&param.name, *ty) {
                return Err(CompileError::ty(
                    &function,
                    format!("parameter `{}` is declared twice", param.name),
                ));
            }
        }
        Ok(Self {
            function,
            ret: sig.ret(),
            table,
            env,
        })
    }

    fn err(&self, message: impl Into<String>) -> CompileError {
        CompileError::ty(&self.function, message)
    }

    fn infer(&self, expr: &Expr) -> CompileResult<SemanticType> {
        infer_expr(&self.function, expr, &self.env, self.table)
    }

    /// Type `expr` and require a scalar of exactly `expected`.
    fn expect(&self, expr: &Expr, expected: SemanticType, what: &str) -> CompileResult<()> {
        let ty = self.infer(expr)?;
        if ty != expected {
            return Err(self.err(format!("{what} must be {expected}, got {ty}")));
        }
        Ok(())
    }

    fn expect_integer(&self, expr: &Expr, what: &str) -> CompileResult<ScalarType> {
        match self.infer(expr)? {
            SemanticType::Scalar(s) if s.is_integer() => Ok(s),
            other => Err(self.err(format!("{what} must be an integer, got {other}"))),
        }
    }

    fn check_block(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
        for stmt in stmts {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn check_scoped(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
        self.env.push_scope();
        let result = self.check_block(stmts);
        self.env.pop_scope();
        result
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Let { name, value } => {
                let ty = self.infer(value)?;
                if ty.is_void() {
                    return Err(self.err(format!("`{name}` cannot be bound to a void value")));
                }
                if !self.env.define(name, ty) {
                    return Err(self.err(format!("`{name}` is already declared in this scope")));
                }
                Ok(())
            }

            Stmt::Assign { name, value } => {
                let Some(target) = self.env.type_of(name) else {
                    return Err(self.err(format!("assignment to undeclared `{name}`")));
                };
                self.expect(value, target, &format!("value assigned to `{name}`"))
            }

            Stmt::Store {
                array,
                indices,
                value,
            } => {
                let element = self.check_subscript(array, indices)?;
                self.expect(value, element.into(), "stored value")
            }

            Stmt::InPlace { array, op, value } => {
                let Some((element, _)) = self.infer(array)?.as_array() else {
                    return Err(self.err(format!("`{op}=` needs an array target")));
                };
                check_arithmetic(&self.function, *op, element)?;
                self.expect(value, element.into(), &format!("right side of `{op}=`"))
            }

            Stmt::For {
                var,
                start,
                end,
                body,
            } => {
                let ty = self.expect_integer(start, "range start")?;
                self.expect(end, ty.into(), "range end")?;
                self.env.push_scope();
                self.env.define(var, ty.into());
                let result = self.check_scoped(body);
                self.env.pop_scope();
                result
            }

            Stmt::While { cond, body } => {
                self.expect(cond, ScalarType::BOOL.into(), "loop condition")?;
                self.check_scoped(body)
            }

            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expect(cond, ScalarType::BOOL.into(), "condition")?;
                self.check_scoped(then_body)?;
                self.check_scoped(else_body)
            }

            Stmt::Return { value } => match (value, self.ret) {
                (None, SemanticType::Void) => Ok(()),
                (None, ret) => Err(self.err(format!("missing return value of type {ret}"))),
                (Some(_), SemanticType::Void) => {
                    Err(self.err("returning a value from a void function"))
                }
                (Some(value), ret) => self.expect(value, ret, "return value"),
            },

            Stmt::Expr { expr } => self.infer(expr).map(|_| ()),

            Stmt::GlobalSet { name, ty, value } => {
                if !ty.is_valid() {
                    return Err(self.err(format!("global `{name}` has invalid type {ty}")));
                }
                self.expect(value, (*ty).into(), &format!("value stored to global `{name}`"))
            }

            Stmt::Pass => Ok(()),
        }
    }

    /// Check `array[indices]` and return the element type.
    fn check_subscript(&self, array: &Expr, indices: &[Expr]) -> CompileResult<ScalarType> {
        ExprTyper {
            function: &self.function,
            names: &self.env,
            table: self.table,
        }
        .subscript(array, indices)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

struct ExprTyper<'a, N> {
    function: &'a str,
    names: &'a N,
    table: &'a SignatureTable,
}

impl<N: NameTypes> ExprTyper<'_, N> {
    fn err(&self, message: impl Into<String>) -> CompileError {
        CompileError::ty(self.function, message)
    }

    fn scalar(&self, expr: &Expr, what: &str) -> CompileResult<ScalarType> {
        match self.infer(expr)? {
            SemanticType::Scalar(s) => Ok(s),
            other => Err(self.err(format!("{what} must be a scalar, got {other}"))),
        }
    }

    fn infer(&self, expr: &Expr) -> CompileResult<SemanticType> {
        match expr {
            Expr::Var { name } => self
                .names
                .type_of(name)
                .ok_or_else(|| self.err(format!("unknown name `{name}`"))),

            Expr::Lit { value } => Ok(value.ty().into()),

            Expr::Binary { op, lhs, rhs } => {
                let l = self.scalar(lhs, &format!("left operand of `{op}`"))?;
                let r = self.scalar(rhs, &format!("right operand of `{op}`"))?;
                if l != r {
                    return Err(self.err(format!(
                        "operands of `{op}` have different types: {l} and {r}"
                    )));
                }
                if op.is_logical() {
                    if !l.is_bool() {
                        return Err(self.err(format!("operands of `{op}` must be bool, got {l}")));
                    }
                    return Ok(ScalarType::BOOL.into());
                }
                if op.is_comparison() {
                    if l.is_bool() && !matches!(op, BinOp::Eq | BinOp::Ne) {
                        return Err(self.err(format!("bools cannot be ordered with `{op}`")));
                    }
                    return Ok(ScalarType::BOOL.into());
                }
                check_arithmetic(self.function, *op, l)?;
                Ok(l.into())
            }

            Expr::Unary { op, operand } => {
                let ty = self.scalar(operand, "operand")?;
                match op {
                    UnaryOp::Neg if !ty.is_bool() => Ok(ty.into()),
                    UnaryOp::Not if ty.is_bool() => Ok(ty.into()),
                    UnaryOp::Neg => Err(self.err("cannot negate a bool")),
                    UnaryOp::Not => Err(self.err(format!("`not` needs a bool, got {ty}"))),
                }
            }

            Expr::Cast { to, expr } => {
                self.scalar(expr, "cast operand")?;
                if !to.is_valid() {
                    return Err(self.err(format!("invalid cast target {to}")));
                }
                Ok((*to).into())
            }

            Expr::Call { callee, args } => {
                let Some(sig) = self.table.get(callee) else {
                    return Err(CompileError::UnknownFunction {
                        function: self.function.to_string(),
                        callee: callee.clone(),
                    });
                };
                if args.len() != sig.arity() {
                    return Err(self.err(format!(
                        "`{callee}` takes {} argument(s), {} given",
                        sig.arity(),
                        args.len()
                    )));
                }
                for (i, (arg, expected)) in args.iter().zip(sig.params()).enumerate() {
                    let ty = self.infer(arg)?;
                    if ty != *expected {
                        return Err(self.err(format!(
                            "argument {} of `{callee}` must be {expected}, got {ty}",
                            i + 1
                        )));
                    }
                }
                Ok(sig.ret())
            }

            Expr::Zeros { element, shape } => {
                if !element.is_valid() {
                    return Err(self.err(format!("invalid element type {element}")));
                }
                for dim in shape {
                    let ty = self.scalar(dim, "array dimension")?;
                    if !ty.is_integer() {
                        return Err(self.err(format!("array dimension must be an integer, got {ty}")));
                    }
                }
                Ok(SemanticType::array(*element, shape.len() as u32))
            }

            Expr::Index { array, indices } => Ok(self.subscript(array, indices)?.into()),

            Expr::Shape { array, dim } => {
                let Some((_, rank)) = self.infer(array)?.as_array() else {
                    return Err(self.err("`.shape` of a non-array"));
                };
                if *dim >= rank {
                    return Err(self.err(format!("dimension {dim} out of range for rank {rank}")));
                }
                Ok(INDEX_TYPE.into())
            }

            Expr::Size { array } => match self.infer(array)? {
                SemanticType::Array { .. } => Ok(INDEX_TYPE.into()),
                other => Err(self.err(format!("`.size` of non-array {other}"))),
            },

            Expr::GlobalGet { ty, name } => {
                if !ty.is_valid() {
                    return Err(self.err(format!("global `{name}` has invalid type {ty}")));
                }
                Ok((*ty).into())
            }
        }
    }

    fn subscript(&self, array: &Expr, indices: &[Expr]) -> CompileResult<ScalarType> {
        let ty = self.infer(array)?;
        let Some((element, rank)) = ty.as_array() else {
            return Err(self.err(format!("cannot index {ty}")));
        };
        if indices.len() != rank as usize {
            return Err(self.err(format!(
                "{} index(es) given for rank-{rank} array",
                indices.len()
            )));
        }
        for index in indices {
            let ty = self.scalar(index, "index")?;
            if !ty.is_integer() {
                return Err(self.err(format!("index must be an integer, got {ty}")));
            }
        }
        Ok(element)
    }
}

fn check_arithmetic(function: &str, op: BinOp, ty: ScalarType) -> CompileResult<()> {
    if !op.is_arithmetic() {
        return Err(CompileError::ty(function, format!("`{op}` is not arithmetic")));
    }
    if ty.is_bool() {
        return Err(CompileError::ty(function, format!("no arithmetic `{op}` on bools")));
    }
    if op == BinOp::Rem && ty.is_float() {
        return Err(CompileError::ty(function, format!("`%` needs integers, got {ty}")));
    }
    Ok(())
}
