//! Kernel AST: the declared numeric functions.
//!
//! A [`KernelDecl`] is what declaring code registers: a module-qualified
//! name, annotated parameters, an optional return annotation and a body.
//! Bodies are small statement/expression trees over scalars and
//! C-contiguous arrays. Arrays have reference semantics: binding or passing
//! an array aliases its data.
//!
//! Builder helpers keep declarations readable:
//!
//! ```
//! use numwasm_types::kernel::{Expr, KernelDecl, Stmt};
//! use numwasm_types::Annotation;
//!
//! let square = KernelDecl::new("example_module", "square")
//!     .param("input_value", Annotation::f64())
//!     .returns(Annotation::f64())
//!     .body(vec![Stmt::ret(Expr::var("input_value").mul(Expr::var("input_value")))]);
//! assert_eq!(square.qualified_name(), "example_module.square");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::annotation::Annotation;
use crate::ty::ScalarType;
use crate::value::ScalarValue;

// ══════════════════════════════════════════════════════════════════════════════
// Declarations
// ══════════════════════════════════════════════════════════════════════════════

/// One annotated parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub annotation: Annotation,
}

/// A declared kernel function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelDecl {
    /// Name of the declaring module.
    pub module: String,
    /// Function name within the module.
    pub name: String,
    pub params: Vec<Param>,
    /// Return annotation; `None` means void.
    pub ret: Option<Annotation>,
    pub body: Vec<Stmt>,
    /// Explicit export symbol. When set, it is the only externally visible
    /// name of the function after assembly.
    pub symbol: Option<String>,
}

impl KernelDecl {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            params: Vec::new(),
            ret: None,
            body: Vec::new(),
            symbol: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, annotation: Annotation) -> Self {
        self.params.push(Param {
            name: name.into(),
            annotation,
        });
        self
    }

    pub fn returns(mut self, annotation: Annotation) -> Self {
        self.ret = Some(annotation);
        self
    }

    pub fn body(mut self, body: Vec<Stmt>) -> Self {
        self.body = body;
        self
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// `"<module>.<name>"`, also the default export symbol.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    /// The symbol the function is exported under: the override if one was
    /// declared, otherwise the qualified name.
    pub fn export_symbol(&self) -> String {
        self.symbol.clone().unwrap_or_else(|| self.qualified_name())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Eq | Self::Ne
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "and",
            Self::Or => "or",
        };
        f.write_str(s)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnaryOp {
    Neg,
    Not,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// A kernel expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Expr {
    /// Parameter or local variable.
    Var { name: String },
    /// Typed scalar literal.
    Lit { value: ScalarValue },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Numeric conversion to `to`.
    Cast { to: ScalarType, expr: Box<Expr> },
    /// Call of another declared kernel by qualified name.
    Call { callee: String, args: Vec<Expr> },
    /// A fresh zero-filled C-contiguous array.
    Zeros { element: ScalarType, shape: Vec<Expr> },
    /// `array[i, j, ...]`.
    Index { array: Box<Expr>, indices: Vec<Expr> },
    /// `array.shape[dim]`.
    Shape { array: Box<Expr>, dim: u32 },
    /// `array.size`: total element count.
    Size { array: Box<Expr> },
    /// Read of a module-level global slot.
    GlobalGet { name: String, ty: ScalarType },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var { name: name.into() }
    }

    pub fn lit(value: ScalarValue) -> Self {
        Self::Lit { value }
    }

    pub fn f64(v: f64) -> Self {
        Self::lit(ScalarValue::F64(v))
    }

    pub fn f32(v: f32) -> Self {
        Self::lit(ScalarValue::F32(v))
    }

    pub fn i32(v: i32) -> Self {
        Self::lit(ScalarValue::I32(v))
    }

    pub fn i64(v: i64) -> Self {
        Self::lit(ScalarValue::I64(v))
    }

    pub fn u32(v: u32) -> Self {
        Self::lit(ScalarValue::U32(v))
    }

    pub fn bool(v: bool) -> Self {
        Self::lit(ScalarValue::Bool(v))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Add, self, rhs)
    }

    pub fn sub(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Sub, self, rhs)
    }

    pub fn mul(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Mul, self, rhs)
    }

    pub fn div(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Div, self, rhs)
    }

    pub fn rem(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Rem, self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Lt, self, rhs)
    }

    pub fn equals(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Eq, self, rhs)
    }

    pub fn neg(self) -> Self {
        Self::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(self),
        }
    }

    pub fn not(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    pub fn cast(self, to: ScalarType) -> Self {
        Self::Cast {
            to,
            expr: Box::new(self),
        }
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            callee: callee.into(),
            args,
        }
    }

    pub fn zeros(element: ScalarType, shape: Vec<Expr>) -> Self {
        Self::Zeros { element, shape }
    }

    pub fn index(self, indices: Vec<Expr>) -> Self {
        Self::Index {
            array: Box::new(self),
            indices,
        }
    }

    pub fn shape(self, dim: u32) -> Self {
        Self::Shape {
            array: Box::new(self),
            dim,
        }
    }

    pub fn size(self) -> Self {
        Self::Size {
            array: Box::new(self),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

/// A kernel statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum Stmt {
    /// Introduce a new local.
    Let { name: String, value: Expr },
    /// Rebind an existing local. The value must have the local's type.
    Assign { name: String, value: Expr },
    /// `array[i, j, ...] = value`.
    Store {
        array: Expr,
        indices: Vec<Expr>,
        value: Expr,
    },
    /// Elementwise `array <op>= value` over every element.
    InPlace { array: Expr, op: BinOp, value: Expr },
    /// `for var in start..end` over integers.
    For {
        var: String,
        start: Expr,
        end: Expr,
        body: Vec<Stmt>,
    },
    While { cond: Expr, body: Vec<Stmt> },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    Return { value: Option<Expr> },
    /// Evaluate and discard.
    Expr { expr: Expr },
    /// Write a module-level global slot.
    GlobalSet {
        name: String,
        ty: ScalarType,
        value: Expr,
    },
    /// Does nothing.
    Pass,
}

impl Stmt {
    pub fn let_(name: impl Into<String>, value: Expr) -> Self {
        Self::Let {
            name: name.into(),
            value,
        }
    }

    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Self::Assign {
            name: name.into(),
            value,
        }
    }

    pub fn store(array: Expr, indices: Vec<Expr>, value: Expr) -> Self {
        Self::Store {
            array,
            indices,
            value,
        }
    }

    pub fn in_place(array: Expr, op: BinOp, value: Expr) -> Self {
        Self::InPlace { array, op, value }
    }

    pub fn for_range(var: impl Into<String>, start: Expr, end: Expr, body: Vec<Stmt>) -> Self {
        Self::For {
            var: var.into(),
            start,
            end,
            body,
        }
    }

    pub fn while_(cond: Expr, body: Vec<Stmt>) -> Self {
        Self::While { cond, body }
    }

    pub fn if_(cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>) -> Self {
        Self::If {
            cond,
            then_body,
            else_body,
        }
    }

    pub fn ret(value: Expr) -> Self {
        Self::Return { value: Some(value) }
    }

    pub fn ret_void() -> Self {
        Self::Return { value: None }
    }

    pub fn expr(expr: Expr) -> Self {
        Self::Expr { expr }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_survive_json() {
        let decl = KernelDecl::new("example_module", "scaled")
            .param("values", Annotation::ndarray(1, Annotation::name("uint32")))
            .param("factor", Annotation::f64())
            .returns(Annotation::i64())
            .symbol("scaled_export")
            .body(vec![
                Stmt::let_("n", Expr::var("values").size()),
                Stmt::let_("f", Expr::var("factor").cast(ScalarType::I64)),
                Stmt::expr(Expr::call("example_module.helper", vec![Expr::u32(3)])),
                Stmt::if_(
                    Expr::var("n").lt(Expr::i64(1)),
                    vec![Stmt::ret(Expr::i64(0).neg())],
                    vec![],
                ),
                Stmt::ret(Expr::var("n").mul(Expr::var("f"))),
            ]);
        let json = serde_json::to_string(&decl).unwrap();
        assert!(json.contains(r#""node":"cast""#));
        let back: KernelDecl = serde_json::from_str(&json).unwrap();
        assert_eq!(back, decl);
    }
}
