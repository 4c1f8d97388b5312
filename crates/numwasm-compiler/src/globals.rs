//! Global state injection.
//!
//! A global is one module-level storage slot, `__nw_global.<name>`, shared
//! by every compiled unit that touches it. Kernels reach it through the
//! accessors built here: the getter is an expression, the setter a
//! statement. When either is lowered, the slot is declared in the unit's
//! module if absent (a placeholder the assembler later materializes once
//! from the binding table) and then loaded or stored.

use numwasm_ir::{Inst, IrModule};
use numwasm_types::global::slot_symbol;
use numwasm_types::kernel::{Expr, Stmt};
use numwasm_types::ScalarType;

use crate::lower::scalar_ir;

/// Getter expression for global `name` of type `ty`.
pub fn getter(name: &str, ty: ScalarType) -> Expr {
    Expr::GlobalGet {
        name: name.to_string(),
        ty,
    }
}

/// Setter statement storing `value` into global `name`.
pub fn setter(name: &str, ty: ScalarType, value: Expr) -> Stmt {
    Stmt::GlobalSet {
        name: name.to_string(),
        ty,
        value,
    }
}

/// Declare the slot for `name` in `module` unless present; returns its symbol.
pub fn declare_slot(module: &mut IrModule, name: &str, ty: ScalarType) -> String {
    let symbol = slot_symbol(name);
    module.declare_global(&symbol, scalar_ir(ty));
    symbol
}

/// Declare-if-absent, then load.
pub fn emit_get(module: &mut IrModule, name: &str, ty: ScalarType) -> Inst {
    Inst::GlobalGet(declare_slot(module, name, ty))
}

/// Declare-if-absent, then store the value on top of the stack.
pub fn emit_set(module: &mut IrModule, name: &str, ty: ScalarType) -> Inst {
    Inst::GlobalSet(declare_slot(module, name, ty))
}
