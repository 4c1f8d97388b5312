//! Declared module-level globals.

use numwasm_compiler::globals::{getter, setter};
use numwasm_types::kernel::{Expr, Stmt};
use numwasm_types::{GlobalBinding, ScalarType, ScalarValue};

/// Accessors for one declared global slot, used inside kernel bodies.
///
/// In bridge-call mode the slot lives only inside the built artifact, so
/// the accessors do nothing: [`get`](Self::get) is the constant zero of the
/// slot's type and [`set`](Self::set) is an empty statement.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalState {
    binding: GlobalBinding,
    observable: bool,
}

impl GlobalState {
    pub(crate) fn new(binding: GlobalBinding, observable: bool) -> Self {
        Self {
            binding,
            observable,
        }
    }

    /// Expression reading the slot.
    pub fn get(&self) -> Expr {
        if self.observable {
            getter(&self.binding.name, self.binding.ty)
        } else {
            Expr::lit(ScalarValue::zero(self.binding.ty))
        }
    }

    /// Statement writing `value` to the slot.
    pub fn set(&self, value: Expr) -> Stmt {
        if self.observable {
            setter(&self.binding.name, self.binding.ty, value)
        } else {
            Stmt::Pass
        }
    }

    /// Whether reads and writes reach a real slot.
    pub fn is_observable(&self) -> bool {
        self.observable
    }

    pub fn name(&self) -> &str {
        &self.binding.name
    }

    pub fn ty(&self) -> ScalarType {
        self.binding.ty
    }

    pub fn binding(&self) -> &GlobalBinding {
        &self.binding
    }
}
