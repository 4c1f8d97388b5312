//! Module-level global bindings.

use serde::{Deserialize, Serialize};

use crate::ty::ScalarType;
use crate::value::ScalarValue;

/// Prefix of every global-slot symbol in compiled modules.
pub const GLOBAL_SLOT_PREFIX: &str = "__nw_global.";

/// A named module-level storage slot shared by every compiled unit that
/// references it.
///
/// `initial` is materialized into the slot before the first read, by the
/// assembler for target builds and by the evaluator for native calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalBinding {
    pub name: String,
    pub ty: ScalarType,
    pub initial: ScalarValue,
}

impl GlobalBinding {
    /// Create a binding; the initial value is converted to `ty`.
    pub fn new(name: impl Into<String>, initial: ScalarValue, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty,
            initial: initial.cast(ty),
        }
    }

    /// The IR symbol of the storage slot.
    pub fn slot_symbol(&self) -> String {
        slot_symbol(&self.name)
    }
}

/// The IR symbol for the slot of global `name`.
pub fn slot_symbol(name: &str) -> String {
    format!("{GLOBAL_SLOT_PREFIX}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_value_takes_declared_type() {
        let g = GlobalBinding::new("counter", ScalarValue::I32(0), ScalarType::I64);
        assert_eq!(g.initial, ScalarValue::I64(0));
        assert_eq!(g.slot_symbol(), "__nw_global.counter");
    }
}
