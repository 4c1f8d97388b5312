//! Module-level global slots for native execution.

use indexmap::IndexMap;
use numwasm_types::{GlobalBinding, ScalarType, ScalarValue};

use crate::error::{EvalError, EvalResult};

/// Bound globals and the slots created for them so far.
///
/// A slot does not exist until a kernel first reads or writes it; it is then
/// created holding the binding's initial value. Every kernel evaluated
/// against the same `GlobalSlots` shares one slot per name.
#[derive(Debug, Clone, Default)]
pub struct GlobalSlots {
    bindings: IndexMap<String, GlobalBinding>,
    slots: IndexMap<String, ScalarValue>,
}

impl GlobalSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `binding`. A rebinding replaces the initial value of a slot
    /// that has not been created yet; an existing slot keeps its value.
    pub fn bind(&mut self, binding: GlobalBinding) {
        self.bindings.insert(binding.name.clone(), binding);
    }

    pub fn binding(&self, name: &str) -> Option<&GlobalBinding> {
        self.bindings.get(name)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &GlobalBinding> {
        self.bindings.values()
    }

    /// Current value of a created slot.
    pub fn peek(&self, name: &str) -> Option<ScalarValue> {
        self.slots.get(name).copied()
    }

    /// Read slot `name` as `ty`, creating it on first reference.
    pub fn load(&mut self, name: &str, ty: ScalarType) -> EvalResult<ScalarValue> {
        self.slot(name, ty).map(|slot| *slot)
    }

    /// Write `value` to slot `name`, creating it on first reference.
    pub fn store(&mut self, name: &str, value: ScalarValue) -> EvalResult<()> {
        *self.slot(name, value.ty())? = value;
        Ok(())
    }

    fn slot(&mut self, name: &str, ty: ScalarType) -> EvalResult<&mut ScalarValue> {
        let Some(binding) = self.bindings.get(name) else {
            return Err(EvalError::UnboundGlobal(name.to_string()));
        };
        if binding.ty != ty {
            return Err(EvalError::TypeMismatch(format!(
                "global `{name}` is {}, accessed as {ty}",
                binding.ty
            )));
        }
        let initial = binding.initial;
        Ok(self.slots.entry(name.to_string()).or_insert(initial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_starts_at_initial_value() {
        let mut g = GlobalSlots::new();
        g.bind(GlobalBinding::new("n", ScalarValue::I64(41), ScalarType::I64));
        assert_eq!(g.peek("n"), None);
        assert_eq!(g.load("n", ScalarType::I64).unwrap(), ScalarValue::I64(41));
        g.store("n", ScalarValue::I64(42)).unwrap();
        assert_eq!(g.peek("n"), Some(ScalarValue::I64(42)));
    }

    #[test]
    fn unbound_and_mistyped_access_fail() {
        let mut g = GlobalSlots::new();
        assert_eq!(
            g.load("missing", ScalarType::I32),
            Err(EvalError::UnboundGlobal("missing".into()))
        );
        g.bind(GlobalBinding::new("n", ScalarValue::I64(0), ScalarType::I64));
        assert!(matches!(
            g.store("n", ScalarValue::F64(1.0)),
            Err(EvalError::TypeMismatch(_))
        ));
    }
}
