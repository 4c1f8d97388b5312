//! Lexically scoped name bindings.
//!
//! [`ScopedEnv`] is a stack of scopes. The checker binds names to their
//! [`SemanticType`]; lowering binds names to the IR locals that hold them;
//! the evaluator binds names to runtime values.

use std::collections::HashMap;

use numwasm_types::SemanticType;

/// Anything that can answer "what is the type of this name?".
pub trait NameTypes {
    fn type_of(&self, name: &str) -> Option<SemanticType>;
}

/// A single scope level.
#[derive(Debug, Clone)]
struct Scope<V> {
    bindings: HashMap<String, V>,
}

impl<V> Default for Scope<V> {
    fn default() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }
}

/// A stack of scopes for name resolution.
#[derive(Debug, Clone)]
pub struct ScopedEnv<V> {
    scopes: Vec<Scope<V>>,
}

impl<V> ScopedEnv<V> {
    /// Create an environment holding a single (function) scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost scope. The function scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind `name` in the innermost scope.
    /// Returns `false` if the name is already bound in that scope.
    pub fn define(&mut self, name: &str, value: V) -> bool {
        let Some(scope) = self.scopes.last_mut() else {
            return false;
        };
        if scope.bindings.contains_key(name) {
            return false;
        }
        scope.bindings.insert(name.to_string(), value);
        true
    }

    /// Look up a binding, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&V> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    /// Rebind `name` in the innermost scope that holds it.
    /// Returns `false` if the name is unbound.
    pub fn assign(&mut self, name: &str, value: V) -> bool {
        match self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.bindings.get_mut(name))
        {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn defined_in_current_scope(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|s| s.bindings.contains_key(name))
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

impl<V> Default for ScopedEnv<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Name → type environment used by the checker.
pub type TypeEnv = ScopedEnv<SemanticType>;

impl NameTypes for TypeEnv {
    fn type_of(&self, name: &str) -> Option<SemanticType> {
        self.lookup(name).copied()
    }
}
