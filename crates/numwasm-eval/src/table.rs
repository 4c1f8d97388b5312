//! The registry of declared kernels.

use indexmap::IndexMap;
use numwasm_compiler::{check_kernel, resolve_signature, CompileError, SignatureTable};
use numwasm_types::kernel::KernelDecl;
use numwasm_types::FunctionSignature;
use tracing::debug;

use crate::error::EvalResult;

/// A checked declaration and its resolved signature.
#[derive(Debug, Clone)]
pub struct Kernel {
    decl: KernelDecl,
    signature: FunctionSignature,
}

impl Kernel {
    pub fn decl(&self) -> &KernelDecl {
        &self.decl
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }
}

/// Declared kernels by qualified name, in declaration order.
///
/// A kernel may call itself and any kernel declared before it.
#[derive(Debug, Clone, Default)]
pub struct KernelTable {
    kernels: IndexMap<String, Kernel>,
    signatures: SignatureTable,
}

impl KernelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and type-check `decl`, then register it.
    ///
    /// Nothing is registered when either step fails. Declaring a name again
    /// replaces the earlier kernel.
    pub fn declare(&mut self, decl: KernelDecl) -> EvalResult<FunctionSignature> {
        let name = decl.qualified_name();
        let signature = resolve_signature(&decl).map_err(CompileError::from)?;

        let mut signatures = self.signatures.clone();
        signatures.insert(name.clone(), signature.clone());
        check_kernel(&decl, &signature, &signatures)?;

        debug!(kernel = %name, %signature, "declared native kernel");
        self.signatures = signatures;
        self.kernels.insert(
            name,
            Kernel {
                decl,
                signature: signature.clone(),
            },
        );
        Ok(signature)
    }

    pub fn get(&self, name: &str) -> Option<&Kernel> {
        self.kernels.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    pub fn signatures(&self) -> &SignatureTable {
        &self.signatures
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Kernel)> {
        self.kernels.iter().map(|(name, k)| (name.as_str(), k))
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use numwasm_types::kernel::{Expr, Stmt};
    use numwasm_types::Annotation;

    #[test]
    fn rejected_declarations_are_not_registered() {
        let mut table = KernelTable::new();
        let bad = KernelDecl::new("m", "f")
            .param("values", Annotation::bare_ndarray())
            .body(vec![Stmt::Pass]);
        let err = table.declare(bad).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Compile(CompileError::TypeMapping(ref e)) if e.parameter.as_deref() == Some("values")
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn callers_see_earlier_declarations() {
        let mut table = KernelTable::new();
        table
            .declare(
                KernelDecl::new("m", "one")
                    .returns(Annotation::f64())
                    .body(vec![Stmt::ret(Expr::f64(1.0))]),
            )
            .unwrap();
        table
            .declare(
                KernelDecl::new("m", "two")
                    .returns(Annotation::f64())
                    .body(vec![Stmt::ret(
                        Expr::call("m.one", vec![]).add(Expr::call("m.one", vec![])),
                    )]),
            )
            .unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.signatures().contains_key("m.two"));
    }
}
